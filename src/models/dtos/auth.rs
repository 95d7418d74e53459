use crate::common::AppError;
use crate::models::{DoctorEntity, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterBodyDto {
    pub username: String,
    pub email: Option<String>,
    pub password1: String,
    pub password2: String,
}

impl RegisterBodyDto {
    pub fn validate(&self) -> Result<(), AppError> {
        let username = self.username.trim();
        if username.is_empty() || username.chars().count() > 150 {
            return Err(AppError::bad_request(
                "'username' must be between 1 and 150 characters",
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            return Err(AppError::bad_request(
                "'username' may contain only letters, digits and @/./+/-/_",
            ));
        }
        if let Some(email) = self.email.as_deref().map(str::trim).filter(|it| !it.is_empty()) {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                return Err(AppError::bad_request("'email' is not a valid address"));
            }
        }
        if self.password1 != self.password2 {
            return Err(AppError::bad_request("The two password fields didn't match"));
        }
        if self.password1.chars().count() < 8 {
            return Err(AppError::bad_request(
                "This password is too short. It must contain at least 8 characters",
            ));
        }
        if self.password1.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::bad_request("This password is entirely numeric"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginBodyDto {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorResponseDto {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub created_at: Timestamp,
}

impl From<DoctorEntity> for DoctorResponseDto {
    fn from(value: DoctorEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            email: value.email,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponseDto {
    pub token: String,
    pub expires_at: Timestamp,
    pub doctor: DoctorResponseDto,
}
