use crate::common::AppError;
use crate::models::{PatientEntity, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreatePatientBodyDto {
    pub name: String,
    pub age: Option<i64>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub emergency_number: String,
}

impl CreatePatientBodyDto {
    pub fn validate(&self) -> Result<(), AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("'name' must not be empty"));
        }
        if name.chars().count() > 120 {
            return Err(AppError::bad_request(
                "'name' must be at most 120 characters",
            ));
        }
        if self.age.is_some_and(|it| it < 0) {
            return Err(AppError::bad_request("'age' must not be negative"));
        }
        if self.emergency_number.trim().chars().count() > 30 {
            return Err(AppError::bad_request(
                "'emergency_number' must be at most 30 characters",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct PatientResponseDto {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub address: String,
    pub emergency_number: String,
    pub device_id: Option<String>,
    pub public_code: String,
    pub is_archived: bool,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
    /// relative path of the public monitor share link
    pub monitor_path: String,
}

impl From<PatientEntity> for PatientResponseDto {
    fn from(value: PatientEntity) -> Self {
        Self {
            monitor_path: format!("/m/{}", value.public_code),
            id: value.id,
            name: value.name,
            age: value.age,
            address: value.address,
            emergency_number: value.emergency_number,
            device_id: value.device_id,
            public_code: value.public_code,
            is_archived: value.is_archived,
            archived_at: value.archived_at,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PatientListDto {
    pub patients: Vec<PatientResponseDto>,
    pub archived_patients: Vec<PatientResponseDto>,
}
