use crate::common::{ApiResult, AppError};
use crate::extractors::{DoctorId, JsonBody};
use crate::models::DoctorEntity;
use crate::models::dtos::auth::{
    DoctorResponseDto, LoginBodyDto, RegisterBodyDto, TokenResponseDto,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

fn token_response(state: &AppState, doctor: DoctorEntity) -> ApiResult<TokenResponseDto> {
    let (token, expires_at) = state.token_keys.issue(doctor.id)?;
    Ok(TokenResponseDto {
        token,
        expires_at,
        doctor: doctor.into(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterBodyDto>,
) -> ApiResult<(StatusCode, Json<TokenResponseDto>)> {
    body.validate()?;
    let doctor = state
        .doctor_service
        .register(&body.username, body.email.as_deref(), &body.password1)
        .await?;
    Ok((StatusCode::CREATED, Json(token_response(&state, doctor)?)))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginBodyDto>,
) -> ApiResult<Json<TokenResponseDto>> {
    let doctor = state
        .doctor_service
        .authenticate(&body.username, &body.password)
        .await?;
    tracing::debug!("doctor logged in [username={}]", doctor.username);
    Ok(Json(token_response(&state, doctor)?))
}

pub async fn me(
    State(state): State<AppState>,
    DoctorId(doctor_id): DoctorId,
) -> ApiResult<Json<DoctorResponseDto>> {
    // the token may outlive the account
    let doctor = state
        .doctor_service
        .find_by_id(doctor_id)
        .await?
        .ok_or(AppError::Unauthorized("Account no longer exists"))?;
    Ok(Json(doctor.into()))
}
