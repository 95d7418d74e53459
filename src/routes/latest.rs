use crate::common::{ApiResult, AppError};
use crate::extractors::{DoctorId, PathParam};
use crate::models::dtos::latest::LatestReadingDto;
use crate::models::{PatientEntity, Timestamp};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;

async fn respond(
    state: &AppState,
    patient: Option<PatientEntity>,
) -> ApiResult<Json<LatestReadingDto>> {
    let patient = patient.ok_or(AppError::ResourceNotFound("Patient not found"))?;
    let dto = state
        .reading_service
        .latest_fresh(patient.id, state.settings.freshness_window, Timestamp::now())
        .await?;
    Ok(Json(dto))
}

pub async fn by_public_code(
    State(state): State<AppState>,
    PathParam(public_code): PathParam<String>,
) -> ApiResult<Json<LatestReadingDto>> {
    let patient = state
        .patient_service
        .find_by_public_code(public_code.trim())
        .await?;
    respond(&state, patient).await
}

pub async fn by_device_id(
    State(state): State<AppState>,
    PathParam(device_id): PathParam<String>,
) -> ApiResult<Json<LatestReadingDto>> {
    let patient = state
        .patient_service
        .find_by_device_id(device_id.trim())
        .await?;
    respond(&state, patient).await
}

/// Owner-only variant for the doctor's dashboard; archived patients are hidden.
pub async fn by_patient_id(
    State(state): State<AppState>,
    DoctorId(doctor_id): DoctorId,
    PathParam(patient_id): PathParam<i64>,
) -> ApiResult<Json<LatestReadingDto>> {
    let patient = state
        .patient_service
        .find_owned(patient_id, doctor_id)
        .await?
        .filter(|it| !it.is_archived);
    respond(&state, patient).await
}
