use crate::common::{ApiResult, AppError};
use crate::extractors::{DoctorId, JsonBody, PathParam};
use crate::models::NewPatient;
use crate::models::dtos::patient::{CreatePatientBodyDto, PatientListDto, PatientResponseDto};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use uuid::Uuid;

pub(super) async fn patient_list(state: &AppState, doctor_id: Uuid) -> ApiResult<PatientListDto> {
    let patients = state.patient_service.list_by_doctor(doctor_id, false).await?;
    let archived_patients = state.patient_service.list_by_doctor(doctor_id, true).await?;
    Ok(PatientListDto {
        patients: patients.into_iter().map(PatientResponseDto::from).collect(),
        archived_patients: archived_patients
            .into_iter()
            .map(PatientResponseDto::from)
            .collect(),
    })
}

pub async fn create(
    State(state): State<AppState>,
    DoctorId(doctor_id): DoctorId,
    JsonBody(body): JsonBody<CreatePatientBodyDto>,
) -> ApiResult<(StatusCode, Json<PatientResponseDto>)> {
    body.validate()?;
    let patient = state
        .patient_service
        .create(NewPatient {
            doctor_id: Some(doctor_id),
            name: body.name.trim(),
            age: body.age,
            address: body.address.trim(),
            emergency_number: body.emergency_number.trim(),
            device_id: None,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(patient.into())))
}

pub async fn list(
    State(state): State<AppState>,
    DoctorId(doctor_id): DoctorId,
) -> ApiResult<Json<PatientListDto>> {
    Ok(Json(patient_list(&state, doctor_id).await?))
}

pub async fn detail(
    State(state): State<AppState>,
    DoctorId(doctor_id): DoctorId,
    PathParam(id): PathParam<i64>,
) -> ApiResult<Json<PatientResponseDto>> {
    let patient = state
        .patient_service
        .find_owned(id, doctor_id)
        .await?
        .ok_or(AppError::ResourceNotFound("Patient not found"))?;
    Ok(Json(patient.into()))
}

pub async fn archive(
    State(state): State<AppState>,
    DoctorId(doctor_id): DoctorId,
    PathParam(id): PathParam<i64>,
) -> ApiResult<Json<PatientResponseDto>> {
    let patient = state.patient_service.archive(id, doctor_id).await?;
    Ok(Json(patient.into()))
}

pub async fn restore(
    State(state): State<AppState>,
    DoctorId(doctor_id): DoctorId,
    PathParam(id): PathParam<i64>,
) -> ApiResult<Json<PatientResponseDto>> {
    let patient = state.patient_service.unarchive(id, doctor_id).await?;
    Ok(Json(patient.into()))
}

/// Takes ownership of a device that was provisioned through the shared key.
pub async fn claim_device(
    State(state): State<AppState>,
    DoctorId(doctor_id): DoctorId,
    PathParam(device_id): PathParam<String>,
) -> ApiResult<Json<PatientResponseDto>> {
    let patient = state
        .patient_service
        .claim_device(device_id.trim(), doctor_id)
        .await?;
    Ok(Json(patient.into()))
}
