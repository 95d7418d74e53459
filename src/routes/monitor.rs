use crate::common::{ApiResult, AppError};
use crate::extractors::{OptionalDoctorId, PathParam};
use crate::models::dtos::monitor::{HomeDto, MonitorDto};
use crate::state::{AppState, Settings};
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::HOST;

/// Base of absolute share links: `server.public_url` when configured,
/// otherwise the scheme and host the request came in on.
fn base_url(settings: &Settings, headers: &HeaderMap) -> String {
    if let Some(url) = settings
        .public_url
        .as_deref()
        .map(str::trim)
        .filter(|it| !it.is_empty())
    {
        return url.trim_end_matches('/').to_string();
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|it| !it.is_empty())
    };
    let host = header(HOST.as_str()).unwrap_or("localhost");
    let scheme = header("x-forwarded-proto").unwrap_or("http");
    format!("{scheme}://{host}")
}

pub async fn monitor(
    State(state): State<AppState>,
    OptionalDoctorId(viewer): OptionalDoctorId,
    headers: HeaderMap,
    PathParam(public_code): PathParam<String>,
) -> ApiResult<Json<MonitorDto>> {
    let patient = state
        .patient_service
        .find_by_public_code(public_code.trim())
        .await?
        .ok_or(AppError::ResourceNotFound("Patient not found"))?;
    if patient.is_archived {
        return Err(AppError::ResourceNotFound("Monitor unavailable"));
    }
    let can_view_private = viewer.is_some_and(|id| patient.is_owned_by(&id));
    let base_url = base_url(&state.settings, &headers);
    Ok(Json(MonitorDto::new(patient, &base_url, can_view_private)))
}

pub async fn home(
    State(state): State<AppState>,
    OptionalDoctorId(viewer): OptionalDoctorId,
) -> ApiResult<Json<HomeDto>> {
    let patients = match viewer {
        Some(doctor_id) => Some(super::patients::patient_list(&state, doctor_id).await?),
        None => None,
    };
    Ok(Json(HomeDto {
        esp32_status_url: state.settings.esp32_status_url.clone(),
        patients,
    }))
}
