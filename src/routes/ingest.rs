use crate::common::ApiResult;
use crate::extractors::DeviceCredentials;
use crate::models::Timestamp;
use crate::models::dtos::ingest::IngestAckDto;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

/// Device telemetry sink. The raw body is handed over so that credentials
/// are checked before it is parsed.
pub async fn ingest(
    State(state): State<AppState>,
    credentials: DeviceCredentials,
    body: Bytes,
) -> ApiResult<Json<IngestAckDto>> {
    let id = state
        .ingest_service
        .ingest(&credentials, &body, Timestamp::now())
        .await?;
    Ok(Json(IngestAckDto { ok: true, id }))
}
