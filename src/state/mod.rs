use crate::config::Config;
use crate::extractors::TokenKeys;
use crate::services::{DoctorService, IngestService, PatientService, ReadingService};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Settings the handlers read on every request, copied out of [`Config`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub freshness_window: Duration,
    pub public_url: Option<String>,
    pub esp32_status_url: String,
}

#[derive(Clone)]
pub struct AppState {
    pub doctor_service: Arc<DoctorService>,
    pub patient_service: Arc<PatientService>,
    pub reading_service: Arc<ReadingService>,
    pub ingest_service: Arc<IngestService>,
    pub token_keys: Arc<TokenKeys>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn build(pool: SqlitePool, config: &Config) -> anyhow::Result<Self> {
        if config.authorize.secret.trim().is_empty() {
            anyhow::bail!("Error: 'authorize.secret' must not be empty");
        }
        let patient_service = Arc::new(PatientService::new(pool.clone()));
        let reading_service = Arc::new(ReadingService::new(pool.clone()));
        let ingest_service = Arc::new(IngestService::new(
            patient_service.clone(),
            reading_service.clone(),
            config.ingest.api_key.as_deref(),
        ));
        if config.ingest.api_key.is_none() {
            tracing::warn!("no ingest API key configured, devices must send X-PUBLIC-CODE");
        }
        Ok(Self {
            doctor_service: Arc::new(DoctorService::new(pool)),
            patient_service,
            reading_service,
            ingest_service,
            token_keys: Arc::new(TokenKeys::new(
                config.authorize.secret.as_bytes(),
                config.authorize.token_ttl,
            )),
            settings: Arc::new(Settings {
                freshness_window: config.ingest.freshness_window(),
                public_url: config.server.public_url.clone(),
                esp32_status_url: config.dashboard.esp32_status_url.trim().to_string(),
            }),
        })
    }
}
