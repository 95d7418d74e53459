use crate::common::{ApiResult, AppError};
use crate::extractors::DeviceCredentials;
use crate::models::dtos::ingest::IngestPayload;
use crate::models::{PatientEntity, Timestamp};
use crate::services::{PatientService, ReadingService};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Where an inbound sample comes from, once its headers have been checked.
enum Source {
    /// identified by a public code
    Patient(PatientEntity),
    /// holder of the shared API key, identity named in the body
    SharedKey,
}

pub struct IngestService {
    patients: Arc<PatientService>,
    readings: Arc<ReadingService>,
    api_key_digest: Option<[u8; 32]>,
}

impl IngestService {
    pub fn new(
        patients: Arc<PatientService>,
        readings: Arc<ReadingService>,
        api_key: Option<&str>,
    ) -> Self {
        let api_key_digest = api_key
            .filter(|it| !it.is_empty())
            .map(|it| Sha256::digest(it.as_bytes()).into());
        Self {
            patients,
            readings,
            api_key_digest,
        }
    }

    fn check_api_key(&self, candidate: &str) -> bool {
        let Some(expected) = self.api_key_digest.as_ref() else {
            return false;
        };
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        candidate == *expected
    }

    async fn authenticate(&self, credentials: &DeviceCredentials) -> ApiResult<Source> {
        if let Some(code) = credentials.public_code.as_deref() {
            let patient = self
                .patients
                .find_by_public_code(code)
                .await?
                .ok_or(AppError::Forbidden("Invalid patient code"))?;
            if patient.is_archived {
                return Err(AppError::Forbidden("Patient is archived"));
            }
            return Ok(Source::Patient(patient));
        }
        if let Some(api_key) = credentials.api_key.as_deref() {
            return if self.check_api_key(api_key) {
                Ok(Source::SharedKey)
            } else {
                Err(AppError::Unauthorized("Invalid API key"))
            };
        }
        Err(AppError::Unauthorized("Missing X-PUBLIC-CODE or X-API-KEY"))
    }

    /// Validates and stores one sample, returning the new reading id.
    /// Credentials are checked before the body is parsed.
    pub async fn ingest(
        &self,
        credentials: &DeviceCredentials,
        body: &[u8],
        now: Timestamp,
    ) -> ApiResult<i64> {
        let source = self.authenticate(credentials).await?;
        let payload = IngestPayload::from_slice(body).map_err(|err| AppError::BadRequest(err.into()))?;
        let patient = match source {
            Source::Patient(patient) => patient,
            Source::SharedKey => {
                let device_id = payload
                    .device_id
                    .as_deref()
                    .ok_or_else(|| AppError::bad_request("Missing 'device_id'"))?;
                let patient = self.patients.provision_device(device_id).await?;
                if patient.is_archived {
                    return Err(AppError::Forbidden("Device is archived"));
                }
                patient
            }
        };
        let id = self.readings.append(patient.id, &payload.vitals, now).await?;
        tracing::debug!(
            "reading stored [id={id}, patient={}, finger={}]",
            patient.id,
            payload.vitals.finger
        );
        Ok(id)
    }
}
