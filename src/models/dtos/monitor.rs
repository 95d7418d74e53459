use crate::models::PatientEntity;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MonitorDto {
    pub name: String,
    pub public_code: String,
    /// path of the latest-reading endpoint the dashboard polls
    pub endpoint: String,
    pub share_url: String,
    pub can_view_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<MonitorPrivateDto>,
}

#[derive(Debug, Serialize)]
pub struct MonitorPrivateDto {
    pub age: Option<i64>,
    pub address: String,
    pub emergency_number: String,
}

impl MonitorDto {
    pub fn new(patient: PatientEntity, base_url: &str, can_view_private: bool) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            endpoint: format!("/api/latest/{}", patient.public_code),
            share_url: format!("{}/m/{}", base_url, patient.public_code),
            can_view_private,
            private: can_view_private.then(|| MonitorPrivateDto {
                age: patient.age,
                address: patient.address,
                emergency_number: patient.emergency_number,
            }),
            name: patient.name,
            public_code: patient.public_code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HomeDto {
    pub esp32_status_url: String,
    #[serde(flatten)]
    pub patients: Option<super::patient::PatientListDto>,
}
