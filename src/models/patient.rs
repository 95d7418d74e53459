use crate::models::Timestamp;
use serde::Serialize;
use uuid::Uuid;

/// A monitored identity: a patient registered by a doctor, or a device
/// provisioned on its first contact.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PatientEntity {
    pub id: i64,
    #[serde(skip_serializing)]
    pub doctor_id: Option<Uuid>,
    pub name: String,
    pub age: Option<i64>,
    pub address: String,
    pub emergency_number: String,
    pub device_id: Option<String>,
    pub public_code: String,
    pub is_archived: bool,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl PatientEntity {
    #[inline]
    pub fn is_owned_by(&self, doctor_id: &Uuid) -> bool {
        self.doctor_id.as_ref() == Some(doctor_id)
    }
}

pub struct NewPatient<'a> {
    pub doctor_id: Option<Uuid>,
    pub name: &'a str,
    pub age: Option<i64>,
    pub address: &'a str,
    pub emergency_number: &'a str,
    pub device_id: Option<&'a str>,
}
