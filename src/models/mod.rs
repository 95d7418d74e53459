pub mod doctor;
pub mod dtos;
pub mod patient;
pub mod public_code;
pub mod reading;
mod types;

pub use doctor::DoctorEntity;
pub use patient::{NewPatient, PatientEntity};
pub use reading::{ReadingEntity, Vitals};
pub use types::Timestamp;
