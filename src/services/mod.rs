pub mod doctor;
pub mod ingest;
pub mod patient;
pub mod reading;

pub use doctor::DoctorService;
pub use ingest::IngestService;
pub use patient::PatientService;
pub use reading::ReadingService;
