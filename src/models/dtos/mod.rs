pub mod auth;
pub mod ingest;
pub mod latest;
pub mod monitor;
pub mod patient;
