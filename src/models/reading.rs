use crate::models::Timestamp;
use serde::Serialize;

/// Sensor channels and derived vitals carried by one sample, all optional
/// except the finger-contact flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct Vitals {
    pub ir: Option<i64>,
    pub red: Option<i64>,
    pub finger: bool,
    pub bpm: Option<i64>,
    pub spo2: Option<f64>,
    pub pi: Option<f64>,
    pub rr: Option<f64>,
    pub sbp: Option<i64>,
    pub dbp: Option<i64>,
    pub temp: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReadingEntity {
    pub id: i64,
    pub created_at: Timestamp,
    #[sqlx(flatten)]
    pub vitals: Vitals,
}
