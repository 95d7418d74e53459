use crate::models::dtos::latest::LatestReadingDto;
use crate::models::{ReadingEntity, Timestamp, Vitals};
use sqlx::SqlitePool;
use std::time::Duration;

pub struct ReadingService {
    pool: SqlitePool,
}

impl ReadingService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends one sample stamped with `at`, returning the new row id.
    pub async fn append(
        &self,
        patient_id: i64,
        vitals: &Vitals,
        at: Timestamp,
    ) -> anyhow::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO readings
                (patient_id, created_at, ir, red, finger, bpm, spo2, pi, rr, sbp, dbp, temp)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(patient_id)
        .bind(at)
        .bind(vitals.ir)
        .bind(vitals.red)
        .bind(vitals.finger)
        .bind(vitals.bpm)
        .bind(vitals.spo2)
        .bind(vitals.pi)
        .bind(vitals.rr)
        .bind(vitals.sbp)
        .bind(vitals.dbp)
        .bind(vitals.temp)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn latest(&self, patient_id: i64) -> anyhow::Result<Option<ReadingEntity>> {
        let reading = sqlx::query_as::<_, ReadingEntity>(
            r#"SELECT id, created_at, ir, red, finger, bpm, spo2, pi, rr, sbp, dbp, temp
               FROM readings
               WHERE patient_id = ?
               ORDER BY created_at DESC, id DESC
               LIMIT 1"#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reading)
    }

    #[cfg(test)]
    pub async fn count(&self, patient_id: i64) -> anyhow::Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(id) AS total FROM readings WHERE patient_id = ?",
        )
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// The newest sample if it is at most `window` old at `now`, otherwise
    /// the "unavailable" sentinel. A missing sample is treated the same way.
    pub async fn latest_fresh(
        &self,
        patient_id: i64,
        window: Duration,
        now: Timestamp,
    ) -> anyhow::Result<LatestReadingDto> {
        let dto = match self.latest(patient_id).await? {
            Some(reading) if !reading.created_at.is_older_than(window, now) => reading.into(),
            Some(reading) => {
                tracing::trace!(
                    "latest reading of patient {patient_id} is stale [id={}, created_at={}]",
                    reading.id,
                    reading.created_at
                );
                LatestReadingDto::unavailable()
            }
            None => LatestReadingDto::unavailable(),
        };
        Ok(dto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPatient;
    use crate::server::connect_memory_database;
    use crate::services::PatientService;

    const WINDOW: Duration = Duration::from_secs(5);

    async fn setup() -> (SqlitePool, ReadingService, i64) {
        let pool = connect_memory_database().await.unwrap();
        let patient = PatientService::new(pool.clone())
            .create(NewPatient {
                doctor_id: None,
                name: "Derek",
                age: None,
                address: "",
                emergency_number: "",
                device_id: None,
            })
            .await
            .unwrap();
        (pool.clone(), ReadingService::new(pool), patient.id)
    }

    fn vitals(bpm: i64) -> Vitals {
        Vitals {
            bpm: Some(bpm),
            spo2: Some(97.0),
            finger: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn append_adds_exactly_one_row() {
        let (_, service, patient) = setup().await;
        assert_eq!(service.count(patient).await.unwrap(), 0);
        let id = service.append(patient, &vitals(70), Timestamp::now()).await.unwrap();
        assert_eq!(service.count(patient).await.unwrap(), 1);
        let latest = service.latest(patient).await.unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.vitals, vitals(70));
    }

    #[tokio::test]
    async fn latest_orders_by_timestamp_then_id() {
        let (_, service, patient) = setup().await;
        let t0 = Timestamp::from(1_000_000);
        service.append(patient, &vitals(60), t0.add_millis(2000)).await.unwrap();
        service.append(patient, &vitals(61), t0).await.unwrap();
        let tie = service.append(patient, &vitals(62), t0.add_millis(2000)).await.unwrap();
        let latest = service.latest(patient).await.unwrap().unwrap();
        assert_eq!(latest.id, tie);
        assert_eq!(latest.vitals.bpm, Some(62));
    }

    #[tokio::test]
    async fn missing_reading_is_unavailable() {
        let (_, service, patient) = setup().await;
        let dto = service.latest_fresh(patient, WINDOW, Timestamp::now()).await.unwrap();
        assert!(!dto.is_available());
    }

    #[tokio::test]
    async fn freshness_window_boundary() {
        let (_, service, patient) = setup().await;
        let at = Timestamp::from(1_700_000_000_000);
        service.append(patient, &vitals(80), at).await.unwrap();

        let fresh = service.latest_fresh(patient, WINDOW, at.add_millis(5000)).await.unwrap();
        assert!(fresh.is_available());
        let just_fresh = service.latest_fresh(patient, WINDOW, at.add_millis(4999)).await.unwrap();
        assert!(just_fresh.is_available());
        let stale = service.latest_fresh(patient, WINDOW, at.add_millis(5001)).await.unwrap();
        assert!(!stale.is_available());
    }

    #[tokio::test]
    async fn readings_cascade_with_their_patient() {
        let (pool, service, patient) = setup().await;
        service.append(patient, &vitals(90), Timestamp::now()).await.unwrap();
        sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(patient)
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(service.count(patient).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn readings_require_an_existing_patient() {
        let (_, service, patient) = setup().await;
        assert!(service.append(patient + 100, &vitals(90), Timestamp::now()).await.is_err());
    }
}
