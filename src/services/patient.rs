use crate::common::{ApiResult, AppError};
use crate::models::{NewPatient, PatientEntity, Timestamp, public_code};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Insert attempts before giving up on a public code that keeps colliding.
const MAX_CODE_ATTEMPTS: usize = 8;

const PATIENT_COLUMNS: &str = "id, doctor_id, name, age, address, emergency_number, device_id, \
     public_code, is_archived, archived_at, created_at";

pub struct PatientService {
    pool: SqlitePool,
}

fn is_unique_violation(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(err) => err.is_unique_violation() && err.message().contains(column),
        _ => false,
    }
}

impl PatientService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn code_exists(&self, code: &str) -> anyhow::Result<bool> {
        let row = sqlx::query_scalar::<_, i64>("SELECT id FROM patients WHERE public_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn generate_public_code<R>(&self, rng: &mut R) -> anyhow::Result<String>
    where
        R: Rng + Send,
    {
        loop {
            let code = public_code::generate(rng);
            if !self.code_exists(&code).await? {
                return Ok(code);
            }
            tracing::debug!("public code {code} already taken, regenerating");
        }
    }

    /// Inserts a new identity with a fresh public code.
    ///
    /// The code is checked against existing rows first; a collision that
    /// slips in between the check and the insert is caught by the UNIQUE
    /// index and retried with another code.
    pub async fn create(&self, new: NewPatient<'_>) -> ApiResult<PatientEntity> {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.create_with(new, &mut rng).await
    }

    async fn create_with<R>(&self, new: NewPatient<'_>, rng: &mut R) -> ApiResult<PatientEntity>
    where
        R: Rng + Send,
    {
        let sql = format!(
            "INSERT INTO patients \
                (doctor_id, name, age, address, emergency_number, device_id, public_code, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {PATIENT_COLUMNS}"
        );
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.generate_public_code(rng).await?;
            let result = sqlx::query_as::<_, PatientEntity>(&sql)
                .bind(new.doctor_id)
                .bind(new.name.trim())
                .bind(new.age)
                .bind(new.address.trim())
                .bind(new.emergency_number.trim())
                .bind(new.device_id)
                .bind(&code)
                .bind(Timestamp::now())
                .fetch_one(&self.pool)
                .await;
            match result {
                Ok(patient) => {
                    tracing::info!(target: "event", "patient created [id={}, code={}]", patient.id, patient.public_code);
                    return Ok(patient);
                }
                Err(err) if is_unique_violation(&err, "public_code") => continue,
                Err(err) if is_unique_violation(&err, "device_id") => {
                    return Err(AppError::Conflict(format!(
                        "Device '{}' is already registered",
                        new.device_id.unwrap_or_default()
                    )));
                }
                Err(err) => return Err(anyhow::Error::from(err).context("Failed to insert patient").into()),
            }
        }
        Err(anyhow::format_err!(
            "Failed to allocate a unique public code after {MAX_CODE_ATTEMPTS} attempts"
        )
        .into())
    }

    #[cfg(test)]
    pub async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<PatientEntity>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?");
        let patient = sqlx::query_as::<_, PatientEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    pub async fn find_by_public_code(&self, code: &str) -> anyhow::Result<Option<PatientEntity>> {
        if !public_code::is_well_formed(code) {
            return Ok(None);
        }
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE public_code = ?");
        let patient = sqlx::query_as::<_, PatientEntity>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    pub async fn find_by_device_id(&self, device_id: &str) -> anyhow::Result<Option<PatientEntity>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE device_id = ?");
        let patient = sqlx::query_as::<_, PatientEntity>(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    /// A patient of `doctor_id`, archived or not.
    pub async fn find_owned(&self, id: i64, doctor_id: Uuid) -> anyhow::Result<Option<PatientEntity>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ? AND doctor_id = ?");
        let patient = sqlx::query_as::<_, PatientEntity>(&sql)
            .bind(id)
            .bind(doctor_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(patient)
    }

    /// Looks up the identity of a device, creating an owner-less one on its
    /// first contact.
    pub async fn provision_device(&self, device_id: &str) -> ApiResult<PatientEntity> {
        if let Some(patient) = self.find_by_device_id(device_id).await? {
            return Ok(patient);
        }
        let created = self
            .create(NewPatient {
                doctor_id: None,
                name: device_id,
                age: None,
                address: "",
                emergency_number: "",
                device_id: Some(device_id),
            })
            .await;
        match created {
            Ok(patient) => {
                tracing::info!(target: "event", "device provisioned [device_id={device_id}]");
                Ok(patient)
            }
            // another request provisioned the same device concurrently
            Err(AppError::Conflict(_)) => self
                .find_by_device_id(device_id)
                .await?
                .ok_or_else(|| anyhow::format_err!("Device '{device_id}' vanished").into()),
            Err(err) => Err(err),
        }
    }

    /// Hands an owner-less, auto-provisioned device to `doctor_id`, after
    /// which it is managed like any other patient of theirs.
    pub async fn claim_device(&self, device_id: &str, doctor_id: Uuid) -> ApiResult<PatientEntity> {
        let sql = format!(
            "UPDATE patients SET doctor_id = ? \
             WHERE device_id = ? AND doctor_id IS NULL RETURNING {PATIENT_COLUMNS}"
        );
        let patient = sqlx::query_as::<_, PatientEntity>(&sql)
            .bind(doctor_id)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| sql.clone())?
            .ok_or(AppError::ResourceNotFound("Unclaimed device not found"))?;
        tracing::info!(target: "event", "device claimed [device_id={device_id}, patient={}]", patient.id);
        Ok(patient)
    }

    pub async fn list_by_doctor(
        &self,
        doctor_id: Uuid,
        archived: bool,
    ) -> anyhow::Result<Vec<PatientEntity>> {
        let order = if archived {
            "archived_at DESC, name"
        } else {
            "name"
        };
        let sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients \
             WHERE doctor_id = ? AND is_archived = ? ORDER BY {order}"
        );
        let patients = sqlx::query_as::<_, PatientEntity>(&sql)
            .bind(doctor_id)
            .bind(archived)
            .fetch_all(&self.pool)
            .await
            .with_context(|| sql.clone())?;
        Ok(patients)
    }

    /// Flips the archive flag of a patient owned by `doctor_id`. Only a
    /// patient currently in the opposite state is affected; anything else is
    /// reported as not found.
    async fn set_archived(&self, id: i64, doctor_id: Uuid, archived: bool) -> ApiResult<PatientEntity> {
        let archived_at = archived.then(Timestamp::now);
        let sql = format!(
            "UPDATE patients SET is_archived = ?, archived_at = ? \
             WHERE id = ? AND doctor_id = ? AND is_archived = ? RETURNING {PATIENT_COLUMNS}"
        );
        let patient = sqlx::query_as::<_, PatientEntity>(&sql)
            .bind(archived)
            .bind(archived_at)
            .bind(id)
            .bind(doctor_id)
            .bind(!archived)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| sql.clone())?
            .ok_or(AppError::ResourceNotFound("Patient not found"))?;
        tracing::info!(target: "event", "patient {} [id={id}]", if archived { "archived" } else { "restored" });
        Ok(patient)
    }

    pub async fn archive(&self, id: i64, doctor_id: Uuid) -> ApiResult<PatientEntity> {
        self.set_archived(id, doctor_id, true).await
    }

    pub async fn unarchive(&self, id: i64, doctor_id: Uuid) -> ApiResult<PatientEntity> {
        self.set_archived(id, doctor_id, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connect_memory_database;
    use crate::services::DoctorService;

    async fn setup() -> (SqlitePool, PatientService, Uuid) {
        let pool = connect_memory_database().await.unwrap();
        let doctor = DoctorService::new(pool.clone())
            .register("dr.grey", None, "scalpel-please")
            .await
            .unwrap();
        (pool.clone(), PatientService::new(pool), doctor.id)
    }

    fn new_patient(doctor_id: Uuid, name: &str) -> NewPatient<'_> {
        NewPatient {
            doctor_id: Some(doctor_id),
            name,
            age: Some(40),
            address: " 12 Elm Street ",
            emergency_number: "555-0100",
            device_id: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_unique_well_formed_codes() {
        let (_, service, doctor) = setup().await;
        let mut codes = std::collections::HashSet::new();
        for i in 0..25 {
            let name = format!("patient-{i}");
            let patient = service.create(new_patient(doctor, &name)).await.unwrap();
            assert!(public_code::is_well_formed(&patient.public_code));
            assert!(codes.insert(patient.public_code));
        }
        let first = service.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(first.address, "12 Elm Street");
        assert!(first.is_owned_by(&doctor));
        assert!(!first.is_archived);
    }

    #[tokio::test]
    async fn public_code_cannot_be_changed() {
        let (pool, service, doctor) = setup().await;
        let patient = service.create(new_patient(doctor, "Meredith")).await.unwrap();
        let result = sqlx::query("UPDATE patients SET public_code = 'PUB-AAAAAAAA' WHERE id = ?")
            .bind(patient.id)
            .execute(&pool)
            .await;
        assert!(result.is_err());
        let reloaded = service.find_by_id(patient.id).await.unwrap().unwrap();
        assert_eq!(reloaded.public_code, patient.public_code);
        // other updates still go through and keep the code
        let archived = service.archive(patient.id, doctor).await.unwrap();
        assert_eq!(archived.public_code, patient.public_code);
    }

    #[tokio::test]
    async fn duplicate_public_code_is_rejected_by_the_store() {
        let (pool, service, doctor) = setup().await;
        let patient = service.create(new_patient(doctor, "Cristina")).await.unwrap();
        let result = sqlx::query(
            "INSERT INTO patients (name, public_code, created_at) VALUES ('Copy', ?, 0)",
        )
        .bind(&patient.public_code)
        .execute(&pool)
        .await;
        assert!(result.is_err_and(|err| is_unique_violation(&err, "public_code")));
        assert!(service.code_exists(&patient.public_code).await.unwrap());
    }

    #[tokio::test]
    async fn archive_and_restore_toggle_listing() {
        let (_, service, doctor) = setup().await;
        let alex = service.create(new_patient(doctor, "Alex")).await.unwrap();
        let izzie = service.create(new_patient(doctor, "Izzie")).await.unwrap();

        let archived = service.archive(izzie.id, doctor).await.unwrap();
        assert!(archived.is_archived);
        assert!(archived.archived_at.is_some());

        let active = service.list_by_doctor(doctor, false).await.unwrap();
        assert_eq!(active.iter().map(|it| it.id).collect::<Vec<_>>(), vec![alex.id]);
        let hidden = service.list_by_doctor(doctor, true).await.unwrap();
        assert_eq!(hidden.iter().map(|it| it.id).collect::<Vec<_>>(), vec![izzie.id]);

        // archiving twice is a miss, as is restoring an active patient
        assert!(matches!(
            service.archive(izzie.id, doctor).await,
            Err(AppError::ResourceNotFound(_))
        ));
        assert!(matches!(
            service.unarchive(alex.id, doctor).await,
            Err(AppError::ResourceNotFound(_))
        ));

        let restored = service.unarchive(izzie.id, doctor).await.unwrap();
        assert!(!restored.is_archived);
        assert_eq!(restored.archived_at, None);
        assert_eq!(service.list_by_doctor(doctor, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn archive_is_limited_to_owner() {
        let (pool, service, doctor) = setup().await;
        let other = DoctorService::new(pool)
            .register("dr.bailey", None, "no-nonsense")
            .await
            .unwrap();
        let patient = service.create(new_patient(doctor, "George")).await.unwrap();
        assert!(service.archive(patient.id, other.id).await.is_err());
        assert!(service.find_owned(patient.id, other.id).await.unwrap().is_none());
        assert!(service.find_owned(patient.id, doctor).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn taken_code_is_regenerated() {
        let (pool, service, doctor) = setup().await;
        let mut rng = StdRng::seed_from_u64(11);
        let taken = public_code::generate(&mut rng.clone());
        sqlx::query("INSERT INTO patients (name, public_code, created_at) VALUES ('Squatter', ?, 0)")
            .bind(&taken)
            .execute(&pool)
            .await
            .unwrap();
        assert!(service.code_exists(&taken).await.unwrap());

        let patient = service
            .create_with(new_patient(doctor, "Lexie"), &mut rng)
            .await
            .unwrap();
        assert_ne!(patient.public_code, taken);
        assert!(public_code::is_well_formed(&patient.public_code));

        // the same seed without the squatter yields the first candidate
        let (_, fresh, doctor) = setup().await;
        let patient = fresh
            .create_with(new_patient(doctor, "Lexie"), &mut StdRng::seed_from_u64(11))
            .await
            .unwrap();
        assert_eq!(patient.public_code, taken);
    }

    #[tokio::test]
    async fn claimed_devices_can_be_archived() {
        let (pool, service, doctor) = setup().await;
        let device = service.provision_device("esp32-ward-9").await.unwrap();
        assert!(matches!(
            service.archive(device.id, doctor).await,
            Err(AppError::ResourceNotFound(_))
        ));

        let claimed = service.claim_device("esp32-ward-9", doctor).await.unwrap();
        assert_eq!(claimed.id, device.id);
        assert!(claimed.is_owned_by(&doctor));
        assert!(service.archive(device.id, doctor).await.unwrap().is_archived);

        // a claimed device cannot be taken over
        let other = DoctorService::new(pool)
            .register("dr.avery", None, "trauma-fellow")
            .await
            .unwrap();
        assert!(matches!(
            service.claim_device("esp32-ward-9", other.id).await,
            Err(AppError::ResourceNotFound(_))
        ));
        assert!(matches!(
            service.claim_device("esp32-missing", other.id).await,
            Err(AppError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn provision_device_is_idempotent() {
        let (_, service, _) = setup().await;
        let first = service.provision_device("esp32-ward-3").await.unwrap();
        let second = service.provision_device("esp32-ward-3").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.public_code, second.public_code);
        assert_eq!(first.name, "esp32-ward-3");
        assert_eq!(first.doctor_id, None);
    }

    #[tokio::test]
    async fn malformed_codes_are_not_looked_up() {
        let (_, service, _) = setup().await;
        assert!(service.find_by_public_code("'; DROP TABLE patients;--").await.unwrap().is_none());
        assert!(service.find_by_public_code("PUB-ZZZZZZZZ").await.unwrap().is_none());
    }
}
