use crate::common::{ApiResult, AppError};
use crate::models::{DoctorEntity, Timestamp};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::RngCore;
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct DoctorService {
    pool: SqlitePool,
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt = [0u8; 16];
    rand::rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|err| anyhow::format_err!("Failed to encode password salt: {err}"))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow::format_err!("Failed to hash password: {err}"))
}

fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow::format_err!("Failed to parse stored password hash: {err}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

impl DoctorService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
    ) -> ApiResult<DoctorEntity> {
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;
        let email = email.map(str::trim).filter(|it| !it.is_empty());
        let result = sqlx::query_as::<_, DoctorEntity>(
            r#"INSERT INTO doctors (id, username, email, password_hash, created_at)
               VALUES (?, ?, ?, ?, ?)
               RETURNING id, username, email, password_hash, created_at"#,
        )
        .bind(Uuid::now_v7())
        .bind(username.trim())
        .bind(email)
        .bind(password_hash)
        .bind(Timestamp::now())
        .fetch_one(&self.pool)
        .await;
        match result {
            Ok(doctor) => {
                tracing::info!(target: "event", "doctor registered [username={}]", doctor.username);
                Ok(doctor)
            }
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(
                AppError::Conflict("A user with that username already exists.".to_string()),
            ),
            Err(err) => Err(err.into()),
        }
    }

    /// Checks a username/password pair. Unknown users and wrong passwords
    /// are indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> ApiResult<DoctorEntity> {
        let doctor = sqlx::query_as::<_, DoctorEntity>(
            "SELECT id, username, email, password_hash, created_at FROM doctors WHERE username = ?",
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;
        let rejected = AppError::Unauthorized("Please enter a correct username and password.");
        let Some(doctor) = doctor else {
            return Err(rejected);
        };
        let password = password.to_string();
        let hash = doctor.password_hash.clone();
        let valid =
            tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
        if valid { Ok(doctor) } else { Err(rejected) }
    }

    pub async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<DoctorEntity>> {
        let doctor = sqlx::query_as::<_, DoctorEntity>(
            "SELECT id, username, email, password_hash, created_at FROM doctors WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doctor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connect_memory_database;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
        assert_ne!(hash, hash_password("correct horse").unwrap());
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let service = DoctorService::new(connect_memory_database().await.unwrap());
        let doctor = service
            .register(" dr.yang ", Some("  "), "cardio-god")
            .await
            .unwrap();
        assert_eq!(doctor.username, "dr.yang");
        assert_eq!(doctor.email, None);

        let found = service.authenticate("dr.yang", "cardio-god").await.unwrap();
        assert_eq!(found.id, doctor.id);
        assert!(matches!(
            service.authenticate("dr.yang", "cardio-dog").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            service.authenticate("dr.nobody", "cardio-god").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(service.find_by_id(doctor.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_logins_hash_off_the_runtime() {
        let service = DoctorService::new(connect_memory_database().await.unwrap());
        service.register("dr.pierce", None, "cardiothoracic").await.unwrap();
        let (a, b, c) = tokio::join!(
            service.authenticate("dr.pierce", "cardiothoracic"),
            service.authenticate("dr.pierce", "cardiothoracic"),
            service.authenticate("dr.pierce", "wrong-password"),
        );
        assert_eq!(a.unwrap().username, "dr.pierce");
        assert_eq!(b.unwrap().username, "dr.pierce");
        assert!(matches!(c, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let service = DoctorService::new(connect_memory_database().await.unwrap());
        service.register("dr.karev", None, "peds-forever").await.unwrap();
        assert!(matches!(
            service.register("dr.karev", None, "other-secret").await,
            Err(AppError::Conflict(_))
        ));
    }
}
