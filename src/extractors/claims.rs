use crate::common::AppError;
use crate::models::Timestamp;
use crate::state::AppState;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

const ISSUER: &str = "vitalink";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    iss: String,
    sub: Uuid,
    exp: i64,
    jti: String,
}

/// HS256 keys derived from `authorize.secret`, plus the token lifetime.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: i64,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Signs a token for `doctor_id`, returning it with its expiry.
    pub fn issue(&self, doctor_id: Uuid) -> anyhow::Result<(String, Timestamp)> {
        let now = chrono::Utc::now();
        let exp = now.timestamp() + self.ttl;
        let claims = Claims {
            iss: ISSUER.to_string(),
            sub: doctor_id,
            exp,
            jti: ulid::Ulid::new().to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok((token, Timestamp::from(exp * 1000)))
    }

    fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!("rejected bearer token: {err}");
                AppError::Unauthorized("Invalid or expired token")
            })
    }
}

fn parse_claims(parts: &Parts, keys: &TokenKeys) -> Result<Claims, AppError> {
    let token = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|it| it.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .ok_or(AppError::Unauthorized("Authentication credentials were not provided"))?;
    keys.verify(token)
}

/// The authenticated doctor; rejects the request with 401 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct DoctorId(pub Uuid);

impl<S> FromRequestParts<S> for DoctorId
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(Self(parse_claims(parts, &state.token_keys)?.sub))
    }
}

/// The authenticated doctor if a valid token was sent, for pages guests may
/// also see.
#[derive(Debug, Clone, Copy)]
pub struct OptionalDoctorId(pub Option<Uuid>);

impl<S> FromRequestParts<S> for OptionalDoctorId
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(Self(
            parse_claims(parts, &state.token_keys)
                .map(|claims| claims.sub)
                .ok(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let keys = TokenKeys::new(b"test-secret", 60);
        let id = Uuid::now_v7();
        let (token, expires_at) = keys.issue(id).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.iss, ISSUER);
        assert!(expires_at > Timestamp::now());
    }

    #[test]
    fn foreign_or_expired_tokens_fail() {
        let keys = TokenKeys::new(b"test-secret", 60);
        let (token, _) = TokenKeys::new(b"other-secret", 60)
            .issue(Uuid::now_v7())
            .unwrap();
        assert!(keys.verify(&token).is_err());

        // well past the default 60s leeway
        let (expired, _) = TokenKeys::new(b"test-secret", -3600)
            .issue(Uuid::now_v7())
            .unwrap();
        assert!(keys.verify(&expired).is_err());
        assert!(keys.verify("garbage").is_err());
    }
}
