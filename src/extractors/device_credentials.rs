use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

pub const PUBLIC_CODE_HEADER: &str = "x-public-code";
pub const API_KEY_HEADER: &str = "x-api-key";

/// The identifying headers a device sends with a sample. Blank values count
/// as absent.
#[derive(Clone, Debug, Default)]
pub struct DeviceCredentials {
    pub public_code: Option<String>,
    pub api_key: Option<String>,
}

fn read_header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for DeviceCredentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            public_code: read_header(parts, PUBLIC_CODE_HEADER),
            api_key: read_header(parts, API_KEY_HEADER),
        })
    }
}
