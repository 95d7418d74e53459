use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum AppError {
    BadRequest(anyhow::Error),
    Unauthorized(&'static str),
    Forbidden(&'static str),
    ResourceNotFound(&'static str),
    Conflict(String),
    Internal(anyhow::Error),
}

impl AppError {
    pub fn bad_request(message: impl Display) -> Self {
        Self::BadRequest(anyhow::format_err!("{message}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(error) => write!(f, "{error}"),
            AppError::Unauthorized(detail)
            | AppError::Forbidden(detail)
            | AppError::ResourceNotFound(detail) => f.write_str(detail),
            AppError::Conflict(detail) => f.write_str(detail),
            AppError::Internal(_) => {
                f.write_str("An internal error occurred. Please try again later.")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(err) => {
                tracing::error!("{:?}", err);
                err.chain()
                    .skip(1)
                    .for_each(|cause| tracing::error!("Because: {}", cause));
            }
            _ => tracing::debug!(status = status.as_u16(), "{}", self),
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(value: E) -> Self {
        Self::Internal(value.into())
    }
}
