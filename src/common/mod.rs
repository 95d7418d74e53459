pub mod error;

pub use error::AppError;

pub type ApiResult<T> = Result<T, AppError>;
