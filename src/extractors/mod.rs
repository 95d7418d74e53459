pub mod claims;
mod device_credentials;
mod json_body;
mod path_param;

pub use claims::{DoctorId, OptionalDoctorId, TokenKeys};
pub use device_credentials::DeviceCredentials;
pub use json_body::JsonBody;
pub use path_param::PathParam;
