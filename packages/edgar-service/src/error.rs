pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid filter: {message}")]
	InvalidFilter { message: String },
	#[error("Invalid plan: {message}")]
	InvalidPlan { message: String },
	#[error("Required step {step} failed: {message}")]
	RequiredStepFailed { step: String, message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
}
impl From<edgar_providers::Error> for Error {
	fn from(err: edgar_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<edgar_domain::Error> for Error {
	fn from(err: edgar_domain::Error) -> Self {
		Self::InvalidFilter { message: err.to_string() }
	}
}
