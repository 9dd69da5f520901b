pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Rate limiting, timeouts, connection trouble, or a 5xx response.
	/// Retried with backoff before triggering fallback.
	#[error("Transient retrieval failure: {message}")]
	Transient { message: String },
	/// Unknown identifier or malformed request. Never retried.
	#[error("Permanent retrieval failure: {message}")]
	Permanent { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}
impl Error {
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient { .. })
	}
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		if err.is_timeout() || err.is_connect() {
			return Self::Transient { message: err.to_string() };
		}

		match err.status() {
			Some(status) if status.as_u16() == 404 =>
				Self::NotFound { message: err.to_string() },
			Some(status) if status.as_u16() == 429 || status.is_server_error() =>
				Self::Transient { message: err.to_string() },
			Some(_) => Self::Permanent { message: err.to_string() },
			None => Self::Transient { message: err.to_string() },
		}
	}
}
