pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Fixture error: {message}")]
	Fixture { message: String },
}
impl From<edgar_domain::Error> for Error {
	fn from(err: edgar_domain::Error) -> Self {
		Self::Fixture { message: err.to_string() }
	}
}
