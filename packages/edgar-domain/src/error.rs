pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid CIK: {message}")]
	InvalidCik { message: String },
	#[error("Invalid accession number: {message}")]
	InvalidAccessionNumber { message: String },
	#[error("Invalid date range: start {start} is after end {end}.")]
	InvalidDateRange { start: time::Date, end: time::Date },
}
