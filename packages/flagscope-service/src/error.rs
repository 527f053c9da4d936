pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}
}
impl From<flagscope_storage::Error> for Error {
	fn from(err: flagscope_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
