pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to parse {var}: {source}.")]
	InvalidDsn {
		var: &'static str,
		#[source]
		source: sqlx::Error,
	},

	#[error("Failed to connect to an admin database: {0}.")]
	AdminUnavailable(String),

	#[error("Failed to {action} test database {name:?}: {source}.")]
	Database {
		action: &'static str,
		name: String,
		#[source]
		source: sqlx::Error,
	},
}
