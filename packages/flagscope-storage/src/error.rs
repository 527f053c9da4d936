#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Schema statement {index} failed: {source}")]
	Schema {
		index: usize,
		#[source]
		source: sqlx::Error,
	},
}
