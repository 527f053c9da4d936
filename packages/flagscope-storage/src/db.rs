use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Error, Result, schema};

const SCHEMA_LOCK_ID: i64 = 4_172_063;

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &flagscope_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub fn from_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Creates missing tables. Concurrent callers serialize on a transaction-scoped advisory lock.
	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_ID).execute(&mut *tx).await?;

		for (index, statement) in schema::statements(&sql).into_iter().enumerate() {
			sqlx::query(statement)
				.execute(&mut *tx)
				.await
				.map_err(|source| Error::Schema { index, source })?;
		}

		tx.commit().await?;

		tracing::debug!("Schema bootstrap complete.");

		Ok(())
	}
}
