use std::sync::Arc;

use flagscope_service::FlagscopeService;
use flagscope_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<FlagscopeService>,
}
impl AppState {
	pub async fn new(config: flagscope_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		Ok(Self::from_service(FlagscopeService::new(config, db)))
	}

	pub fn from_service(service: FlagscopeService) -> Self {
		Self { service: Arc::new(service) }
	}
}
