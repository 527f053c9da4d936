pub mod search;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use search::{
	FeatureSearchRequest, FeatureSearchResponse,
	aggregate::{
		Creator, EnvironmentOverview, FeatureOverview, Lifecycle, RowAggregator, Tag,
		aggregate_rows, avatar_url,
	},
};

use flagscope_config::Config;
use flagscope_storage::db::Db;

pub struct FlagscopeService {
	pub cfg: Config,
	pub db: Db,
}
impl FlagscopeService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db }
	}
}
