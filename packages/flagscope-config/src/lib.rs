mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Postgres, Search, Security, Service, Storage};

use std::{fs, net::SocketAddr, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(path, &raw)
}

pub fn parse(path: &Path, raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.is_empty() {
		return Err(Error::invalid("service.http_bind", "must be non-empty."));
	}
	if cfg.service.http_bind.parse::<SocketAddr>().is_err() {
		return Err(Error::invalid("service.http_bind", "must be a socket address."));
	}
	if cfg.storage.postgres.dsn.is_empty() {
		return Err(Error::invalid("storage.postgres.dsn", "must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::invalid("storage.postgres.pool_max_conns", "must be greater than zero."));
	}
	if cfg.search.default_limit == 0 {
		return Err(Error::invalid("search.default_limit", "must be greater than zero."));
	}
	if cfg.search.max_limit == 0 {
		return Err(Error::invalid("search.max_limit", "must be greater than zero."));
	}
	if cfg.search.default_limit > cfg.search.max_limit {
		return Err(Error::invalid(
			"search.default_limit",
			"must be less than or equal to search.max_limit.",
		));
	}
	if cfg.search.metrics_window_hours == 0 {
		return Err(Error::invalid("search.metrics_window_hours", "must be greater than zero."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.http_bind = cfg.service.http_bind.trim().to_string();
	cfg.storage.postgres.dsn = cfg.storage.postgres.dsn.trim().to_string();

	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
