use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	#[serde(default = "default_limit")]
	pub default_limit: u32,
	#[serde(default = "max_limit")]
	pub max_limit: u32,
	/// Trailing window for the yes/no evaluation counts attached to each environment.
	#[serde(default = "metrics_window_hours")]
	pub metrics_window_hours: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_limit: default_limit(),
			max_limit: max_limit(),
			metrics_window_hours: metrics_window_hours(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	#[serde(default = "bind_localhost_only")]
	pub bind_localhost_only: bool,
}
impl Default for Security {
	fn default() -> Self {
		Self { bind_localhost_only: bind_localhost_only() }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_limit() -> u32 {
	50
}

fn max_limit() -> u32 {
	100
}

fn metrics_window_hours() -> u32 {
	1
}

fn bind_localhost_only() -> bool {
	true
}
