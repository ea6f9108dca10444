use std::{str::FromStr, time::Duration};

use crate::services::response::ServiceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
	Postgres,
	/// Process-local tables, lost on restart.
	Memory,
}

impl FromStr for StorageBackend {
	type Err = ServiceError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"postgres" => Ok(StorageBackend::Postgres),
			"memory" => Ok(StorageBackend::Memory),
			other => Err(ServiceError::ConfigError(format!("STORAGE_BACKEND must be `postgres` or `memory`, got `{other}`"))),
		}
	}
}

#[derive(Clone, Debug)]
pub struct Config {
	/// Which errors we want to log
	pub log_level: String,

	/// Port server is listening to
	pub server_ip_port: String,
	pub storage_backend: StorageBackend,
	/// Required for the postgres backend only.
	pub database_url: Option<String>,
	pub database_max_connections: u32,
	/// Comma separated.
	pub allow_origins: String,

	pub blob_root: String,
	/// Prefix of the URLs stored images are served under.
	pub public_image_base: String,

	pub character_source_url: String,
	pub external_fetch_timeout: Duration,
	pub request_timeout: Duration,

	pub reconciler_interval: Duration,
	pub reconciler_archive_expired: bool,
}

fn var_or(
	key: &str,
	default: &str,
) -> String {
	std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(
	key: &str,
	default: T,
) -> Result<T, ServiceError>
where
	T::Err: std::fmt::Display,
{
	match std::env::var(key) {
		Ok(raw) => raw.trim().parse().map_err(|err| ServiceError::ConfigError(format!("{key}: {err}"))),
		Err(_) => Ok(default),
	}
}

impl Config {
	pub fn new() -> Result<Config, ServiceError> {
		dotenv::dotenv().ok();
		let storage_backend = parse_var("STORAGE_BACKEND", StorageBackend::Postgres)?;
		let database_url = std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
		if storage_backend == StorageBackend::Postgres && database_url.is_none() {
			return Err(ServiceError::ConfigError("DATABASE_URL must be set for the postgres backend".into()));
		}

		let reconciler_interval = parse_var("RECONCILER_INTERVAL_SECS", 60u64)?;
		if reconciler_interval == 0 {
			return Err(ServiceError::ConfigError("RECONCILER_INTERVAL_SECS must be positive".into()));
		}

		Ok(Config {
			log_level: var_or("LOG_LEVEL", "warn"),
			server_ip_port: var_or("SERVER_IP_PORT", "0.0.0.0:80"),
			storage_backend,
			database_url,
			database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 30)?,
			allow_origins: var_or("ALLOW_ORIGINS", "http://localhost:3000,http://localhost:3001"),
			blob_root: var_or("BLOB_ROOT", "./data/blobs"),
			public_image_base: var_or("PUBLIC_IMAGE_BASE", "/images"),
			character_source_url: var_or("CHARACTER_SOURCE_URL", "https://rickandmortyapi.com/api/character"),
			external_fetch_timeout: Duration::from_secs(parse_var("EXTERNAL_FETCH_TIMEOUT_SECS", 10)?),
			request_timeout: Duration::from_secs(parse_var("REQUEST_TIMEOUT_SECS", 30)?),
			reconciler_interval: Duration::from_secs(reconciler_interval),
			reconciler_archive_expired: parse_var("RECONCILER_ARCHIVE_EXPIRED", false)?,
		})
	}
}
