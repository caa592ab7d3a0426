// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the orgraph server.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. Config file (`/etc/orgraph/server.toml` unless overridden)
//! 3. Environment variables (`ORGRAPH_<SECTION>_<FIELD>`)
//!
//! ```ignore
//! let config = orgraph_server_config::load_config()?;
//! println!("database: {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

use std::path::PathBuf;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub authz: AuthzConfig,
	pub logging: LoggingConfig,
	pub reconcile: ReconcileConfig,
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let authz = layer.authz.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();
	let reconcile = layer.reconcile.unwrap_or_default().finalize();

	if database.url.trim().is_empty() {
		return Err(ConfigError::Validation("database.url must not be empty".to_string()));
	}

	info!(
		database = %database.url,
		authz_backend = %authz.backend,
		max_tuples_per_write = authz.max_tuples_per_write,
		reconcile_batch_size = reconcile.batch_size,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		authz,
		logging,
		reconcile,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Fixed(Precedence, &'static str);

	impl ConfigSource for Fixed {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
			Ok(ServerConfigLayer {
				logging: Some(LoggingConfigLayer {
					level: Some(self.1.to_string()),
					format: None,
				}),
				..Default::default()
			})
		}
	}

	#[test]
	fn test_defaults_finalize() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config, ServerConfig::default());
		assert_eq!(config.authz.backend, AuthzBackend::Memory);
		assert_eq!(config.logging.level, "info");
	}

	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let config = load_sources(vec![
			Box::new(Fixed(Precedence::Environment, "trace")),
			Box::new(Fixed(Precedence::ConfigFile, "warn")),
			Box::new(DefaultsSource),
		])
		.unwrap();
		assert_eq!(config.logging.level, "trace");
	}

	#[test]
	fn test_empty_database_url_rejected() {
		let layer = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("  ".to_string()),
				max_connections: None,
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}
}
