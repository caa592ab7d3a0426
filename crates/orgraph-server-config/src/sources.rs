// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuthzConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, ReconcileConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/orgraph/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: ORGRAPH_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_from_lookup(|name| std::env::var(name).ok())
	}
}

/// Build a layer from an arbitrary variable lookup.
pub(crate) fn load_from_lookup(
	lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServerConfigLayer, ConfigError> {
	let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

	Ok(ServerConfigLayer {
		database: Some(DatabaseConfigLayer {
			url: var("ORGRAPH_DATABASE_URL"),
			max_connections: parse(&var, "ORGRAPH_DATABASE_MAX_CONNECTIONS")?,
		}),
		authz: Some(AuthzConfigLayer {
			backend: parse(&var, "ORGRAPH_AUTHZ_BACKEND")?,
			api_url: var("ORGRAPH_AUTHZ_API_URL"),
			store_id: var("ORGRAPH_AUTHZ_STORE_ID"),
			authorization_model_id: var("ORGRAPH_AUTHZ_AUTHORIZATION_MODEL_ID"),
			request_timeout_ms: parse(&var, "ORGRAPH_AUTHZ_REQUEST_TIMEOUT_MS")?,
			max_tuples_per_write: parse(&var, "ORGRAPH_AUTHZ_MAX_TUPLES_PER_WRITE")?,
		}),
		logging: Some(LoggingConfigLayer {
			level: var("ORGRAPH_LOGGING_LEVEL"),
			format: parse(&var, "ORGRAPH_LOGGING_FORMAT")?,
		}),
		reconcile: Some(ReconcileConfigLayer {
			batch_size: parse(&var, "ORGRAPH_RECONCILE_BATCH_SIZE")?,
		}),
	})
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match var(name) {
		Some(v) => v.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}': {e}"),
		}),
		None => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;
	use crate::sections::{AuthzBackend, LogFormat};

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.database.is_none());
		assert!(layer.authz.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/server.toml").load().unwrap();
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_env_lookup_parses_sections() {
		let layer = load_from_lookup(lookup(&[
			("ORGRAPH_DATABASE_URL", "sqlite::memory:"),
			("ORGRAPH_AUTHZ_BACKEND", "openfga"),
			("ORGRAPH_AUTHZ_MAX_TUPLES_PER_WRITE", "25"),
			("ORGRAPH_LOGGING_FORMAT", "json"),
			("ORGRAPH_RECONCILE_BATCH_SIZE", ""),
		]))
		.unwrap();

		assert_eq!(layer.database.unwrap().url.as_deref(), Some("sqlite::memory:"));
		let authz = layer.authz.unwrap();
		assert_eq!(authz.backend, Some(AuthzBackend::OpenFga));
		assert_eq!(authz.max_tuples_per_write, Some(25));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
		assert_eq!(layer.reconcile.unwrap().batch_size, None);
	}

	#[test]
	fn test_env_lookup_rejects_bad_numbers() {
		let err = load_from_lookup(lookup(&[("ORGRAPH_RECONCILE_BATCH_SIZE", "lots")])).unwrap_err();
		assert!(err.to_string().contains("ORGRAPH_RECONCILE_BATCH_SIZE"));
	}
}
