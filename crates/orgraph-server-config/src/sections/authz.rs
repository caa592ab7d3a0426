// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Relationship store configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_TUPLES_PER_WRITE: usize = 100;

/// Which relationship store backs authorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthzBackend {
	/// In-process store. Tuples do not survive a restart.
	#[default]
	Memory,
	#[serde(rename = "openfga")]
	OpenFga,
}

impl std::str::FromStr for AuthzBackend {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"memory" => Ok(AuthzBackend::Memory),
			"openfga" => Ok(AuthzBackend::OpenFga),
			other => Err(format!("unknown authz backend '{other}'")),
		}
	}
}

impl std::fmt::Display for AuthzBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			AuthzBackend::Memory => write!(f, "memory"),
			AuthzBackend::OpenFga => write!(f, "openfga"),
		}
	}
}

/// Connection settings for an OpenFGA server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFgaSettings {
	pub api_url: String,
	pub store_id: String,
	pub authorization_model_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzConfig {
	pub backend: AuthzBackend,
	/// Present iff `backend` is `openfga`.
	pub openfga: Option<OpenFgaSettings>,
	pub request_timeout: Duration,
	pub max_tuples_per_write: usize,
}

impl Default for AuthzConfig {
	fn default() -> Self {
		Self {
			backend: AuthzBackend::Memory,
			openfga: None,
			request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
			max_tuples_per_write: DEFAULT_MAX_TUPLES_PER_WRITE,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfigLayer {
	#[serde(default)]
	pub backend: Option<AuthzBackend>,
	#[serde(default)]
	pub api_url: Option<String>,
	#[serde(default)]
	pub store_id: Option<String>,
	#[serde(default)]
	pub authorization_model_id: Option<String>,
	#[serde(default)]
	pub request_timeout_ms: Option<u64>,
	#[serde(default)]
	pub max_tuples_per_write: Option<usize>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: AuthzConfigLayer) {
		if other.backend.is_some() {
			self.backend = other.backend;
		}
		if other.api_url.is_some() {
			self.api_url = other.api_url;
		}
		if other.store_id.is_some() {
			self.store_id = other.store_id;
		}
		if other.authorization_model_id.is_some() {
			self.authorization_model_id = other.authorization_model_id;
		}
		if other.request_timeout_ms.is_some() {
			self.request_timeout_ms = other.request_timeout_ms;
		}
		if other.max_tuples_per_write.is_some() {
			self.max_tuples_per_write = other.max_tuples_per_write;
		}
	}

	pub fn finalize(self) -> Result<AuthzConfig, ConfigError> {
		let backend = self.backend.unwrap_or_default();
		let openfga = match backend {
			AuthzBackend::Memory => None,
			AuthzBackend::OpenFga => Some(OpenFgaSettings {
				api_url: self
					.api_url
					.ok_or_else(|| ConfigError::MissingField("authz.api_url".to_string()))?,
				store_id: self
					.store_id
					.ok_or_else(|| ConfigError::MissingField("authz.store_id".to_string()))?,
				authorization_model_id: self.authorization_model_id,
			}),
		};

		let max_tuples_per_write = self
			.max_tuples_per_write
			.unwrap_or(DEFAULT_MAX_TUPLES_PER_WRITE);
		if max_tuples_per_write == 0 {
			return Err(ConfigError::InvalidValue {
				key: "authz.max_tuples_per_write".to_string(),
				message: "must be at least 1".to_string(),
			});
		}

		Ok(AuthzConfig {
			backend,
			openfga,
			request_timeout: Duration::from_millis(
				self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
			),
			max_tuples_per_write,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_memory_backend_by_default() {
		let config = AuthzConfigLayer::default().finalize().unwrap();
		assert_eq!(config, AuthzConfig::default());
	}

	#[test]
	fn test_openfga_requires_store() {
		let layer = AuthzConfigLayer {
			backend: Some(AuthzBackend::OpenFga),
			api_url: Some("http://localhost:8080".to_string()),
			..Default::default()
		};
		let err = layer.finalize().unwrap_err();
		assert!(err.to_string().contains("authz.store_id"));
	}

	#[test]
	fn test_openfga_settings() {
		let layer = AuthzConfigLayer {
			backend: Some(AuthzBackend::OpenFga),
			api_url: Some("http://localhost:8080".to_string()),
			store_id: Some("01HSTORE".to_string()),
			request_timeout_ms: Some(250),
			..Default::default()
		};
		let config = layer.finalize().unwrap();
		let openfga = config.openfga.unwrap();
		assert_eq!(openfga.store_id, "01HSTORE");
		assert_eq!(openfga.authorization_model_id, None);
		assert_eq!(config.request_timeout, Duration::from_millis(250));
	}

	#[test]
	fn test_zero_chunk_size_rejected() {
		let layer = AuthzConfigLayer {
			max_tuples_per_write: Some(0),
			..Default::default()
		};
		assert!(layer.finalize().is_err());
	}
}
