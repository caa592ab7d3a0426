// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring for the orgraph operator binary: configuration to pool,
//! relationship store and services.

use std::sync::Arc;

use orgraph_fga::{FgaError, MemoryRelationshipStore, OpenFgaClient, OpenFgaConfig, RelationshipStore};
use orgraph_server_config::{AuthzBackend, AuthzConfig, ConfigError, LogFormat, ServerConfig};
use orgraph_server_db::DbError;
use orgraph_server_orgs::{authorization_model, MutationCoordinator, OrgError, OrgService};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
pub enum ServerError {
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("database error: {0}")]
	Db(#[from] DbError),

	#[error("relationship store error: {0}")]
	Fga(#[from] FgaError),

	#[error(transparent)]
	Org(#[from] OrgError),
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
pub fn init_tracing(config: &ServerConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	match config.logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

/// Build the relationship store selected by configuration.
pub fn build_store(config: &AuthzConfig) -> Result<Arc<dyn RelationshipStore>, ServerError> {
	match (config.backend, &config.openfga) {
		(AuthzBackend::OpenFga, Some(settings)) => {
			let client = OpenFgaClient::new(OpenFgaConfig {
				api_url: settings.api_url.clone(),
				store_id: settings.store_id.clone(),
				authorization_model_id: settings.authorization_model_id.clone(),
				request_timeout: config.request_timeout,
			})?;
			Ok(Arc::new(client))
		}
		(AuthzBackend::OpenFga, None) => Err(ConfigError::MissingField("authz.api_url".to_string()).into()),
		(AuthzBackend::Memory, _) => {
			tracing::warn!("using in-memory relationship store; tuples are lost on exit");
			Ok(Arc::new(MemoryRelationshipStore::new(authorization_model())))
		}
	}
}

/// Connect to the database, migrate it and assemble the service.
pub async fn build_service(config: &ServerConfig) -> Result<OrgService, ServerError> {
	let pool = orgraph_server_db::create_pool(&config.database.url, config.database.max_connections)
		.await?;
	orgraph_server_db::run_migrations(&pool).await?;

	let store = build_store(&config.authz)?;
	let coordinator = MutationCoordinator::new(pool, store)
		.with_max_tuples_per_write(config.authz.max_tuples_per_write);
	Ok(OrgService::from_coordinator(coordinator))
}
