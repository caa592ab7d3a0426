// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	("001_users", include_str!("../migrations/001_users.sql")),
	("002_organizations", include_str!("../migrations/002_organizations.sql")),
	("003_user_settings", include_str!("../migrations/003_user_settings.sql")),
	("004_groups", include_str!("../migrations/004_groups.sql")),
	(
		"005_history_and_reconciliation",
		include_str!("../migrations/005_history_and_reconciliation.sql"),
	),
];

/// Run all embedded migrations in order.
///
/// # Note
/// Migrations are idempotent - safe to run multiple times.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for (name, sql) in MIGRATIONS {
		for stmt in sql.split(';').filter(|s| !s.trim().is_empty()) {
			sqlx::query(stmt).execute(pool).await.map_err(|e| {
				tracing::error!(migration = %name, error = %e, "migration failed");
				DbError::from(e)
			})?;
		}
		tracing::debug!(migration = %name, "migration applied");
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn migrations_are_idempotent() {
		let pool = create_test_pool().await;
		run_migrations(&pool).await.unwrap();

		let tables: Vec<(String,)> =
			sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
				.fetch_all(&pool)
				.await
				.unwrap();
		let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
		assert_eq!(
			names,
			vec![
				"authz_reconciliation",
				"entity_history",
				"groups",
				"org_memberships",
				"organization_settings",
				"organizations",
				"user_settings",
				"users",
			]
		);
	}
}
