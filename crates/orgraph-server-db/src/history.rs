// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mutation history.
//!
//! Every mutation writes a snapshot row inside its own transaction, so a
//! rolled-back mutation leaves no history behind.

use chrono::{DateTime, Utc};
use orgraph_server_auth::UserId;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::fmt;

use crate::error::{DbError, Result};
use crate::rows::{parse_opt_id, parse_ts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOperation {
	Create,
	Update,
	Delete,
}

impl fmt::Display for HistoryOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			HistoryOperation::Create => "create",
			HistoryOperation::Update => "update",
			HistoryOperation::Delete => "delete",
		})
	}
}

impl std::str::FromStr for HistoryOperation {
	type Err = DbError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"create" => Ok(HistoryOperation::Create),
			"update" => Ok(HistoryOperation::Update),
			"delete" => Ok(HistoryOperation::Delete),
			other => Err(DbError::Internal(format!("unknown history operation '{other}'"))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
	pub entity_type: String,
	pub entity_id: String,
	pub operation: HistoryOperation,
	pub actor_id: Option<UserId>,
	pub snapshot: serde_json::Value,
	pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
	pub fn new<T: Serialize>(
		entity_type: &str,
		entity_id: impl ToString,
		operation: HistoryOperation,
		actor_id: Option<UserId>,
		entity: &T,
	) -> Result<Self> {
		Ok(Self {
			entity_type: entity_type.to_string(),
			entity_id: entity_id.to_string(),
			operation,
			actor_id,
			snapshot: serde_json::to_value(entity)?,
			recorded_at: Utc::now(),
		})
	}
}

pub struct HistoryRepository;

impl HistoryRepository {
	#[tracing::instrument(skip(conn, entry), fields(entity_type = %entry.entity_type, entity_id = %entry.entity_id, operation = %entry.operation))]
	pub async fn record(conn: &mut SqliteConnection, entry: &HistoryEntry) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO entity_history (entity_type, entity_id, operation, actor_id, snapshot, recorded_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&entry.entity_type)
		.bind(&entry.entity_id)
		.bind(entry.operation.to_string())
		.bind(entry.actor_id.map(|u| u.to_string()))
		.bind(serde_json::to_string(&entry.snapshot)?)
		.bind(entry.recorded_at.to_rfc3339())
		.execute(&mut *conn)
		.await?;
		Ok(())
	}

	/// History of one entity, oldest first.
	#[tracing::instrument(skip(conn))]
	pub async fn list_for_entity(
		conn: &mut SqliteConnection,
		entity_type: &str,
		entity_id: &str,
	) -> Result<Vec<HistoryEntry>> {
		let rows = sqlx::query(
			r#"
			SELECT entity_type, entity_id, operation, actor_id, snapshot, recorded_at
			FROM entity_history
			WHERE entity_type = ? AND entity_id = ?
			ORDER BY id
			"#,
		)
		.bind(entity_type)
		.bind(entity_id)
		.fetch_all(&mut *conn)
		.await?;

		rows.iter().map(row_to_entry).collect()
	}
}

fn row_to_entry(row: &SqliteRow) -> Result<HistoryEntry> {
	let operation: String = row.get("operation");
	let actor_id: Option<String> = row.get("actor_id");
	let snapshot: String = row.get("snapshot");
	let recorded_at: String = row.get("recorded_at");

	Ok(HistoryEntry {
		entity_type: row.get("entity_type"),
		entity_id: row.get("entity_id"),
		operation: operation.parse()?,
		actor_id: parse_opt_id(actor_id, "actor ID")?,
		snapshot: serde_json::from_str(&snapshot)?,
		recorded_at: parse_ts(&recorded_at, "recorded_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use serde_json::json;

	#[tokio::test]
	async fn records_are_listed_in_order() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let actor = UserId::generate();

		for op in [HistoryOperation::Create, HistoryOperation::Update, HistoryOperation::Delete] {
			let entry =
				HistoryEntry::new("organization", "o1", op, Some(actor), &json!({ "name": "acme" })).unwrap();
			HistoryRepository::record(&mut conn, &entry).await.unwrap();
		}

		let entries = HistoryRepository::list_for_entity(&mut conn, "organization", "o1")
			.await
			.unwrap();
		let ops: Vec<_> = entries.iter().map(|e| e.operation).collect();
		assert_eq!(
			ops,
			vec![HistoryOperation::Create, HistoryOperation::Update, HistoryOperation::Delete]
		);
		assert_eq!(entries[0].snapshot["name"], "acme");
		assert_eq!(entries[0].actor_id, Some(actor));
	}

	#[tokio::test]
	async fn rolled_back_transaction_leaves_no_history() {
		let pool = create_test_pool().await;
		let mut tx = pool.begin().await.unwrap();
		let entry =
			HistoryEntry::new("group", "g1", HistoryOperation::Create, None, &json!({})).unwrap();
		HistoryRepository::record(&mut tx, &entry).await.unwrap();
		tx.rollback().await.unwrap();

		let mut conn = pool.acquire().await.unwrap();
		assert!(HistoryRepository::list_for_entity(&mut conn, "group", "g1")
			.await
			.unwrap()
			.is_empty());
	}
}
