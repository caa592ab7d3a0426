// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ledger of relationship tuples awaiting deletion.
//!
//! Cascades insert one row per tuple inside the soft-delete transaction and
//! remove rows as the relationship store confirms each deletion. Rows that
//! remain mark divergence between the relational and relationship stores.
//! Tuples are stored in their `type:id[#relation]` string form.

use chrono::{DateTime, Utc};
use orgraph_server_auth::OrgId;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::Result;
use crate::rows::{parse_id, parse_ts};

/// A tuple to be deleted, as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTupleDeletion {
	pub id: i64,
	pub root_org_id: OrgId,
	pub subject: String,
	pub relation: String,
	pub object: String,
	pub attempts: i64,
	pub last_error: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// A tuple to enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleKey {
	pub subject: String,
	pub relation: String,
	pub object: String,
}

pub struct ReconciliationRepository;

impl ReconciliationRepository {
	/// Enqueue tuples for deletion. Tuples already pending are left as is.
	#[tracing::instrument(skip(conn, tuples), fields(root_org_id = %root_org_id, count = tuples.len()))]
	pub async fn enqueue(
		conn: &mut SqliteConnection,
		root_org_id: &OrgId,
		tuples: &[TupleKey],
		at: DateTime<Utc>,
	) -> Result<()> {
		for tuple in tuples {
			sqlx::query(
				r#"
				INSERT INTO authz_reconciliation (root_org_id, subject, relation, object, attempts, created_at, updated_at)
				VALUES (?, ?, ?, ?, 0, ?, ?)
				ON CONFLICT (subject, relation, object) DO NOTHING
				"#,
			)
			.bind(root_org_id.to_string())
			.bind(&tuple.subject)
			.bind(&tuple.relation)
			.bind(&tuple.object)
			.bind(at.to_rfc3339())
			.bind(at.to_rfc3339())
			.execute(&mut *conn)
			.await?;
		}
		tracing::debug!("tuple deletions enqueued");
		Ok(())
	}

	/// Up to `limit` pending deletions with ids above `after_id`, oldest
	/// first. Pass the last id of one page to fetch the next.
	#[tracing::instrument(skip(conn))]
	pub async fn list_pending(
		conn: &mut SqliteConnection,
		after_id: i64,
		limit: i64,
	) -> Result<Vec<PendingTupleDeletion>> {
		let rows = sqlx::query(
			r#"
			SELECT id, root_org_id, subject, relation, object, attempts, last_error, created_at
			FROM authz_reconciliation
			WHERE id > ?
			ORDER BY id
			LIMIT ?
			"#,
		)
		.bind(after_id)
		.bind(limit)
		.fetch_all(&mut *conn)
		.await?;
		rows.iter().map(row_to_pending).collect()
	}

	/// Pending deletions enqueued by the cascade rooted at `root_org_id`.
	#[tracing::instrument(skip(conn), fields(root_org_id = %root_org_id))]
	pub async fn list_pending_for_root(
		conn: &mut SqliteConnection,
		root_org_id: &OrgId,
	) -> Result<Vec<PendingTupleDeletion>> {
		let rows = sqlx::query(
			r#"
			SELECT id, root_org_id, subject, relation, object, attempts, last_error, created_at
			FROM authz_reconciliation
			WHERE root_org_id = ?
			ORDER BY id
			"#,
		)
		.bind(root_org_id.to_string())
		.fetch_all(&mut *conn)
		.await?;
		rows.iter().map(row_to_pending).collect()
	}

	#[tracing::instrument(skip(conn))]
	pub async fn count_pending(conn: &mut SqliteConnection) -> Result<i64> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authz_reconciliation")
			.fetch_one(&mut *conn)
			.await?;
		Ok(count)
	}

	/// Remove confirmed deletions.
	#[tracing::instrument(skip(conn, ids), fields(count = ids.len()))]
	pub async fn remove(conn: &mut SqliteConnection, ids: &[i64]) -> Result<u64> {
		if ids.is_empty() {
			return Ok(0);
		}
		let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM authz_reconciliation WHERE id IN (");
		let mut ids_sep = qb.separated(", ");
		for id in ids {
			ids_sep.push_bind(*id);
		}
		ids_sep.push_unseparated(")");
		let result = qb.build().execute(&mut *conn).await?;
		Ok(result.rows_affected())
	}

	/// Bump the attempt count of deletions that failed again.
	#[tracing::instrument(skip(conn, ids, error), fields(count = ids.len()))]
	pub async fn record_failure(
		conn: &mut SqliteConnection,
		ids: &[i64],
		error: &str,
		at: DateTime<Utc>,
	) -> Result<()> {
		if ids.is_empty() {
			return Ok(());
		}
		let mut qb = QueryBuilder::<Sqlite>::new(
			"UPDATE authz_reconciliation SET attempts = attempts + 1, last_error = ",
		);
		qb.push_bind(error.to_string());
		qb.push(", updated_at = ");
		qb.push_bind(at.to_rfc3339());
		qb.push(" WHERE id IN (");
		let mut ids_sep = qb.separated(", ");
		for id in ids {
			ids_sep.push_bind(*id);
		}
		ids_sep.push_unseparated(")");
		qb.build().execute(&mut *conn).await?;
		Ok(())
	}
}

fn row_to_pending(row: &SqliteRow) -> Result<PendingTupleDeletion> {
	let root_org_id: String = row.get("root_org_id");
	let created_at: String = row.get("created_at");

	Ok(PendingTupleDeletion {
		id: row.get("id"),
		root_org_id: parse_id(&root_org_id, "root org ID")?,
		subject: row.get("subject"),
		relation: row.get("relation"),
		object: row.get("object"),
		attempts: row.get("attempts"),
		last_error: row.get("last_error"),
		created_at: parse_ts(&created_at, "created_at")?,
	})
}
