// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization repository for database operations.
//!
//! Mutating methods take a `&mut SqliteConnection` so callers can compose
//! them inside one transaction (`&mut *tx`). Reads take a [`SoftDeleteMode`]
//! that decides whether soft-deleted rows are returned.

use chrono::{DateTime, Utc};
use orgraph_server_auth::{OrgId, Organization, SoftDeleteMode, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::{DbError, Result};
use crate::rows::{parse_id, parse_opt_id, parse_opt_ts, parse_ts, soft_delete_clause};

const ORG_COLUMNS: &str = "id, name, display_name, description, parent_id, is_personal, created_by, created_at, updated_at, deleted_at, deleted_by";

/// Repository for organization rows.
pub struct OrgRepository;

impl OrgRepository {
	/// Create a new organization.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if another active organization has the same name.
	#[tracing::instrument(skip(conn, org), fields(org_id = %org.id))]
	pub async fn create_org(conn: &mut SqliteConnection, org: &Organization) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO organizations (id, name, display_name, description, parent_id, is_personal, created_by, created_at, updated_at, deleted_at, deleted_by)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(org.id.to_string())
		.bind(&org.name)
		.bind(&org.display_name)
		.bind(&org.description)
		.bind(org.parent_id.map(|p| p.to_string()))
		.bind(org.is_personal as i32)
		.bind(org.created_by.map(|u| u.to_string()))
		.bind(org.created_at.to_rfc3339())
		.bind(org.updated_at.to_rfc3339())
		.bind(org.deleted_at.map(|d| d.to_rfc3339()))
		.bind(org.deleted_by.map(|u| u.to_string()))
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "organization name"))?;

		tracing::debug!(org_id = %org.id, "organization created");
		Ok(())
	}

	/// Get an organization by ID.
	///
	/// # Returns
	/// `None` if no organization exists with this ID, or if it is soft-deleted
	/// and `mode` excludes deleted rows.
	#[tracing::instrument(skip(conn), fields(org_id = %id))]
	pub async fn get_org_by_id(
		conn: &mut SqliteConnection,
		id: &OrgId,
		mode: SoftDeleteMode,
	) -> Result<Option<Organization>> {
		let sql = format!(
			"SELECT {ORG_COLUMNS} FROM organizations WHERE id = ?{}",
			soft_delete_clause(mode)
		);
		let row = sqlx::query(&sql)
			.bind(id.to_string())
			.fetch_optional(&mut *conn)
			.await?;

		row.map(|r| row_to_org(&r)).transpose()
	}

	/// List organizations ordered by creation time.
	#[tracing::instrument(skip(conn))]
	pub async fn list_orgs(conn: &mut SqliteConnection, mode: SoftDeleteMode) -> Result<Vec<Organization>> {
		let sql = format!(
			"SELECT {ORG_COLUMNS} FROM organizations WHERE 1 = 1{} ORDER BY created_at, id",
			soft_delete_clause(mode)
		);
		let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
		rows.iter().map(row_to_org).collect()
	}

	/// List the organizations with the given IDs, ordered by creation time.
	#[tracing::instrument(skip(conn, ids), fields(count = ids.len()))]
	pub async fn list_orgs_by_ids(
		conn: &mut SqliteConnection,
		ids: &[OrgId],
		mode: SoftDeleteMode,
	) -> Result<Vec<Organization>> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}
		let mut qb = QueryBuilder::<Sqlite>::new(format!(
			"SELECT {ORG_COLUMNS} FROM organizations WHERE 1 = 1{} AND id IN (",
			soft_delete_clause(mode)
		));
		let mut ids_sep = qb.separated(", ");
		for id in ids {
			ids_sep.push_bind(id.to_string());
		}
		ids_sep.push_unseparated(") ORDER BY created_at, id");

		let rows = qb.build().fetch_all(&mut *conn).await?;
		rows.iter().map(row_to_org).collect()
	}

	/// `(id, parent_id)` for every organization, used to build the hierarchy.
	#[tracing::instrument(skip(conn))]
	pub async fn list_hierarchy_edges(
		conn: &mut SqliteConnection,
		mode: SoftDeleteMode,
	) -> Result<Vec<(OrgId, Option<OrgId>)>> {
		let sql = format!(
			"SELECT id, parent_id FROM organizations WHERE 1 = 1{}",
			soft_delete_clause(mode)
		);
		let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
		rows
			.iter()
			.map(|r| {
				let id: String = r.get("id");
				let parent: Option<String> = r.get("parent_id");
				Ok((parse_id(&id, "org ID")?, parse_opt_id(parent, "parent org ID")?))
			})
			.collect()
	}

	/// The active personal organization of a user, if any.
	#[tracing::instrument(skip(conn), fields(user_id = %user_id))]
	pub async fn get_personal_org(
		conn: &mut SqliteConnection,
		user_id: &UserId,
	) -> Result<Option<Organization>> {
		let sql = format!(
			"SELECT {ORG_COLUMNS} FROM organizations WHERE is_personal = 1 AND created_by = ? AND deleted_at IS NULL"
		);
		let row = sqlx::query(&sql)
			.bind(user_id.to_string())
			.fetch_optional(&mut *conn)
			.await?;

		row.map(|r| row_to_org(&r)).transpose()
	}

	/// Update the mutable columns of an active organization.
	///
	/// # Errors
	/// - `DbError::NotFound` if the organization is missing or soft-deleted
	/// - `DbError::Conflict` if the new name collides with another active organization
	#[tracing::instrument(skip(conn, org), fields(org_id = %org.id))]
	pub async fn update_org(conn: &mut SqliteConnection, org: &Organization) -> Result<()> {
		let result = sqlx::query(
			r#"
			UPDATE organizations
			SET name = ?, display_name = ?, description = ?, updated_at = ?
			WHERE id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(&org.name)
		.bind(&org.display_name)
		.bind(&org.description)
		.bind(org.updated_at.to_rfc3339())
		.bind(org.id.to_string())
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "organization name"))?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("organization {}", org.id)));
		}

		tracing::debug!(org_id = %org.id, "organization updated");
		Ok(())
	}

	/// Soft-delete every active organization in `ids`.
	///
	/// # Returns
	/// The number of rows marked deleted.
	#[tracing::instrument(skip(conn, ids), fields(count = ids.len()))]
	pub async fn soft_delete_orgs(
		conn: &mut SqliteConnection,
		ids: &[OrgId],
		deleted_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<u64> {
		if ids.is_empty() {
			return Ok(0);
		}
		let mut qb = QueryBuilder::<Sqlite>::new("UPDATE organizations SET deleted_at = ");
		qb.push_bind(at.to_rfc3339());
		qb.push(", updated_at = ");
		qb.push_bind(at.to_rfc3339());
		qb.push(", deleted_by = ");
		qb.push_bind(deleted_by.to_string());
		qb.push(" WHERE deleted_at IS NULL AND id IN (");
		let mut ids_sep = qb.separated(", ");
		for id in ids {
			ids_sep.push_bind(id.to_string());
		}
		ids_sep.push_unseparated(")");

		let result = qb.build().execute(&mut *conn).await?;
		tracing::debug!(deleted = result.rows_affected(), "organizations soft-deleted");
		Ok(result.rows_affected())
	}
}

fn row_to_org(row: &SqliteRow) -> Result<Organization> {
	let id: String = row.get("id");
	let parent_id: Option<String> = row.get("parent_id");
	let is_personal: i32 = row.get("is_personal");
	let created_by: Option<String> = row.get("created_by");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let deleted_at: Option<String> = row.get("deleted_at");
	let deleted_by: Option<String> = row.get("deleted_by");

	Ok(Organization {
		id: parse_id(&id, "org ID")?,
		name: row.get("name"),
		display_name: row.get("display_name"),
		description: row.get("description"),
		parent_id: parse_opt_id(parent_id, "parent org ID")?,
		is_personal: is_personal != 0,
		created_by: parse_opt_id(created_by, "created_by")?,
		created_at: parse_ts(&created_at, "created_at")?,
		updated_at: parse_ts(&updated_at, "updated_at")?,
		deleted_at: parse_opt_ts(deleted_at, "deleted_at")?,
		deleted_by: parse_opt_id(deleted_by, "deleted_by")?,
	})
}
