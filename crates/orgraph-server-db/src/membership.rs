// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization membership repository.

use chrono::{DateTime, Utc};
use orgraph_server_auth::{MembershipId, OrgId, OrgMembership, OrgRole, SoftDeleteMode, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::{DbError, Result};
use crate::rows::{parse_id, parse_opt_ts, parse_ts, soft_delete_clause};

const MEMBERSHIP_COLUMNS: &str = "id, org_id, user_id, role, created_at, updated_at, deleted_at";

pub struct MembershipRepository;

impl MembershipRepository {
	/// # Errors
	/// Returns `DbError::Conflict` if the user already has an active membership in the org.
	#[tracing::instrument(skip(conn, membership), fields(org_id = %membership.org_id, user_id = %membership.user_id))]
	pub async fn create_membership(
		conn: &mut SqliteConnection,
		membership: &OrgMembership,
	) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO org_memberships (id, org_id, user_id, role, created_at, updated_at, deleted_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(membership.id.to_string())
		.bind(membership.org_id.to_string())
		.bind(membership.user_id.to_string())
		.bind(membership.role.to_string())
		.bind(membership.created_at.to_rfc3339())
		.bind(membership.updated_at.to_rfc3339())
		.bind(membership.deleted_at.map(|d| d.to_rfc3339()))
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "membership"))?;

		tracing::debug!(membership_id = %membership.id, role = %membership.role, "membership created");
		Ok(())
	}

	#[tracing::instrument(skip(conn), fields(membership_id = %id))]
	pub async fn get_membership_by_id(
		conn: &mut SqliteConnection,
		id: &MembershipId,
		mode: SoftDeleteMode,
	) -> Result<Option<OrgMembership>> {
		let sql = format!(
			"SELECT {MEMBERSHIP_COLUMNS} FROM org_memberships WHERE id = ?{}",
			soft_delete_clause(mode)
		);
		let row = sqlx::query(&sql)
			.bind(id.to_string())
			.fetch_optional(&mut *conn)
			.await?;
		row.map(|r| row_to_membership(&r)).transpose()
	}

	/// The active membership of `user_id` in `org_id`.
	#[tracing::instrument(skip(conn), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn get_membership(
		conn: &mut SqliteConnection,
		org_id: &OrgId,
		user_id: &UserId,
	) -> Result<Option<OrgMembership>> {
		let sql = format!(
			"SELECT {MEMBERSHIP_COLUMNS} FROM org_memberships WHERE org_id = ? AND user_id = ? AND deleted_at IS NULL"
		);
		let row = sqlx::query(&sql)
			.bind(org_id.to_string())
			.bind(user_id.to_string())
			.fetch_optional(&mut *conn)
			.await?;
		row.map(|r| row_to_membership(&r)).transpose()
	}

	#[tracing::instrument(skip(conn), fields(org_id = %org_id))]
	pub async fn list_memberships_for_org(
		conn: &mut SqliteConnection,
		org_id: &OrgId,
		mode: SoftDeleteMode,
	) -> Result<Vec<OrgMembership>> {
		let sql = format!(
			"SELECT {MEMBERSHIP_COLUMNS} FROM org_memberships WHERE org_id = ?{} ORDER BY created_at, id",
			soft_delete_clause(mode)
		);
		let rows = sqlx::query(&sql)
			.bind(org_id.to_string())
			.fetch_all(&mut *conn)
			.await?;
		rows.iter().map(row_to_membership).collect()
	}

	/// Memberships of a user, oldest first.
	#[tracing::instrument(skip(conn), fields(user_id = %user_id))]
	pub async fn list_memberships_for_user(
		conn: &mut SqliteConnection,
		user_id: &UserId,
		mode: SoftDeleteMode,
	) -> Result<Vec<OrgMembership>> {
		let sql = format!(
			"SELECT {MEMBERSHIP_COLUMNS} FROM org_memberships WHERE user_id = ?{} ORDER BY created_at, id",
			soft_delete_clause(mode)
		);
		let rows = sqlx::query(&sql)
			.bind(user_id.to_string())
			.fetch_all(&mut *conn)
			.await?;
		rows.iter().map(row_to_membership).collect()
	}

	/// Memberships in any of `org_ids`.
	#[tracing::instrument(skip(conn, org_ids), fields(count = org_ids.len()))]
	pub async fn list_memberships_for_orgs(
		conn: &mut SqliteConnection,
		org_ids: &[OrgId],
		mode: SoftDeleteMode,
	) -> Result<Vec<OrgMembership>> {
		if org_ids.is_empty() {
			return Ok(Vec::new());
		}
		let mut qb = QueryBuilder::<Sqlite>::new(format!(
			"SELECT {MEMBERSHIP_COLUMNS} FROM org_memberships WHERE 1 = 1{} AND org_id IN (",
			soft_delete_clause(mode)
		));
		let mut ids_sep = qb.separated(", ");
		for id in org_ids {
			ids_sep.push_bind(id.to_string());
		}
		ids_sep.push_unseparated(") ORDER BY created_at, id");

		let rows = qb.build().fetch_all(&mut *conn).await?;
		rows.iter().map(row_to_membership).collect()
	}

	/// Read an active membership after taking the database write lock, so a
	/// read-modify-write in the same transaction cannot interleave with
	/// another writer.
	#[tracing::instrument(skip(conn), fields(membership_id = %id))]
	pub async fn get_membership_for_update(
		conn: &mut SqliteConnection,
		id: &MembershipId,
	) -> Result<Option<OrgMembership>> {
		sqlx::query("UPDATE org_memberships SET updated_at = updated_at WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *conn)
			.await?;
		Self::get_membership_by_id(conn, id, SoftDeleteMode::Exclude).await
	}

	/// Set the role of `membership`, provided its row still holds the role it
	/// was read with. Returns `false` when the row changed or was deleted.
	#[tracing::instrument(skip(conn, membership), fields(membership_id = %membership.id, role = %role))]
	pub async fn update_membership_role(
		conn: &mut SqliteConnection,
		membership: &OrgMembership,
		role: OrgRole,
		at: DateTime<Utc>,
	) -> Result<bool> {
		let result = sqlx::query(
			"UPDATE org_memberships SET role = ?, updated_at = ? WHERE id = ? AND role = ? AND deleted_at IS NULL",
		)
		.bind(role.to_string())
		.bind(at.to_rfc3339())
		.bind(membership.id.to_string())
		.bind(membership.role.to_string())
		.execute(&mut *conn)
		.await?;

		let updated = result.rows_affected() > 0;
		tracing::debug!(updated, "membership role update");
		Ok(updated)
	}

	/// Soft-delete `membership`, provided its row still holds the role it was
	/// read with. Returns `false` when the row changed or was deleted.
	#[tracing::instrument(skip(conn, membership), fields(membership_id = %membership.id))]
	pub async fn soft_delete_membership(
		conn: &mut SqliteConnection,
		membership: &OrgMembership,
		at: DateTime<Utc>,
	) -> Result<bool> {
		let result = sqlx::query(
			"UPDATE org_memberships SET deleted_at = ?, updated_at = ? WHERE id = ? AND role = ? AND deleted_at IS NULL",
		)
		.bind(at.to_rfc3339())
		.bind(at.to_rfc3339())
		.bind(membership.id.to_string())
		.bind(membership.role.to_string())
		.execute(&mut *conn)
		.await?;

		let deleted = result.rows_affected() > 0;
		tracing::debug!(deleted, "membership soft-delete");
		Ok(deleted)
	}

	/// Soft-delete every active membership in any of `org_ids`.
	#[tracing::instrument(skip(conn, org_ids), fields(count = org_ids.len()))]
	pub async fn soft_delete_memberships_for_orgs(
		conn: &mut SqliteConnection,
		org_ids: &[OrgId],
		at: DateTime<Utc>,
	) -> Result<u64> {
		if org_ids.is_empty() {
			return Ok(0);
		}
		let mut qb = QueryBuilder::<Sqlite>::new("UPDATE org_memberships SET deleted_at = ");
		qb.push_bind(at.to_rfc3339());
		qb.push(", updated_at = ");
		qb.push_bind(at.to_rfc3339());
		qb.push(" WHERE deleted_at IS NULL AND org_id IN (");
		let mut ids_sep = qb.separated(", ");
		for id in org_ids {
			ids_sep.push_bind(id.to_string());
		}
		ids_sep.push_unseparated(")");

		let result = qb.build().execute(&mut *conn).await?;
		tracing::debug!(deleted = result.rows_affected(), "memberships soft-deleted");
		Ok(result.rows_affected())
	}
}

fn row_to_membership(row: &SqliteRow) -> Result<OrgMembership> {
	let id: String = row.get("id");
	let org_id: String = row.get("org_id");
	let user_id: String = row.get("user_id");
	let role: String = row.get("role");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let deleted_at: Option<String> = row.get("deleted_at");

	Ok(OrgMembership {
		id: parse_id(&id, "membership ID")?,
		org_id: parse_id(&org_id, "org ID")?,
		user_id: parse_id(&user_id, "user ID")?,
		role: parse_id(&role, "role")?,
		created_at: parse_ts(&created_at, "created_at")?,
		updated_at: parse_ts(&updated_at, "updated_at")?,
		deleted_at: parse_opt_ts(deleted_at, "deleted_at")?,
	})
}
