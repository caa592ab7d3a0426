// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Group repository.

use chrono::{DateTime, Utc};
use orgraph_server_auth::{Group, GroupId, OrgId, SoftDeleteMode};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::{DbError, Result};
use crate::rows::{parse_id, parse_opt_ts, parse_ts, soft_delete_clause};

const GROUP_COLUMNS: &str =
	"id, owner_id, name, display_name, description, created_by, created_at, updated_at, deleted_at";

pub struct GroupRepository;

impl GroupRepository {
	/// # Errors
	/// Returns `DbError::Conflict` if the owner already has an active group with the name.
	#[tracing::instrument(skip(conn, group), fields(group_id = %group.id, owner_id = %group.owner_id))]
	pub async fn create_group(conn: &mut SqliteConnection, group: &Group) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO groups (id, owner_id, name, display_name, description, created_by, created_at, updated_at, deleted_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(group.id.to_string())
		.bind(group.owner_id.to_string())
		.bind(&group.name)
		.bind(&group.display_name)
		.bind(&group.description)
		.bind(group.created_by.to_string())
		.bind(group.created_at.to_rfc3339())
		.bind(group.updated_at.to_rfc3339())
		.bind(group.deleted_at.map(|d| d.to_rfc3339()))
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "group name"))?;

		tracing::debug!("group created");
		Ok(())
	}

	#[tracing::instrument(skip(conn), fields(group_id = %id))]
	pub async fn get_group_by_id(
		conn: &mut SqliteConnection,
		id: &GroupId,
		mode: SoftDeleteMode,
	) -> Result<Option<Group>> {
		let sql = format!(
			"SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?{}",
			soft_delete_clause(mode)
		);
		let row = sqlx::query(&sql)
			.bind(id.to_string())
			.fetch_optional(&mut *conn)
			.await?;
		row.map(|r| row_to_group(&r)).transpose()
	}

	/// Groups owned by any of `owner_ids`.
	#[tracing::instrument(skip(conn, owner_ids), fields(count = owner_ids.len()))]
	pub async fn list_groups_for_orgs(
		conn: &mut SqliteConnection,
		owner_ids: &[OrgId],
		mode: SoftDeleteMode,
	) -> Result<Vec<Group>> {
		if owner_ids.is_empty() {
			return Ok(Vec::new());
		}
		let mut qb = QueryBuilder::<Sqlite>::new(format!(
			"SELECT {GROUP_COLUMNS} FROM groups WHERE 1 = 1{} AND owner_id IN (",
			soft_delete_clause(mode)
		));
		let mut ids_sep = qb.separated(", ");
		for id in owner_ids {
			ids_sep.push_bind(id.to_string());
		}
		ids_sep.push_unseparated(") ORDER BY created_at, id");

		let rows = qb.build().fetch_all(&mut *conn).await?;
		rows.iter().map(row_to_group).collect()
	}

	#[tracing::instrument(skip(conn))]
	pub async fn list_groups(conn: &mut SqliteConnection, mode: SoftDeleteMode) -> Result<Vec<Group>> {
		let sql = format!(
			"SELECT {GROUP_COLUMNS} FROM groups WHERE 1 = 1{} ORDER BY created_at, id",
			soft_delete_clause(mode)
		);
		let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
		rows.iter().map(row_to_group).collect()
	}

	/// Soft-delete the active groups in `ids`.
	#[tracing::instrument(skip(conn, ids), fields(count = ids.len()))]
	pub async fn soft_delete_groups(
		conn: &mut SqliteConnection,
		ids: &[GroupId],
		at: DateTime<Utc>,
	) -> Result<u64> {
		if ids.is_empty() {
			return Ok(0);
		}
		let mut qb = QueryBuilder::<Sqlite>::new("UPDATE groups SET deleted_at = ");
		qb.push_bind(at.to_rfc3339());
		qb.push(", updated_at = ");
		qb.push_bind(at.to_rfc3339());
		qb.push(" WHERE deleted_at IS NULL AND id IN (");
		let mut ids_sep = qb.separated(", ");
		for id in ids {
			ids_sep.push_bind(id.to_string());
		}
		ids_sep.push_unseparated(")");

		let result = qb.build().execute(&mut *conn).await?;
		tracing::debug!(deleted = result.rows_affected(), "groups soft-deleted");
		Ok(result.rows_affected())
	}
}

fn row_to_group(row: &SqliteRow) -> Result<Group> {
	let id: String = row.get("id");
	let owner_id: String = row.get("owner_id");
	let created_by: String = row.get("created_by");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let deleted_at: Option<String> = row.get("deleted_at");

	Ok(Group {
		id: parse_id(&id, "group ID")?,
		owner_id: parse_id(&owner_id, "owner org ID")?,
		name: row.get("name"),
		display_name: row.get("display_name"),
		description: row.get("description"),
		created_by: parse_id(&created_by, "created_by")?,
		created_at: parse_ts(&created_at, "created_at")?,
		updated_at: parse_ts(&updated_at, "updated_at")?,
		deleted_at: parse_opt_ts(deleted_at, "deleted_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::org::OrgRepository;
	use crate::testing::create_test_pool;
	use crate::user::UserRepository;
	use orgraph_server_auth::{Organization, User};

	#[tokio::test]
	async fn groups_are_listed_per_owner() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let user = User::new("Ada", "ada@example.com");
		UserRepository::create_user(&mut conn, &user).await.unwrap();
		let a = Organization::new("a", "A", None, None, user.id);
		let b = Organization::new("b", "B", None, None, user.id);
		OrgRepository::create_org(&mut conn, &a).await.unwrap();
		OrgRepository::create_org(&mut conn, &b).await.unwrap();

		let ga = Group::new(a.id, "eng", "Engineering", None, user.id);
		let gb = Group::new(b.id, "eng", "Engineering", None, user.id);
		GroupRepository::create_group(&mut conn, &ga).await.unwrap();
		GroupRepository::create_group(&mut conn, &gb).await.unwrap();

		let dup = Group::new(a.id, "eng", "Again", None, user.id);
		assert!(matches!(
			GroupRepository::create_group(&mut conn, &dup).await,
			Err(DbError::Conflict(_))
		));

		let owned = GroupRepository::list_groups_for_orgs(&mut conn, &[a.id], SoftDeleteMode::Exclude)
			.await
			.unwrap();
		assert_eq!(owned, vec![ga.clone()]);

		GroupRepository::soft_delete_groups(&mut conn, &[ga.id], Utc::now())
			.await
			.unwrap();
		assert!(GroupRepository::get_group_by_id(&mut conn, &ga.id, SoftDeleteMode::Exclude)
			.await
			.unwrap()
			.is_none());
		assert!(GroupRepository::get_group_by_id(&mut conn, &ga.id, SoftDeleteMode::Include)
			.await
			.unwrap()
			.is_some());
	}
}
