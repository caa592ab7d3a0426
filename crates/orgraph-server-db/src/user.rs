// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User and user-setting repository.

use chrono::{DateTime, Utc};
use orgraph_server_auth::{OrgId, User, UserId, UserSetting, UserSettingId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::{DbError, Result};
use crate::rows::{parse_id, parse_opt_id, parse_opt_ts, parse_ts};

const USER_SETTING_COLUMNS: &str = "id, user_id, default_org_id, tags, created_at, updated_at";

pub struct UserRepository;

impl UserRepository {
	/// # Errors
	/// Returns `DbError::Conflict` if an active user already has the email.
	#[tracing::instrument(skip(conn, user), fields(user_id = %user.id))]
	pub async fn create_user(conn: &mut SqliteConnection, user: &User) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO users (id, display_name, email, created_at, updated_at, deleted_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.display_name)
		.bind(&user.email)
		.bind(user.created_at.to_rfc3339())
		.bind(user.updated_at.to_rfc3339())
		.bind(user.deleted_at.map(|d| d.to_rfc3339()))
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "user email"))?;

		tracing::debug!(user_id = %user.id, "user created");
		Ok(())
	}

	#[tracing::instrument(skip(conn), fields(user_id = %id))]
	pub async fn get_user_by_id(conn: &mut SqliteConnection, id: &UserId) -> Result<Option<User>> {
		let row = sqlx::query(
			"SELECT id, display_name, email, created_at, updated_at, deleted_at FROM users WHERE id = ? AND deleted_at IS NULL",
		)
		.bind(id.to_string())
		.fetch_optional(&mut *conn)
		.await?;

		row.map(|r| row_to_user(&r)).transpose()
	}

	#[tracing::instrument(skip(conn, setting), fields(user_id = %setting.user_id))]
	pub async fn create_user_setting(
		conn: &mut SqliteConnection,
		setting: &UserSetting,
	) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO user_settings (id, user_id, default_org_id, tags, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(setting.id.to_string())
		.bind(setting.user_id.to_string())
		.bind(setting.default_org_id.map(|o| o.to_string()))
		.bind(serde_json::to_string(&setting.tags)?)
		.bind(setting.created_at.to_rfc3339())
		.bind(setting.updated_at.to_rfc3339())
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "user setting"))?;

		tracing::debug!(setting_id = %setting.id, "user setting created");
		Ok(())
	}

	#[tracing::instrument(skip(conn), fields(setting_id = %id))]
	pub async fn get_user_setting_by_id(
		conn: &mut SqliteConnection,
		id: &UserSettingId,
	) -> Result<Option<UserSetting>> {
		let sql = format!("SELECT {USER_SETTING_COLUMNS} FROM user_settings WHERE id = ?");
		let row = sqlx::query(&sql)
			.bind(id.to_string())
			.fetch_optional(&mut *conn)
			.await?;
		row.map(|r| row_to_user_setting(&r)).transpose()
	}

	#[tracing::instrument(skip(conn), fields(user_id = %user_id))]
	pub async fn get_user_setting_for_user(
		conn: &mut SqliteConnection,
		user_id: &UserId,
	) -> Result<Option<UserSetting>> {
		let sql = format!("SELECT {USER_SETTING_COLUMNS} FROM user_settings WHERE user_id = ?");
		let row = sqlx::query(&sql)
			.bind(user_id.to_string())
			.fetch_optional(&mut *conn)
			.await?;
		row.map(|r| row_to_user_setting(&r)).transpose()
	}

	/// User settings whose default organization is one of `org_ids`.
	#[tracing::instrument(skip(conn, org_ids), fields(count = org_ids.len()))]
	pub async fn list_user_settings_with_default_in(
		conn: &mut SqliteConnection,
		org_ids: &[OrgId],
	) -> Result<Vec<UserSetting>> {
		if org_ids.is_empty() {
			return Ok(Vec::new());
		}
		let mut qb = QueryBuilder::<Sqlite>::new(format!(
			"SELECT {USER_SETTING_COLUMNS} FROM user_settings WHERE default_org_id IN ("
		));
		let mut ids_sep = qb.separated(", ");
		for id in org_ids {
			ids_sep.push_bind(id.to_string());
		}
		ids_sep.push_unseparated(") ORDER BY created_at, id");

		let rows = qb.build().fetch_all(&mut *conn).await?;
		rows.iter().map(row_to_user_setting).collect()
	}

	#[tracing::instrument(skip(conn), fields(setting_id = %id))]
	pub async fn update_default_org(
		conn: &mut SqliteConnection,
		id: &UserSettingId,
		default_org_id: Option<OrgId>,
		at: DateTime<Utc>,
	) -> Result<()> {
		let result =
			sqlx::query("UPDATE user_settings SET default_org_id = ?, updated_at = ? WHERE id = ?")
				.bind(default_org_id.map(|o| o.to_string()))
				.bind(at.to_rfc3339())
				.bind(id.to_string())
				.execute(&mut *conn)
				.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user setting {id}")));
		}
		tracing::debug!("default organization updated");
		Ok(())
	}

	#[tracing::instrument(skip(conn, tags), fields(setting_id = %id))]
	pub async fn update_tags(
		conn: &mut SqliteConnection,
		id: &UserSettingId,
		tags: &[String],
		at: DateTime<Utc>,
	) -> Result<()> {
		let result = sqlx::query("UPDATE user_settings SET tags = ?, updated_at = ? WHERE id = ?")
			.bind(serde_json::to_string(tags)?)
			.bind(at.to_rfc3339())
			.bind(id.to_string())
			.execute(&mut *conn)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user setting {id}")));
		}
		Ok(())
	}
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let deleted_at: Option<String> = row.get("deleted_at");

	Ok(User {
		id: parse_id(&id, "user ID")?,
		display_name: row.get("display_name"),
		email: row.get("email"),
		created_at: parse_ts(&created_at, "created_at")?,
		updated_at: parse_ts(&updated_at, "updated_at")?,
		deleted_at: parse_opt_ts(deleted_at, "deleted_at")?,
	})
}

fn row_to_user_setting(row: &SqliteRow) -> Result<UserSetting> {
	let id: String = row.get("id");
	let user_id: String = row.get("user_id");
	let default_org_id: Option<String> = row.get("default_org_id");
	let tags: String = row.get("tags");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(UserSetting {
		id: parse_id(&id, "user setting ID")?,
		user_id: parse_id(&user_id, "user ID")?,
		default_org_id: parse_opt_id(default_org_id, "default org ID")?,
		tags: serde_json::from_str(&tags)?,
		created_at: parse_ts(&created_at, "created_at")?,
		updated_at: parse_ts(&updated_at, "updated_at")?,
	})
}
