// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization settings repository.
//!
//! List-valued fields (`domains`, `tags`) are stored as JSON arrays.

use chrono::{DateTime, Utc};
use orgraph_server_auth::{
	OrgId, OrgSettingId, OrganizationSetting, OrganizationSettingFields, SoftDeleteMode,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::{DbError, Result};
use crate::rows::{parse_id, parse_opt_ts, parse_ts, soft_delete_clause};

const SETTING_COLUMNS: &str = "id, org_id, domains, billing_contact, billing_email, billing_phone, billing_address, tax_identifier, tags, created_at, updated_at, deleted_at";

pub struct OrgSettingRepository;

impl OrgSettingRepository {
	#[tracing::instrument(skip(conn, setting), fields(org_id = %setting.org_id))]
	pub async fn create_setting(
		conn: &mut SqliteConnection,
		setting: &OrganizationSetting,
	) -> Result<()> {
		let f = &setting.fields;
		sqlx::query(
			r#"
			INSERT INTO organization_settings (id, org_id, domains, billing_contact, billing_email, billing_phone, billing_address, tax_identifier, tags, created_at, updated_at, deleted_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(setting.id.to_string())
		.bind(setting.org_id.to_string())
		.bind(serde_json::to_string(&f.domains)?)
		.bind(&f.billing_contact)
		.bind(&f.billing_email)
		.bind(&f.billing_phone)
		.bind(&f.billing_address)
		.bind(&f.tax_identifier)
		.bind(serde_json::to_string(&f.tags)?)
		.bind(setting.created_at.to_rfc3339())
		.bind(setting.updated_at.to_rfc3339())
		.bind(setting.deleted_at.map(|d| d.to_rfc3339()))
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "organization setting"))?;

		tracing::debug!(setting_id = %setting.id, "organization setting created");
		Ok(())
	}

	#[tracing::instrument(skip(conn), fields(setting_id = %id))]
	pub async fn get_setting_by_id(
		conn: &mut SqliteConnection,
		id: &OrgSettingId,
		mode: SoftDeleteMode,
	) -> Result<Option<OrganizationSetting>> {
		let sql = format!(
			"SELECT {SETTING_COLUMNS} FROM organization_settings WHERE id = ?{}",
			soft_delete_clause(mode)
		);
		let row = sqlx::query(&sql)
			.bind(id.to_string())
			.fetch_optional(&mut *conn)
			.await?;
		row.map(|r| row_to_setting(&r)).transpose()
	}

	/// Read an active setting after taking the database write lock, so the
	/// partial update applied to it cannot overwrite a concurrent one.
	#[tracing::instrument(skip(conn), fields(setting_id = %id))]
	pub async fn get_setting_for_update(
		conn: &mut SqliteConnection,
		id: &OrgSettingId,
	) -> Result<Option<OrganizationSetting>> {
		sqlx::query("UPDATE organization_settings SET updated_at = updated_at WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *conn)
			.await?;
		Self::get_setting_by_id(conn, id, SoftDeleteMode::Exclude).await
	}

	/// The most recent setting row of an organization.
	#[tracing::instrument(skip(conn), fields(org_id = %org_id))]
	pub async fn get_setting_for_org(
		conn: &mut SqliteConnection,
		org_id: &OrgId,
		mode: SoftDeleteMode,
	) -> Result<Option<OrganizationSetting>> {
		let sql = format!(
			"SELECT {SETTING_COLUMNS} FROM organization_settings WHERE org_id = ?{} ORDER BY created_at DESC LIMIT 1",
			soft_delete_clause(mode)
		);
		let row = sqlx::query(&sql)
			.bind(org_id.to_string())
			.fetch_optional(&mut *conn)
			.await?;
		row.map(|r| row_to_setting(&r)).transpose()
	}

	#[tracing::instrument(skip(conn))]
	pub async fn list_settings(
		conn: &mut SqliteConnection,
		mode: SoftDeleteMode,
	) -> Result<Vec<OrganizationSetting>> {
		let sql = format!(
			"SELECT {SETTING_COLUMNS} FROM organization_settings WHERE 1 = 1{} ORDER BY created_at, id",
			soft_delete_clause(mode)
		);
		let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
		rows.iter().map(row_to_setting).collect()
	}

	/// Active settings of any of `org_ids`.
	#[tracing::instrument(skip(conn, org_ids), fields(count = org_ids.len()))]
	pub async fn list_settings_for_orgs(
		conn: &mut SqliteConnection,
		org_ids: &[OrgId],
	) -> Result<Vec<OrganizationSetting>> {
		if org_ids.is_empty() {
			return Ok(Vec::new());
		}
		let mut qb = QueryBuilder::<Sqlite>::new(format!(
			"SELECT {SETTING_COLUMNS} FROM organization_settings WHERE deleted_at IS NULL AND org_id IN ("
		));
		let mut ids_sep = qb.separated(", ");
		for id in org_ids {
			ids_sep.push_bind(id.to_string());
		}
		ids_sep.push_unseparated(") ORDER BY created_at, id");

		let rows = qb.build().fetch_all(&mut *conn).await?;
		rows.iter().map(row_to_setting).collect()
	}

	#[tracing::instrument(skip(conn, setting), fields(setting_id = %setting.id))]
	pub async fn update_setting(
		conn: &mut SqliteConnection,
		setting: &OrganizationSetting,
	) -> Result<()> {
		let f = &setting.fields;
		let result = sqlx::query(
			r#"
			UPDATE organization_settings
			SET domains = ?, billing_contact = ?, billing_email = ?, billing_phone = ?,
				billing_address = ?, tax_identifier = ?, tags = ?, updated_at = ?
			WHERE id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(serde_json::to_string(&f.domains)?)
		.bind(&f.billing_contact)
		.bind(&f.billing_email)
		.bind(&f.billing_phone)
		.bind(&f.billing_address)
		.bind(&f.tax_identifier)
		.bind(serde_json::to_string(&f.tags)?)
		.bind(setting.updated_at.to_rfc3339())
		.bind(setting.id.to_string())
		.execute(&mut *conn)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("organization setting {}", setting.id)));
		}
		tracing::debug!("organization setting updated");
		Ok(())
	}

	#[tracing::instrument(skip(conn, org_ids), fields(count = org_ids.len()))]
	pub async fn soft_delete_settings_for_orgs(
		conn: &mut SqliteConnection,
		org_ids: &[OrgId],
		at: DateTime<Utc>,
	) -> Result<u64> {
		if org_ids.is_empty() {
			return Ok(0);
		}
		let mut qb = QueryBuilder::<Sqlite>::new("UPDATE organization_settings SET deleted_at = ");
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
		tracing::debug!(deleted = result.rows_affected(), "organization settings soft-deleted");
		Ok(result.rows_affected())
	}
}

fn row_to_setting(row: &SqliteRow) -> Result<OrganizationSetting> {
	let id: String = row.get("id");
	let org_id: String = row.get("org_id");
	let domains: String = row.get("domains");
	let tags: String = row.get("tags");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let deleted_at: Option<String> = row.get("deleted_at");

	Ok(OrganizationSetting {
		id: parse_id(&id, "setting ID")?,
		org_id: parse_id(&org_id, "org ID")?,
		fields: OrganizationSettingFields {
			domains: serde_json::from_str(&domains)?,
			billing_contact: row.get("billing_contact"),
			billing_email: row.get("billing_email"),
			billing_phone: row.get("billing_phone"),
			billing_address: row.get("billing_address"),
			tax_identifier: row.get("tax_identifier"),
			tags: serde_json::from_str(&tags)?,
		},
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
	async fn domains_round_trip_through_json() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let user = User::new("Ada", "ada@example.com");
		UserRepository::create_user(&mut conn, &user).await.unwrap();
		let org = Organization::new("beta", "Beta", None, None, user.id);
		OrgRepository::create_org(&mut conn, &org).await.unwrap();

		let setting = OrganizationSetting::new(
			org.id,
			OrganizationSettingFields {
				domains: vec!["beta.io".into()],
				billing_email: Some("billing@beta.io".into()),
				..Default::default()
			},
		);
		OrgSettingRepository::create_setting(&mut conn, &setting).await.unwrap();

		let mut setting = OrgSettingRepository::get_setting_for_update(&mut conn, &setting.id)
			.await
			.unwrap()
			.unwrap();
		setting.fields.domains.push("beta.dev".into());
		OrgSettingRepository::update_setting(&mut conn, &setting).await.unwrap();

		let fetched = OrgSettingRepository::get_setting_for_org(&mut conn, &org.id, SoftDeleteMode::Exclude)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(fetched.fields.domains, vec!["beta.io", "beta.dev"]);
		assert_eq!(fetched.fields.billing_email.as_deref(), Some("billing@beta.io"));

		let active = OrgSettingRepository::list_settings_for_orgs(&mut conn, &[org.id]).await.unwrap();
		assert_eq!(active.len(), 1);
		OrgSettingRepository::soft_delete_settings_for_orgs(&mut conn, &[org.id], Utc::now())
			.await
			.unwrap();
		assert!(OrgSettingRepository::get_setting_by_id(&mut conn, &setting.id, SoftDeleteMode::Exclude)
			.await
			.unwrap()
			.is_none());
		assert!(OrgSettingRepository::list_settings_for_orgs(&mut conn, &[org.id])
			.await
			.unwrap()
			.is_empty());
	}
}
