// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Default-organization reassignment.
//!
//! A user's default organization must always be an active organization the
//! user belongs to. When that stops being true, the replacement is, in order:
//!
//! 1. the user's personal organization,
//! 2. the organization of the user's oldest remaining active membership,
//! 3. none.
//!
//! Reassignment runs on the caller's transaction so it commits or rolls back
//! with the change that invalidated the old default.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use orgraph_server_auth::{OrgId, SoftDeleteMode, UserId, UserSetting, UserSettingId};
use orgraph_server_db::{HistoryOperation, MembershipRepository, OrgRepository, UserRepository};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::Result;
use crate::history::{self, USER_SETTING_ENTITY};

/// A changed default organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reassignment {
	pub user_id: UserId,
	pub setting_id: UserSettingId,
	pub from: OrgId,
	pub to: Option<OrgId>,
}

/// Pick a replacement default for `user_id`, never one of `excluded`.
pub async fn pick_replacement(
	conn: &mut SqliteConnection,
	user_id: &UserId,
	excluded: &HashSet<OrgId>,
) -> Result<Option<OrgId>> {
	if let Some(personal) = OrgRepository::get_personal_org(conn, user_id).await? {
		if !excluded.contains(&personal.id) {
			return Ok(Some(personal.id));
		}
	}

	let memberships =
		MembershipRepository::list_memberships_for_user(conn, user_id, SoftDeleteMode::Exclude).await?;
	for membership in memberships {
		if excluded.contains(&membership.org_id) {
			continue;
		}
		if OrgRepository::get_org_by_id(conn, &membership.org_id, SoftDeleteMode::Exclude)
			.await?
			.is_some()
		{
			return Ok(Some(membership.org_id));
		}
	}
	Ok(None)
}

/// Reassign every user whose default is one of `deleted`.
#[tracing::instrument(skip(conn, deleted, actor), fields(deleted = deleted.len()))]
pub async fn reassign_after_delete(
	conn: &mut SqliteConnection,
	deleted: &[OrgId],
	actor: Option<UserId>,
	at: DateTime<Utc>,
) -> Result<Vec<Reassignment>> {
	let excluded: HashSet<OrgId> = deleted.iter().copied().collect();
	let settings = UserRepository::list_user_settings_with_default_in(conn, deleted).await?;

	let mut reassignments = Vec::with_capacity(settings.len());
	for setting in settings {
		if let Some(reassignment) = reassign(conn, setting, &excluded, actor, at).await? {
			reassignments.push(reassignment);
		}
	}
	Ok(reassignments)
}

/// Reassign `user_id` if their default is `removed_org`, after they lost
/// their membership in it.
#[tracing::instrument(skip(conn, actor), fields(user_id = %user_id, org_id = %removed_org))]
pub async fn reassign_after_membership_removal(
	conn: &mut SqliteConnection,
	user_id: &UserId,
	removed_org: &OrgId,
	actor: Option<UserId>,
	at: DateTime<Utc>,
) -> Result<Option<Reassignment>> {
	let Some(setting) = UserRepository::get_user_setting_for_user(conn, user_id).await? else {
		return Ok(None);
	};
	if setting.default_org_id != Some(*removed_org) {
		return Ok(None);
	}
	let excluded = HashSet::from([*removed_org]);
	reassign(conn, setting, &excluded, actor, at).await
}

async fn reassign(
	conn: &mut SqliteConnection,
	setting: UserSetting,
	excluded: &HashSet<OrgId>,
	actor: Option<UserId>,
	at: DateTime<Utc>,
) -> Result<Option<Reassignment>> {
	let Some(from) = setting.default_org_id else {
		return Ok(None);
	};

	let to = pick_replacement(conn, &setting.user_id, excluded).await?;
	UserRepository::update_default_org(conn, &setting.id, to, at).await?;

	let updated = UserSetting {
		default_org_id: to,
		updated_at: at,
		..setting
	};
	history::record(
		conn,
		USER_SETTING_ENTITY,
		updated.id,
		HistoryOperation::Update,
		actor,
		&updated,
	)
	.await?;

	tracing::info!(
		user_id = %updated.user_id,
		from = %from,
		to = ?to.map(|o| o.to_string()),
		"default organization reassigned"
	);
	Ok(Some(Reassignment {
		user_id: updated.user_id,
		setting_id: updated.id,
		from,
		to,
	}))
}
