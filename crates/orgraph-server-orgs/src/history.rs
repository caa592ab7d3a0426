// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use orgraph_server_auth::UserId;
use orgraph_server_db::{HistoryEntry, HistoryOperation, HistoryRepository};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::error::Result;

pub const ORGANIZATION_ENTITY: &str = "organization";
pub const MEMBERSHIP_ENTITY: &str = "org_membership";
pub const ORG_SETTING_ENTITY: &str = "organization_setting";
pub const USER_SETTING_ENTITY: &str = "user_setting";
pub const GROUP_ENTITY: &str = "group";
pub const USER_ENTITY: &str = "user";

/// Record a snapshot of `entity` on the caller's connection or transaction.
pub(crate) async fn record<T: Serialize>(
	conn: &mut SqliteConnection,
	entity_type: &str,
	entity_id: impl ToString,
	operation: HistoryOperation,
	actor: Option<UserId>,
	entity: &T,
) -> Result<()> {
	let entry = HistoryEntry::new(entity_type, entity_id, operation, actor, entity)?;
	HistoryRepository::record(conn, &entry).await?;
	Ok(())
}
