// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Users and their settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrgId, UserId, UserSettingId};

/// A user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub display_name: String,
	pub email: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
	pub fn new(display_name: impl Into<String>, email: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: UserId::generate(),
			display_name: display_name.into(),
			email: email.into(),
			created_at: now,
			updated_at: now,
			deleted_at: None,
		}
	}
}

/// Per-user preferences.
///
/// `default_org_id`, when set, always references an organization that is not
/// soft-deleted and that the user belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSetting {
	pub id: UserSettingId,
	pub user_id: UserId,
	pub default_org_id: Option<OrgId>,
	pub tags: Vec<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl UserSetting {
	pub fn new(user_id: UserId) -> Self {
		let now = Utc::now();
		Self {
			id: UserSettingId::generate(),
			user_id,
			default_org_id: None,
			tags: Vec::new(),
			created_at: now,
			updated_at: now,
		}
	}
}
