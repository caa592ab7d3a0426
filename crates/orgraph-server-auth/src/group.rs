// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Groups: resources owned by an organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GroupId, OrgId, UserId};

/// A group owned by an organization.
///
/// Groups are cascade-deleted with their owner and have their access tuples
/// removed when that happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
	pub id: GroupId,
	pub owner_id: OrgId,
	pub name: String,
	pub display_name: String,
	pub description: Option<String>,
	pub created_by: UserId,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

impl Group {
	pub fn new(
		owner_id: OrgId,
		name: impl Into<String>,
		display_name: impl Into<String>,
		description: Option<String>,
		created_by: UserId,
	) -> Self {
		let now = Utc::now();
		Self {
			id: GroupId::generate(),
			owner_id,
			name: name.into(),
			display_name: display_name.into(),
			description,
			created_by,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		}
	}

	pub fn is_deleted(&self) -> bool {
		self.deleted_at.is_some()
	}
}
