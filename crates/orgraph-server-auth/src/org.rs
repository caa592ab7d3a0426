// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization types.
//!
//! This module provides:
//! - [`Organization`] - a tenant, optionally the child of another organization
//! - [`OrgMembership`] - links users to organizations with roles
//! - [`OrganizationSetting`] - org-scoped configuration owned 1:1 by the org

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MembershipId, OrgId, OrgRole, OrgSettingId, UserId};

/// An organization.
///
/// Organizations form a forest through `parent_id`. A child holds a
/// non-owning back-reference to its parent; deleting the parent cascades to
/// the child. Personal organizations never have children and can never be
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
	pub id: OrgId,

	/// Unique among organizations that are not soft-deleted.
	pub name: String,

	pub display_name: String,

	pub description: Option<String>,

	pub parent_id: Option<OrgId>,

	pub is_personal: bool,

	pub created_by: Option<UserId>,

	pub created_at: DateTime<Utc>,

	pub updated_at: DateTime<Utc>,

	/// Set when soft-deleted. Deleted organizations are hidden from default reads.
	pub deleted_at: Option<DateTime<Utc>>,

	pub deleted_by: Option<UserId>,
}

impl Organization {
	/// Creates a regular (non-personal) organization.
	pub fn new(
		name: impl Into<String>,
		display_name: impl Into<String>,
		description: Option<String>,
		parent_id: Option<OrgId>,
		created_by: UserId,
	) -> Self {
		let now = Utc::now();
		Self {
			id: OrgId::generate(),
			name: name.into(),
			display_name: display_name.into(),
			description,
			parent_id,
			is_personal: false,
			created_by: Some(created_by),
			created_at: now,
			updated_at: now,
			deleted_at: None,
			deleted_by: None,
		}
	}

	/// Creates the personal organization for a user.
	///
	/// The name is derived from the user id so it never collides with another
	/// active organization.
	pub fn new_personal(user_id: &UserId, display_name: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: OrgId::generate(),
			name: personal_org_name(user_id),
			display_name: display_name.into(),
			description: None,
			parent_id: None,
			is_personal: true,
			created_by: Some(*user_id),
			created_at: now,
			updated_at: now,
			deleted_at: None,
			deleted_by: None,
		}
	}

	pub fn is_deleted(&self) -> bool {
		self.deleted_at.is_some()
	}

	pub fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}
}

/// Name given to a user's personal organization.
pub fn personal_org_name(user_id: &UserId) -> String {
	format!("personal-{}", user_id.as_uuid().simple())
}

/// A user's membership in an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMembership {
	pub id: MembershipId,
	pub org_id: OrgId,
	pub user_id: UserId,
	pub role: OrgRole,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

impl OrgMembership {
	pub fn new(org_id: OrgId, user_id: UserId, role: OrgRole) -> Self {
		let now = Utc::now();
		Self {
			id: MembershipId::generate(),
			org_id,
			user_id,
			role,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		}
	}

	pub fn is_owner(&self) -> bool {
		self.role == OrgRole::Owner
	}

	pub fn is_deleted(&self) -> bool {
		self.deleted_at.is_some()
	}
}

/// Org-scoped configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrganizationSettingFields {
	/// Email domains allowed to join the organization.
	pub domains: Vec<String>,
	pub billing_contact: Option<String>,
	pub billing_email: Option<String>,
	pub billing_phone: Option<String>,
	pub billing_address: Option<String>,
	pub tax_identifier: Option<String>,
	pub tags: Vec<String>,
}

/// Settings row owned 1:1 by an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSetting {
	pub id: OrgSettingId,
	pub org_id: OrgId,
	#[serde(flatten)]
	pub fields: OrganizationSettingFields,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

impl OrganizationSetting {
	pub fn new(org_id: OrgId, fields: OrganizationSettingFields) -> Self {
		let now = Utc::now();
		Self {
			id: OrgSettingId::generate(),
			org_id,
			fields,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		}
	}
}
