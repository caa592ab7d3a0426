// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions shared by every orgraph crate.
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs for each entity type
//!   ([`UserId`], [`OrgId`], [`GroupId`], ...) preventing accidental mixing
//! - **Role enum**: Hierarchical organization roles ([`OrgRole`])
//!
//! All ID types serialize transparently as UUID strings and parse from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(OrgId, "Unique identifier for an organization.");
define_id_type!(GroupId, "Unique identifier for a group owned by an organization.");
define_id_type!(MembershipId, "Unique identifier for an organization membership.");
define_id_type!(OrgSettingId, "Unique identifier for an organization setting.");
define_id_type!(UserSettingId, "Unique identifier for a user setting.");

// =============================================================================
// Organization Roles
// =============================================================================

/// Roles within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
	/// Full org control, can delete the org. Exactly one per org, assigned at creation.
	Owner,
	/// Manage members and settings, cannot delete org.
	Admin,
	/// Standard member access.
	Member,
}

impl OrgRole {
	/// Returns all available organization roles.
	pub fn all() -> &'static [OrgRole] {
		&[OrgRole::Owner, OrgRole::Admin, OrgRole::Member]
	}

	/// The relation name this role maps to in the relationship store.
	pub fn relation(&self) -> &'static str {
		match self {
			OrgRole::Owner => "owner",
			OrgRole::Admin => "admin",
			OrgRole::Member => "member",
		}
	}
}

impl fmt::Display for OrgRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.relation())
	}
}

/// Error returned when a role string is not one of `owner`, `admin`, `member`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "unknown organization role '{}'", self.0)
	}
}

impl std::error::Error for UnknownRole {}

impl FromStr for OrgRole {
	type Err = UnknownRole;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"owner" => Ok(OrgRole::Owner),
			"admin" => Ok(OrgRole::Admin),
			"member" => Ok(OrgRole::Member),
			other => Err(UnknownRole(other.to_string())),
		}
	}
}
