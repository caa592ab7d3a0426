// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request context threaded through every orgraph operation.
//!
//! A [`RequestContext`] carries the authenticated [`Caller`], an authorization
//! [`Decision`] override and a [`SoftDeleteMode`]. Contexts are immutable
//! values: the `with_*` builders return a modified copy and leave the
//! original untouched, so one request can never change what another sees.

use serde::{Deserialize, Serialize};

use crate::types::{OrgId, UserId};

/// The authenticated identity a request runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
	/// The user performing the request.
	pub user_id: UserId,

	/// Organization the request is scoped to, if the credential carries one.
	pub org_id: Option<OrgId>,
}

impl Caller {
	pub fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			org_id: None,
		}
	}

	pub fn with_org(user_id: UserId, org_id: OrgId) -> Self {
		Self {
			user_id,
			org_id: Some(org_id),
		}
	}
}

/// Authorization decision override.
///
/// `Defer` consults the relationship store. `Allow` and `Deny` short-circuit
/// it; they are reserved for trusted internal logic (cascades, reconciliation)
/// and must never be derived from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
	#[default]
	Defer,
	Allow,
	Deny,
}

/// Whether reads include soft-deleted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftDeleteMode {
	#[default]
	Exclude,
	Include,
}

impl SoftDeleteMode {
	pub fn includes_deleted(&self) -> bool {
		matches!(self, SoftDeleteMode::Include)
	}
}

/// Immutable request-scoped context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
	caller: Caller,
	decision: Decision,
	soft_delete: SoftDeleteMode,
}

impl RequestContext {
	/// Default context for a caller: authorization deferred to the store,
	/// soft-deleted rows hidden.
	pub fn new(caller: Caller) -> Self {
		Self {
			caller,
			decision: Decision::Defer,
			soft_delete: SoftDeleteMode::Exclude,
		}
	}

	pub fn for_user(user_id: UserId) -> Self {
		Self::new(Caller::new(user_id))
	}

	pub fn caller(&self) -> &Caller {
		&self.caller
	}

	pub fn user_id(&self) -> UserId {
		self.caller.user_id
	}

	pub fn org_scope(&self) -> Option<OrgId> {
		self.caller.org_id
	}

	pub fn decision(&self) -> Decision {
		self.decision
	}

	pub fn soft_delete(&self) -> SoftDeleteMode {
		self.soft_delete
	}

	/// Copy of this context scoped to an organization.
	pub fn with_org(&self, org_id: OrgId) -> Self {
		Self {
			caller: Caller::with_org(self.caller.user_id, org_id),
			..*self
		}
	}

	/// Copy of this context with the decision override replaced.
	pub fn with_decision(&self, decision: Decision) -> Self {
		Self { decision, ..*self }
	}

	/// Copy of this context whose reads include soft-deleted rows.
	pub fn skip_soft_delete(&self) -> Self {
		Self {
			soft_delete: SoftDeleteMode::Include,
			..*self
		}
	}

	/// Copy of this context used by trusted internal logic: forced allow.
	pub fn privileged(&self) -> Self {
		self.with_decision(Decision::Allow)
	}
}
