// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-facing error taxonomy.
//!
//! Messages never include relationship tuple contents.

use orgraph_fga::FgaError;
use orgraph_server_auth::OrgId;
use orgraph_server_db::DbError;
use thiserror::Error;

pub const UNAUTHORIZED_MESSAGE: &str = "you are not authorized to perform this action";
pub const TOO_SHORT: &str = "value is less than the required length";
pub const TOO_LONG: &str = "value is greater than the required length";
pub const ALREADY_EXISTS: &str = "already exists";

/// Stable error class, for transports that map errors without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	Unauthorized,
	NotFound,
	Validation,
	InvalidHierarchy,
	ForbiddenOperation,
	AuthorizationSync,
	CascadeIncomplete,
	RollbackFailed,
	TransientStore,
	Internal,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::Unauthorized => "unauthorized",
			ErrorKind::NotFound => "not-found",
			ErrorKind::Validation => "validation",
			ErrorKind::InvalidHierarchy => "invalid-hierarchy",
			ErrorKind::ForbiddenOperation => "forbidden-operation",
			ErrorKind::AuthorizationSync => "authorization-sync",
			ErrorKind::CascadeIncomplete => "cascade-incomplete",
			ErrorKind::RollbackFailed => "rollback-failed",
			ErrorKind::TransientStore => "transient-store",
			ErrorKind::Internal => "internal",
		}
	}
}

#[derive(Debug, Error)]
pub enum OrgError {
	/// The check was denied, or the entity is invisible to the caller.
	#[error("you are not authorized to perform this action")]
	Unauthorized,

	#[error("{0} not found")]
	NotFound(String),

	#[error("validation failed for field \"{field}\": {reason}")]
	Validation { field: String, reason: String },

	#[error("{0}")]
	InvalidHierarchy(String),

	#[error("{0}")]
	ForbiddenOperation(String),

	/// The relationship store rejected the tuple delta; relational changes were rolled back.
	#[error("failed to update authorization for {entity}; the change was rolled back")]
	AuthorizationSync { entity: String },

	/// The cascade committed but some tuple deletions are still pending.
	#[error("organization {org_id} was deleted but {pending} authorization tuples await reconciliation")]
	CascadeIncomplete { org_id: OrgId, pending: usize },

	/// Restoring consistency after a failure itself failed.
	#[error("rollback failed: {0}")]
	RollbackFailed(String),

	#[error("store temporarily unavailable: {0}")]
	TransientStore(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl OrgError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			OrgError::Unauthorized => ErrorKind::Unauthorized,
			OrgError::NotFound(_) => ErrorKind::NotFound,
			OrgError::Validation { .. } => ErrorKind::Validation,
			OrgError::InvalidHierarchy(_) => ErrorKind::InvalidHierarchy,
			OrgError::ForbiddenOperation(_) => ErrorKind::ForbiddenOperation,
			OrgError::AuthorizationSync { .. } => ErrorKind::AuthorizationSync,
			OrgError::CascadeIncomplete { .. } => ErrorKind::CascadeIncomplete,
			OrgError::RollbackFailed(_) => ErrorKind::RollbackFailed,
			OrgError::TransientStore(_) => ErrorKind::TransientStore,
			OrgError::Internal(_) => ErrorKind::Internal,
		}
	}

	pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
		OrgError::Validation {
			field: field.into(),
			reason: reason.into(),
		}
	}

	pub fn not_found(entity: impl Into<String>) -> Self {
		OrgError::NotFound(entity.into())
	}

	/// Maps a database error, reporting unique-index conflicts against `field`.
	pub fn from_db(e: DbError, field: &str) -> Self {
		match e {
			DbError::Conflict(_) => OrgError::validation(field, ALREADY_EXISTS),
			other => other.into(),
		}
	}
}

impl From<DbError> for OrgError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::NotFound(what) => OrgError::NotFound(what),
			DbError::Conflict(_) => OrgError::validation("id", ALREADY_EXISTS),
			DbError::Sqlx(e) => OrgError::TransientStore(e.to_string()),
			DbError::Internal(msg) => OrgError::Internal(msg),
			DbError::Serialization(e) => OrgError::Internal(e.to_string()),
		}
	}
}

impl From<sqlx::Error> for OrgError {
	fn from(e: sqlx::Error) -> Self {
		OrgError::TransientStore(e.to_string())
	}
}

/// The store's own message can echo tuple keys, so it is logged rather than
/// returned.
impl From<FgaError> for OrgError {
	fn from(e: FgaError) -> Self {
		tracing::debug!(error = %e, "relationship store request failed");
		if e.is_transient() {
			OrgError::TransientStore("relationship store unavailable".to_string())
		} else {
			OrgError::Internal("relationship store rejected request".to_string())
		}
	}
}

pub type Result<T> = std::result::Result<T, OrgError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unauthorized_message_does_not_leak_existence() {
		assert_eq!(OrgError::Unauthorized.to_string(), UNAUTHORIZED_MESSAGE);
	}

	#[test]
	fn conflicts_become_already_exists() {
		let err = OrgError::from_db(DbError::Conflict("organization name already exists".into()), "name");
		assert_eq!(err.kind(), ErrorKind::Validation);
		assert!(err.to_string().contains(ALREADY_EXISTS));
		assert!(err.to_string().contains("name"));
	}

	#[test]
	fn transient_store_errors_stay_retryable() {
		let err: OrgError = FgaError::Unavailable("503".into()).into();
		assert_eq!(err.kind(), ErrorKind::TransientStore);

		let err: OrgError = FgaError::Rejected("bad relation".into()).into();
		assert_eq!(err.kind(), ErrorKind::Internal);
	}

	#[test]
	fn store_messages_do_not_reach_callers() {
		let detail = "validation_error: invalid tuple 'user:u1 #admin organization:o1'";
		for e in [
			FgaError::Rejected(detail.into()),
			FgaError::Unavailable(detail.into()),
		] {
			let err: OrgError = e.into();
			assert!(!err.to_string().contains("organization:o1"), "{err}");
			assert!(!err.to_string().contains("user:u1"), "{err}");
		}
	}

	#[test]
	fn rollback_failure_has_distinct_kind() {
		assert_eq!(
			OrgError::RollbackFailed("compensation failed".into()).kind().as_str(),
			"rollback-failed"
		);
	}
}
