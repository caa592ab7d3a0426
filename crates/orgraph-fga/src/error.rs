// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors returned by relationship store clients.
///
/// Messages never carry tuple contents; callers log counts, not tuples.
#[derive(Debug, Error)]
pub enum FgaError {
	#[error("relationship store unavailable: {0}")]
	Unavailable(String),

	#[error("relationship store request timed out")]
	Timeout,

	#[error("relationship store rejected request: {0}")]
	Rejected(String),

	#[error("invalid tuple: {0}")]
	InvalidTuple(String),

	#[error("unknown type '{0}'")]
	UnknownType(String),

	#[error("unknown relation '{relation}' on type '{object_type}'")]
	UnknownRelation {
		object_type: String,
		relation: String,
	},

	#[error("relation resolution exceeded depth {0}")]
	DepthExceeded(u32),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("injected failure: {0}")]
	Injected(String),
}

impl FgaError {
	/// Whether retrying the same call may succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			FgaError::Unavailable(_) | FgaError::Timeout | FgaError::Injected(_) => true,
			FgaError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
			FgaError::Rejected(_)
			| FgaError::InvalidTuple(_)
			| FgaError::UnknownType(_)
			| FgaError::UnknownRelation { .. }
			| FgaError::DepthExceeded(_)
			| FgaError::Serialization(_) => false,
		}
	}
}

pub type FgaResult<T> = std::result::Result<T, FgaError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn availability_errors_are_transient() {
		assert!(FgaError::Unavailable("503".into()).is_transient());
		assert!(FgaError::Timeout.is_transient());
		assert!(FgaError::Injected("boom".into()).is_transient());
	}

	#[test]
	fn model_errors_are_not_transient() {
		assert!(!FgaError::Rejected("400".into()).is_transient());
		assert!(!FgaError::UnknownType("doc".into()).is_transient());
		assert!(!FgaError::DepthExceeded(25).is_transient());
	}
}
