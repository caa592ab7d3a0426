// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The relationship store capability interface.

use async_trait::async_trait;

use crate::error::FgaResult;
use crate::tuple::{ObjectRef, Subject, Tuple};

/// OpenFGA rejects write requests carrying more tuples than this.
pub const MAX_TUPLES_PER_WRITE: usize = 100;

/// Capability interface to an external relationship-based authorization store.
///
/// Every call is an I/O boundary and may fail transiently. Implementations
/// must be thread-safe; no client-side locking is assumed by callers.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
	/// Returns whether `subject` holds `relation` on `object`.
	async fn check(&self, subject: &Subject, relation: &str, object: &ObjectRef) -> FgaResult<bool>;

	/// Writes tuples. Writing an existing tuple is not an error.
	async fn write(&self, tuples: &[Tuple]) -> FgaResult<()>;

	/// Deletes tuples. Deleting a missing tuple is not an error.
	async fn delete(&self, tuples: &[Tuple]) -> FgaResult<()>;

	/// Returns ids of objects of `object_type` on which `subject` holds `relation`.
	async fn list_objects(
		&self,
		subject: &Subject,
		relation: &str,
		object_type: &str,
	) -> FgaResult<Vec<String>>;
}
