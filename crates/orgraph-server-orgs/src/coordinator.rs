// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization-consistent mutation coordinator.
//!
//! Every single-entity mutation runs the same sequence:
//!
//! 1. [`MutationCoordinator::authorize`] checks the caller against the
//!    relationship store, honoring the request's [`Decision`] override.
//! 2. The caller validates input and applies relational changes inside a
//!    transaction from [`MutationCoordinator::begin`].
//! 3. [`MutationCoordinator::commit`] applies the tuple delta and commits.
//!    If the delta fails the transaction is rolled back and tuples already
//!    applied are compensated, so neither side shows the change.
//!
//! Step 3 runs on a spawned task. Dropping the caller's future after the
//! relational writes cannot interrupt the rollback.

use std::sync::Arc;

use orgraph_fga::{FgaResult, ObjectRef, RelationshipStore, Tuple, MAX_TUPLES_PER_WRITE};
use orgraph_server_auth::{Decision, RequestContext};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::authz::{user_subject, Action};
use crate::error::{OrgError, Result};
use crate::tuples::TupleDelta;

#[derive(Clone)]
pub struct MutationCoordinator {
	pool: SqlitePool,
	store: Arc<dyn RelationshipStore>,
	max_tuples_per_write: usize,
}

impl MutationCoordinator {
	pub fn new(pool: SqlitePool, store: Arc<dyn RelationshipStore>) -> Self {
		Self {
			pool,
			store,
			max_tuples_per_write: MAX_TUPLES_PER_WRITE,
		}
	}

	/// Override the number of tuples sent per write or delete call.
	pub fn with_max_tuples_per_write(mut self, max: usize) -> Self {
		self.max_tuples_per_write = max.max(1);
		self
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub fn store(&self) -> &Arc<dyn RelationshipStore> {
		&self.store
	}

	pub fn max_tuples_per_write(&self) -> usize {
		self.max_tuples_per_write
	}

	/// Whether the caller may perform `action` on `object`.
	///
	/// A forced decision short-circuits the store.
	#[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id(), relation = action.relation(), object_type = %object.object_type))]
	pub async fn is_allowed(&self, ctx: &RequestContext, action: Action, object: &ObjectRef) -> Result<bool> {
		match ctx.decision() {
			Decision::Allow => Ok(true),
			Decision::Deny => Ok(false),
			Decision::Defer => Ok(self
				.store
				.check(&user_subject(&ctx.user_id()), action.relation(), object)
				.await?),
		}
	}

	/// Fails with [`OrgError::Unauthorized`] unless the caller may perform
	/// `action` on `object`.
	pub async fn authorize(&self, ctx: &RequestContext, action: Action, object: &ObjectRef) -> Result<()> {
		if self.is_allowed(ctx, action, object).await? {
			Ok(())
		} else {
			Err(OrgError::Unauthorized)
		}
	}

	pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
		Ok(self.pool.begin().await?)
	}

	/// Apply `delta` to the relationship store and commit `tx`.
	///
	/// On a store failure the transaction is rolled back and any tuples
	/// already applied are reverted; the caller gets
	/// [`OrgError::AuthorizationSync`]. If reverting fails the result is
	/// [`OrgError::RollbackFailed`].
	#[tracing::instrument(skip(self, tx, delta), fields(entity = entity, writes = delta.writes.len(), deletes = delta.deletes.len()))]
	pub async fn commit(&self, tx: Transaction<'static, Sqlite>, delta: TupleDelta, entity: &str) -> Result<()> {
		let store = Arc::clone(&self.store);
		let chunk_size = self.max_tuples_per_write;
		let entity = entity.to_string();

		let handle = tokio::spawn(async move { sync_and_commit(tx, store, delta, chunk_size, entity).await });

		match handle.await {
			Ok(result) => result,
			Err(e) => {
				tracing::error!(error = %e, "authorization sync task did not complete");
				Err(OrgError::RollbackFailed(format!("authorization sync task aborted: {e}")))
			}
		}
	}
}

/// Tuples applied so far, for compensation.
#[derive(Default)]
struct Applied {
	written: Vec<Tuple>,
	deleted: Vec<Tuple>,
}

async fn sync_and_commit(
	tx: Transaction<'static, Sqlite>,
	store: Arc<dyn RelationshipStore>,
	delta: TupleDelta,
	chunk_size: usize,
	entity: String,
) -> Result<()> {
	let mut applied = Applied::default();

	if let Err(e) = apply_delta(store.as_ref(), &delta, chunk_size, &mut applied).await {
		tracing::warn!(entity = %entity, error = %e, "authorization sync failed, rolling back");
		let rollback = tx.rollback().await;
		let compensation = compensate(store.as_ref(), &applied, chunk_size).await;

		return match (rollback, compensation) {
			(Ok(()), Ok(())) => Err(OrgError::AuthorizationSync { entity }),
			(Err(e), _) => {
				tracing::error!(entity = %entity, error = %e, "relational rollback failed");
				Err(OrgError::RollbackFailed(format!("relational rollback failed: {e}")))
			}
			(Ok(()), Err(e)) => {
				tracing::error!(entity = %entity, error = %e, "tuple compensation failed");
				Err(OrgError::RollbackFailed(
					"authorization tuples could not be reverted".to_string(),
				))
			}
		};
	}

	if let Err(e) = tx.commit().await {
		tracing::warn!(entity = %entity, error = %e, "relational commit failed, reverting tuples");
		return match compensate(store.as_ref(), &applied, chunk_size).await {
			Ok(()) => Err(OrgError::TransientStore(e.to_string())),
			Err(ce) => {
				tracing::error!(entity = %entity, error = %ce, "tuple compensation failed");
				Err(OrgError::RollbackFailed(format!(
					"commit failed ({e}) and authorization tuples could not be reverted"
				)))
			}
		};
	}

	tracing::debug!(entity = %entity, "mutation committed");
	Ok(())
}

async fn apply_delta(
	store: &dyn RelationshipStore,
	delta: &TupleDelta,
	chunk_size: usize,
	applied: &mut Applied,
) -> FgaResult<()> {
	for chunk in delta.writes.chunks(chunk_size) {
		store.write(chunk).await?;
		applied.written.extend_from_slice(chunk);
	}
	for chunk in delta.deletes.chunks(chunk_size) {
		store.delete(chunk).await?;
		applied.deleted.extend_from_slice(chunk);
	}
	Ok(())
}

async fn compensate(store: &dyn RelationshipStore, applied: &Applied, chunk_size: usize) -> FgaResult<()> {
	for chunk in applied.written.chunks(chunk_size) {
		store.delete(chunk).await?;
	}
	for chunk in applied.deleted.chunks(chunk_size) {
		store.write(chunk).await?;
	}
	Ok(())
}
