// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciliation of tuple deletions left pending by cascades.
//!
//! A cascade enqueues every tuple it must delete in the
//! `authz_reconciliation` ledger inside its relational transaction. Rows are
//! removed as the relationship store confirms each deletion. Whatever
//! remains is divergence, visible through [`Reconciler::pending_count`] and
//! retried by [`Reconciler::run`].

use std::sync::Arc;

use chrono::Utc;
use orgraph_fga::{RelationshipStore, Tuple, MAX_TUPLES_PER_WRITE};
use orgraph_server_db::{PendingTupleDeletion, ReconciliationRepository};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::coordinator::MutationCoordinator;
use crate::error::Result;
use crate::tuples::tuple_from_parts;

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Result of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
	/// Ledger rows processed in this sweep.
	pub attempted: usize,
	/// Rows whose tuples the store confirmed deleted.
	pub reconciled: usize,
	/// Rows still pending after the sweep.
	pub remaining: usize,
}

#[derive(Debug, Default)]
pub(crate) struct DrainOutcome {
	pub reconciled: usize,
	pub failed: usize,
}

/// Delete the tuples of `rows` in chunks, removing each confirmed chunk from
/// the ledger and recording failures on the rest.
pub(crate) async fn drain(
	conn: &mut SqliteConnection,
	store: &dyn RelationshipStore,
	rows: &[PendingTupleDeletion],
	chunk_size: usize,
) -> Result<DrainOutcome> {
	let mut outcome = DrainOutcome::default();

	let mut parsed: Vec<(i64, Tuple)> = Vec::with_capacity(rows.len());
	let mut malformed = Vec::new();
	for row in rows {
		match tuple_from_parts(&row.subject, &row.relation, &row.object) {
			Ok(tuple) => parsed.push((row.id, tuple)),
			Err(_) => malformed.push(row.id),
		}
	}
	if !malformed.is_empty() {
		tracing::warn!(count = malformed.len(), "malformed tuples in reconciliation ledger");
		ReconciliationRepository::record_failure(conn, &malformed, "malformed tuple", Utc::now()).await?;
		outcome.failed += malformed.len();
	}

	for chunk in parsed.chunks(chunk_size.max(1)) {
		let ids: Vec<i64> = chunk.iter().map(|(id, _)| *id).collect();
		let tuples: Vec<Tuple> = chunk.iter().map(|(_, t)| t.clone()).collect();

		match store.delete(&tuples).await {
			Ok(()) => {
				ReconciliationRepository::remove(conn, &ids).await?;
				outcome.reconciled += ids.len();
			}
			Err(e) => {
				tracing::warn!(count = ids.len(), error = %e, "tuple deletion failed, left pending");
				ReconciliationRepository::record_failure(conn, &ids, &e.to_string(), Utc::now()).await?;
				outcome.failed += ids.len();
			}
		}
	}

	Ok(outcome)
}

/// Retries pending cascade tuple deletions.
#[derive(Clone)]
pub struct Reconciler {
	pool: SqlitePool,
	store: Arc<dyn RelationshipStore>,
	batch_size: usize,
	max_tuples_per_write: usize,
}

impl Reconciler {
	pub fn new(pool: SqlitePool, store: Arc<dyn RelationshipStore>) -> Self {
		Self {
			pool,
			store,
			batch_size: DEFAULT_BATCH_SIZE,
			max_tuples_per_write: MAX_TUPLES_PER_WRITE,
		}
	}

	pub fn from_coordinator(coordinator: &MutationCoordinator) -> Self {
		Self {
			max_tuples_per_write: coordinator.max_tuples_per_write(),
			..Self::new(coordinator.pool().clone(), Arc::clone(coordinator.store()))
		}
	}

	pub fn with_batch_size(mut self, batch_size: usize) -> Self {
		self.batch_size = batch_size.max(1);
		self
	}

	#[tracing::instrument(skip(self))]
	pub async fn pending_count(&self) -> Result<usize> {
		let mut conn = self.pool.acquire().await?;
		let count = ReconciliationRepository::count_pending(&mut conn).await?;
		Ok(usize::try_from(count).unwrap_or(0))
	}

	/// One sweep over every pending deletion, oldest first, loading
	/// `batch_size` ledger rows at a time. Rows that fail stay behind the
	/// cursor until the next sweep.
	#[tracing::instrument(skip(self), fields(batch_size = self.batch_size))]
	pub async fn run(&self) -> Result<ReconcileReport> {
		let mut conn = self.pool.acquire().await?;
		let limit = i64::try_from(self.batch_size).unwrap_or(i64::MAX);
		let chunk_size = self.batch_size.min(self.max_tuples_per_write);

		let mut report = ReconcileReport::default();
		let mut cursor = 0;
		loop {
			let batch = ReconciliationRepository::list_pending(&mut conn, cursor, limit).await?;
			let Some(last) = batch.last() else {
				break;
			};
			cursor = last.id;
			report.attempted += batch.len();
			let outcome = drain(&mut conn, self.store.as_ref(), &batch, chunk_size).await?;
			report.reconciled += outcome.reconciled;
			tracing::debug!(
				rows = batch.len(),
				reconciled = outcome.reconciled,
				failed = outcome.failed,
				"reconciliation batch processed"
			);
		}

		let remaining = ReconciliationRepository::count_pending(&mut conn).await?;
		report.remaining = usize::try_from(remaining).unwrap_or(0);

		if report.remaining > 0 {
			tracing::warn!(
				attempted = report.attempted,
				reconciled = report.reconciled,
				remaining = report.remaining,
				"reconciliation sweep left tuples pending"
			);
		} else {
			tracing::info!(
				attempted = report.attempted,
				reconciled = report.reconciled,
				"reconciliation sweep complete"
			);
		}
		Ok(report)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::authz::{authorization_model, org_object, user_subject, MEMBER_RELATION};
	use crate::tuples::ledger_key;
	use orgraph_fga::{MockRelationshipStore, StoreCall};
	use orgraph_server_auth::{OrgId, UserId};
	use orgraph_server_db::testing::create_test_pool;
	use orgraph_server_db::TupleKey;

	async fn seed(pool: &SqlitePool, store: &MockRelationshipStore, n: usize) -> OrgId {
		let root = OrgId::generate();
		let tuples: Vec<Tuple> = (0..n)
			.map(|_| Tuple::new(user_subject(&UserId::generate()), MEMBER_RELATION, org_object(&root)))
			.collect();
		store.write(&tuples).await.unwrap();
		let keys: Vec<TupleKey> = tuples.iter().map(ledger_key).collect();
		let mut conn = pool.acquire().await.unwrap();
		ReconciliationRepository::enqueue(&mut conn, &root, &keys, Utc::now())
			.await
			.unwrap();
		root
	}

	#[tokio::test]
	async fn run_drains_ledger_and_store() {
		let pool = create_test_pool().await;
		let store = Arc::new(MockRelationshipStore::new(authorization_model()));
		seed(&pool, &store, 5).await;

		let reconciler = Reconciler::new(pool, store.clone()).with_batch_size(2);
		assert_eq!(reconciler.pending_count().await.unwrap(), 5);

		let report = reconciler.run().await.unwrap();
		assert_eq!(
			report,
			ReconcileReport {
				attempted: 5,
				reconciled: 5,
				remaining: 0
			}
		);
		assert!(store.tuples().await.is_empty());

		// One delete per batch of two: the ledger is read a page at a time.
		let deletes: Vec<_> = store
			.calls()
			.into_iter()
			.filter(|c| matches!(c, StoreCall::Delete { .. }))
			.collect();
		assert_eq!(
			deletes,
			vec![
				StoreCall::Delete { count: 2 },
				StoreCall::Delete { count: 2 },
				StoreCall::Delete { count: 1 },
			]
		);
	}

	#[tokio::test]
	async fn failed_rows_are_attempted_once_per_sweep() {
		let pool = create_test_pool().await;
		let store = Arc::new(MockRelationshipStore::new(authorization_model()));
		seed(&pool, &store, 5).await;
		store.fail_deletes("relationship store unavailable");

		let reconciler = Reconciler::new(pool, store.clone()).with_batch_size(2);
		let report = reconciler.run().await.unwrap();
		assert_eq!(report.attempted, 5);
		assert_eq!(report.reconciled, 0);
		assert_eq!(report.remaining, 5);
		let deletes = store
			.calls()
			.into_iter()
			.filter(|c| matches!(c, StoreCall::Delete { .. }))
			.count();
		assert_eq!(deletes, 3);

		store.clear_mocks();
		let report = reconciler.run().await.unwrap();
		assert_eq!(report.reconciled, 5);
		assert_eq!(report.remaining, 0);
	}

	#[tokio::test]
	async fn failures_stay_pending_with_attempts_recorded() {
		let pool = create_test_pool().await;
		let store = Arc::new(MockRelationshipStore::new(authorization_model()));
		let root = seed(&pool, &store, 3).await;
		store.fail_deletes_after(1);

		let reconciler = Reconciler::new(pool.clone(), store.clone()).with_batch_size(2);
		let report = reconciler.run().await.unwrap();
		assert_eq!(report.reconciled, 2);
		assert_eq!(report.remaining, 1);

		let mut conn = pool.acquire().await.unwrap();
		let left = ReconciliationRepository::list_pending_for_root(&mut conn, &root)
			.await
			.unwrap();
		assert_eq!(left[0].attempts, 1);
		assert!(left[0].last_error.is_some());
		drop(conn);

		store.clear_mocks();
		let report = reconciler.run().await.unwrap();
		assert_eq!(report.attempted, 1);
		assert_eq!(report.remaining, 0);
	}

	#[tokio::test]
	async fn malformed_rows_are_recorded_not_dropped() {
		let pool = create_test_pool().await;
		let store = Arc::new(MockRelationshipStore::new(authorization_model()));
		let mut conn = pool.acquire().await.unwrap();
		let bad = TupleKey {
			subject: "not-a-subject".to_string(),
			relation: "member".to_string(),
			object: "organization:x".to_string(),
		};
		ReconciliationRepository::enqueue(&mut conn, &OrgId::generate(), &[bad], Utc::now())
			.await
			.unwrap();
		drop(conn);

		let report = Reconciler::new(pool, store).run().await.unwrap();
		assert_eq!(report.reconciled, 0);
		assert_eq!(report.remaining, 1);
	}
}
