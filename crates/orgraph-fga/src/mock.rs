// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fault-injecting relationship store for tests.
//!
//! Wraps a [`MemoryRelationshipStore`] and lets tests force check results,
//! force errors per operation, pause a call until released, and inspect the
//! calls that were made.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::{FgaError, FgaResult};
use crate::memory::MemoryRelationshipStore;
use crate::model::AuthorizationModel;
use crate::store::RelationshipStore;
use crate::tuple::{ObjectRef, Subject, Tuple};

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
	Check { relation: String, object: ObjectRef },
	Write { count: usize },
	Delete { count: usize },
	ListObjects { relation: String, object_type: String },
}

/// Store operations a test can pause with [`MockRelationshipStore::hold_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
	Check,
	Write,
	Delete,
	ListObjects,
}

/// A paused store call.
///
/// Dropping it without calling [`HeldCall::release`] also lets the call go.
#[derive(Debug)]
pub struct HeldCall {
	entered: oneshot::Receiver<()>,
	release: oneshot::Sender<()>,
}

impl HeldCall {
	/// Resolves once a call has reached the hold.
	pub async fn entered(&mut self) {
		let _ = (&mut self.entered).await;
	}

	pub fn release(self) {
		let _ = self.release.send(());
	}
}

#[derive(Debug)]
struct Hold {
	op: StoreOp,
	entered: oneshot::Sender<()>,
	release: oneshot::Receiver<()>,
}

#[derive(Debug, Default)]
struct Faults {
	check_result: Option<bool>,
	list_result: Option<Vec<String>>,
	check_error: Option<String>,
	list_error: Option<String>,
	write_error: Option<String>,
	delete_error: Option<String>,
	writes_before_failure: Option<usize>,
	deletes_before_failure: Option<usize>,
	holds: Vec<Hold>,
	calls: Vec<StoreCall>,
}

pub struct MockRelationshipStore {
	inner: MemoryRelationshipStore,
	faults: Mutex<Faults>,
}

impl MockRelationshipStore {
	pub fn new(model: AuthorizationModel) -> Self {
		Self {
			inner: MemoryRelationshipStore::new(model),
			faults: Mutex::new(Faults::default()),
		}
	}

	fn faults(&self) -> MutexGuard<'_, Faults> {
		self.faults.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Every check returns `allowed` without consulting stored tuples.
	pub fn check_any(&self, allowed: bool) {
		self.faults().check_result = Some(allowed);
	}

	/// Every list-objects call returns `ids`.
	pub fn list_any(&self, ids: Vec<String>) {
		self.faults().list_result = Some(ids);
	}

	pub fn fail_checks(&self, message: impl Into<String>) {
		self.faults().check_error = Some(message.into());
	}

	pub fn fail_lists(&self, message: impl Into<String>) {
		self.faults().list_error = Some(message.into());
	}

	pub fn fail_writes(&self, message: impl Into<String>) {
		self.faults().write_error = Some(message.into());
	}

	pub fn fail_deletes(&self, message: impl Into<String>) {
		self.faults().delete_error = Some(message.into());
	}

	/// Lets `n` write calls succeed, then fails every later one.
	pub fn fail_writes_after(&self, n: usize) {
		self.faults().writes_before_failure = Some(n);
	}

	/// Lets `n` delete calls succeed, then fails every later one.
	pub fn fail_deletes_after(&self, n: usize) {
		self.faults().deletes_before_failure = Some(n);
	}

	/// Pauses the next `op` call until the returned handle is released.
	/// Calls already in flight are not affected.
	pub fn hold_next(&self, op: StoreOp) -> HeldCall {
		let (entered_tx, entered_rx) = oneshot::channel();
		let (release_tx, release_rx) = oneshot::channel();
		self.faults().holds.push(Hold {
			op,
			entered: entered_tx,
			release: release_rx,
		});
		HeldCall {
			entered: entered_rx,
			release: release_tx,
		}
	}

	async fn wait_if_held(&self, op: StoreOp) {
		let hold = {
			let mut faults = self.faults();
			match faults.holds.iter().position(|h| h.op == op) {
				Some(i) => faults.holds.remove(i),
				None => return,
			}
		};
		let _ = hold.entered.send(());
		let _ = hold.release.await;
	}

	/// Removes every injected result and error. Recorded calls are kept.
	pub fn clear_mocks(&self) {
		let mut faults = self.faults();
		let calls = std::mem::take(&mut faults.calls);
		*faults = Faults {
			calls,
			..Faults::default()
		};
	}

	pub fn calls(&self) -> Vec<StoreCall> {
		self.faults().calls.clone()
	}

	pub fn clear_calls(&self) {
		self.faults().calls.clear();
	}

	pub async fn tuples(&self) -> Vec<Tuple> {
		self.inner.tuples().await
	}

	/// Tuples that name `object` as subject or object.
	pub async fn tuples_referencing(&self, object: &ObjectRef) -> Vec<Tuple> {
		self
			.inner
			.tuples()
			.await
			.into_iter()
			.filter(|t| t.references(object))
			.collect()
	}

	/// Consumes one allowance from a fail-after budget.
	fn spend(budget: &mut Option<usize>) -> bool {
		match budget {
			Some(0) => false,
			Some(n) => {
				*n -= 1;
				true
			}
			None => true,
		}
	}
}

#[async_trait]
impl RelationshipStore for MockRelationshipStore {
	async fn check(&self, subject: &Subject, relation: &str, object: &ObjectRef) -> FgaResult<bool> {
		self.wait_if_held(StoreOp::Check).await;
		let forced = {
			let mut faults = self.faults();
			faults.calls.push(StoreCall::Check {
				relation: relation.to_string(),
				object: object.clone(),
			});
			if let Some(msg) = &faults.check_error {
				return Err(FgaError::Injected(msg.clone()));
			}
			faults.check_result
		};
		match forced {
			Some(allowed) => Ok(allowed),
			None => self.inner.check(subject, relation, object).await,
		}
	}

	async fn write(&self, tuples: &[Tuple]) -> FgaResult<()> {
		self.wait_if_held(StoreOp::Write).await;
		{
			let mut faults = self.faults();
			faults.calls.push(StoreCall::Write {
				count: tuples.len(),
			});
			if let Some(msg) = &faults.write_error {
				return Err(FgaError::Injected(msg.clone()));
			}
			if !Self::spend(&mut faults.writes_before_failure) {
				return Err(FgaError::Injected("write budget exhausted".to_string()));
			}
		}
		self.inner.write(tuples).await
	}

	async fn delete(&self, tuples: &[Tuple]) -> FgaResult<()> {
		self.wait_if_held(StoreOp::Delete).await;
		{
			let mut faults = self.faults();
			faults.calls.push(StoreCall::Delete {
				count: tuples.len(),
			});
			if let Some(msg) = &faults.delete_error {
				return Err(FgaError::Injected(msg.clone()));
			}
			if !Self::spend(&mut faults.deletes_before_failure) {
				return Err(FgaError::Injected("delete budget exhausted".to_string()));
			}
		}
		self.inner.delete(tuples).await
	}

	async fn list_objects(
		&self,
		subject: &Subject,
		relation: &str,
		object_type: &str,
	) -> FgaResult<Vec<String>> {
		self.wait_if_held(StoreOp::ListObjects).await;
		let forced = {
			let mut faults = self.faults();
			faults.calls.push(StoreCall::ListObjects {
				relation: relation.to_string(),
				object_type: object_type.to_string(),
			});
			if let Some(msg) = &faults.list_error {
				return Err(FgaError::Injected(msg.clone()));
			}
			faults.list_result.clone()
		};
		match forced {
			Some(ids) => Ok(ids),
			None => self.inner.list_objects(subject, relation, object_type).await,
		}
	}
}
