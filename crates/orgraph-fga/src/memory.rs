// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process relationship store.
//!
//! Tuples are indexed by `(object, relation)` and checks are evaluated
//! against an [`AuthorizationModel`]. Used for single-node deployments and
//! as the backing store for [`crate::mock::MockRelationshipStore`].

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{FgaError, FgaResult};
use crate::model::{AuthorizationModel, Userset};
use crate::store::RelationshipStore;
use crate::tuple::{ObjectRef, Subject, Tuple};

/// Maximum rewrite depth followed by a single check.
pub const MAX_RESOLUTION_DEPTH: u32 = 25;

type TupleIndex = HashMap<(ObjectRef, String), HashSet<Subject>>;

pub struct MemoryRelationshipStore {
	model: AuthorizationModel,
	tuples: RwLock<TupleIndex>,
}

impl MemoryRelationshipStore {
	pub fn new(model: AuthorizationModel) -> Self {
		Self {
			model,
			tuples: RwLock::new(HashMap::new()),
		}
	}

	pub fn model(&self) -> &AuthorizationModel {
		&self.model
	}

	/// Returns every stored tuple in a stable order.
	pub async fn tuples(&self) -> Vec<Tuple> {
		let index = self.tuples.read().await;
		let mut out: Vec<Tuple> = index
			.iter()
			.flat_map(|((object, relation), subjects)| {
				subjects
					.iter()
					.map(move |s| Tuple::new(s.clone(), relation.clone(), object.clone()))
			})
			.collect();
		out.sort();
		out
	}

	pub async fn len(&self) -> usize {
		self.tuples.read().await.values().map(HashSet::len).sum()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	fn validate(&self, tuple: &Tuple) -> FgaResult<()> {
		let def = self.model.type_definition(&tuple.object.object_type)?;
		if !def.accepts_direct(&tuple.relation) {
			return Err(FgaError::InvalidTuple(format!(
				"relation '{}' on type '{}' does not accept direct tuples",
				tuple.relation, tuple.object.object_type
			)));
		}
		self.model.type_definition(&tuple.subject.object.object_type)?;
		Ok(())
	}

	fn resolve(
		&self,
		index: &TupleIndex,
		subject: &Subject,
		relation: &str,
		object: &ObjectRef,
		depth: u32,
	) -> FgaResult<bool> {
		if depth > MAX_RESOLUTION_DEPTH {
			return Err(FgaError::DepthExceeded(MAX_RESOLUTION_DEPTH));
		}

		for rewrite in self.model.rewrites(&object.object_type, relation)? {
			let granted = match rewrite {
				Userset::Direct => {
					let Some(stored) = index.get(&(object.clone(), relation.to_string())) else {
						continue;
					};
					if stored.contains(subject) {
						true
					} else {
						let mut found = false;
						for userset in stored.iter().filter(|s| s.relation.is_some()) {
							let rel = userset.relation.as_deref().unwrap_or_default();
							if self.resolve(index, subject, rel, &userset.object, depth + 1)? {
								found = true;
								break;
							}
						}
						found
					}
				}
				Userset::Computed(rel) => self.resolve(index, subject, rel, object, depth + 1)?,
				Userset::FromParent {
					tupleset,
					relation: rel,
				} => {
					let Some(parents) = index.get(&(object.clone(), tupleset.clone())) else {
						continue;
					};
					let mut found = false;
					for parent in parents.iter().filter(|s| s.relation.is_none()) {
						if self.resolve(index, subject, rel, &parent.object, depth + 1)? {
							found = true;
							break;
						}
					}
					found
				}
			};
			if granted {
				return Ok(true);
			}
		}
		Ok(false)
	}
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
	#[tracing::instrument(skip(self), fields(subject = %subject, object = %object))]
	async fn check(&self, subject: &Subject, relation: &str, object: &ObjectRef) -> FgaResult<bool> {
		let index = self.tuples.read().await;
		self.resolve(&index, subject, relation, object, 0)
	}

	#[tracing::instrument(skip(self, tuples), fields(count = tuples.len()))]
	async fn write(&self, tuples: &[Tuple]) -> FgaResult<()> {
		for tuple in tuples {
			self.validate(tuple)?;
		}
		let mut index = self.tuples.write().await;
		for tuple in tuples {
			index
				.entry((tuple.object.clone(), tuple.relation.clone()))
				.or_default()
				.insert(tuple.subject.clone());
		}
		tracing::debug!("tuples written");
		Ok(())
	}

	#[tracing::instrument(skip(self, tuples), fields(count = tuples.len()))]
	async fn delete(&self, tuples: &[Tuple]) -> FgaResult<()> {
		let mut index = self.tuples.write().await;
		for tuple in tuples {
			let key = (tuple.object.clone(), tuple.relation.clone());
			if let Some(subjects) = index.get_mut(&key) {
				subjects.remove(&tuple.subject);
				if subjects.is_empty() {
					index.remove(&key);
				}
			}
		}
		tracing::debug!("tuples deleted");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(subject = %subject))]
	async fn list_objects(
		&self,
		subject: &Subject,
		relation: &str,
		object_type: &str,
	) -> FgaResult<Vec<String>> {
		self.model.rewrites(object_type, relation)?;
		let index = self.tuples.read().await;

		let mut candidates = BTreeSet::new();
		for ((object, _), subjects) in index.iter() {
			if object.object_type == object_type {
				candidates.insert(object.clone());
			}
			for s in subjects {
				if s.object.object_type == object_type {
					candidates.insert(s.object.clone());
				}
			}
		}

		let mut ids = Vec::new();
		for object in candidates {
			if self.resolve(&index, subject, relation, &object, 0)? {
				ids.push(object.id);
			}
		}
		Ok(ids)
	}
}
