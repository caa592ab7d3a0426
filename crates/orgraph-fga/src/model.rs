// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization model evaluated by [`crate::MemoryRelationshipStore`].
//!
//! A model maps each object type to its relations, and each relation to a
//! union of rewrites:
//!
//! - [`Userset::Direct`]: tuples written for this exact relation
//! - [`Userset::Computed`]: another relation on the same object
//! - [`Userset::FromParent`]: a relation on the objects linked through a
//!   tupleset relation (OpenFGA's tuple-to-userset)

use std::collections::HashMap;

use crate::error::{FgaError, FgaResult};

/// One branch of a relation's union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Userset {
	Direct,
	Computed(String),
	FromParent { tupleset: String, relation: String },
}

impl Userset {
	pub fn computed(relation: impl Into<String>) -> Self {
		Userset::Computed(relation.into())
	}

	pub fn from_parent(tupleset: impl Into<String>, relation: impl Into<String>) -> Self {
		Userset::FromParent {
			tupleset: tupleset.into(),
			relation: relation.into(),
		}
	}
}

/// Definition of one object type.
#[derive(Debug, Clone, Default)]
pub struct TypeDefinition {
	pub name: String,
	relations: HashMap<String, Vec<Userset>>,
}

impl TypeDefinition {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			relations: HashMap::new(),
		}
	}

	/// Adds a relation defined as the union of `rewrites`.
	pub fn relation(mut self, name: impl Into<String>, rewrites: Vec<Userset>) -> Self {
		self.relations.insert(name.into(), rewrites);
		self
	}

	pub fn rewrites(&self, relation: &str) -> Option<&[Userset]> {
		self.relations.get(relation).map(Vec::as_slice)
	}

	/// Whether tuples may be written directly for `relation`.
	pub fn accepts_direct(&self, relation: &str) -> bool {
		self
			.rewrites(relation)
			.map(|r| r.contains(&Userset::Direct))
			.unwrap_or(false)
	}
}

/// A complete authorization model.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationModel {
	types: HashMap<String, TypeDefinition>,
}

impl AuthorizationModel {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_type(mut self, def: TypeDefinition) -> Self {
		self.types.insert(def.name.clone(), def);
		self
	}

	pub fn type_definition(&self, name: &str) -> FgaResult<&TypeDefinition> {
		self
			.types
			.get(name)
			.ok_or_else(|| FgaError::UnknownType(name.to_string()))
	}

	pub fn rewrites(&self, object_type: &str, relation: &str) -> FgaResult<&[Userset]> {
		self
			.type_definition(object_type)?
			.rewrites(relation)
			.ok_or_else(|| FgaError::UnknownRelation {
				object_type: object_type.to_string(),
				relation: relation.to_string(),
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc_model() -> AuthorizationModel {
		AuthorizationModel::new()
			.with_type(TypeDefinition::new("user"))
			.with_type(
				TypeDefinition::new("doc")
					.relation("editor", vec![Userset::Direct])
					.relation("viewer", vec![Userset::Direct, Userset::computed("editor")]),
			)
	}

	#[test]
	fn looks_up_rewrites() {
		let model = doc_model();
		assert_eq!(model.rewrites("doc", "viewer").unwrap().len(), 2);
		assert!(model.type_definition("doc").unwrap().accepts_direct("editor"));
	}

	#[test]
	fn unknown_type_and_relation_are_errors() {
		let model = doc_model();
		assert!(matches!(model.rewrites("folder", "viewer"), Err(FgaError::UnknownType(_))));
		assert!(matches!(
			model.rewrites("doc", "owner"),
			Err(FgaError::UnknownRelation { .. })
		));
	}
}
