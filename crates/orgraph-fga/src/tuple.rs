// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Relationship tuple types.
//!
//! A [`Tuple`] states that a [`Subject`] holds a relation on an object, e.g.
//! `user:U #member organization:O`. Subjects may be usersets such as
//! `organization:O#member`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FgaError;

/// An object in the relationship store: `type:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
	pub object_type: String,
	pub id: String,
}

impl ObjectRef {
	pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			object_type: object_type.into(),
			id: id.into(),
		}
	}
}

impl fmt::Display for ObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.object_type, self.id)
	}
}

impl FromStr for ObjectRef {
	type Err = FgaError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.split_once(':') {
			Some((t, id)) if !t.is_empty() && !id.is_empty() && !id.contains('#') => {
				Ok(ObjectRef::new(t, id))
			}
			_ => Err(FgaError::InvalidTuple(format!("malformed object '{s}'"))),
		}
	}
}

/// The subject side of a tuple: an object, optionally narrowed to a userset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subject {
	pub object: ObjectRef,
	pub relation: Option<String>,
}

impl Subject {
	pub fn new(object: ObjectRef) -> Self {
		Self {
			object,
			relation: None,
		}
	}

	pub fn userset(object: ObjectRef, relation: impl Into<String>) -> Self {
		Self {
			object,
			relation: Some(relation.into()),
		}
	}
}

impl From<ObjectRef> for Subject {
	fn from(object: ObjectRef) -> Self {
		Subject::new(object)
	}
}

impl fmt::Display for Subject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.relation {
			Some(rel) => write!(f, "{}#{}", self.object, rel),
			None => write!(f, "{}", self.object),
		}
	}
}

impl FromStr for Subject {
	type Err = FgaError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.split_once('#') {
			Some((obj, rel)) if !rel.is_empty() => Ok(Subject::userset(obj.parse()?, rel)),
			Some(_) => Err(FgaError::InvalidTuple(format!("malformed subject '{s}'"))),
			None => Ok(Subject::new(s.parse()?)),
		}
	}
}

/// A relationship tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tuple {
	pub subject: Subject,
	pub relation: String,
	pub object: ObjectRef,
}

impl Tuple {
	pub fn new(subject: impl Into<Subject>, relation: impl Into<String>, object: ObjectRef) -> Self {
		Self {
			subject: subject.into(),
			relation: relation.into(),
			object,
		}
	}

	/// Whether the tuple names `object` on either side.
	pub fn references(&self, object: &ObjectRef) -> bool {
		&self.object == object || &self.subject.object == object
	}
}

impl fmt::Display for Tuple {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} #{} {}", self.subject, self.relation, self.object)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn tuple_display_matches_store_notation() {
		let tuple = Tuple::new(
			ObjectRef::new("user", "u1"),
			"member",
			ObjectRef::new("organization", "o1"),
		);
		assert_eq!(tuple.to_string(), "user:u1 #member organization:o1");
	}

	#[test]
	fn userset_subject_parses() {
		let subject: Subject = "organization:o1#member".parse().unwrap();
		assert_eq!(subject.object, ObjectRef::new("organization", "o1"));
		assert_eq!(subject.relation.as_deref(), Some("member"));
	}

	#[test]
	fn malformed_objects_are_rejected() {
		assert!("organization".parse::<ObjectRef>().is_err());
		assert!(":o1".parse::<ObjectRef>().is_err());
		assert!("organization:".parse::<ObjectRef>().is_err());
		assert!("organization:o1#".parse::<Subject>().is_err());
	}

	#[test]
	fn references_checks_both_sides() {
		let parent = ObjectRef::new("organization", "p");
		let child = ObjectRef::new("organization", "c");
		let tuple = Tuple::new(parent.clone(), "parent", child.clone());
		assert!(tuple.references(&parent));
		assert!(tuple.references(&child));
		assert!(!tuple.references(&ObjectRef::new("organization", "x")));
	}

	proptest! {
		#[test]
		fn subject_display_parses_back(t in "[a-z_]{1,12}", id in "[a-z0-9-]{1,36}", rel in proptest::option::of("[a-z_]{1,12}")) {
			let subject = match rel {
				Some(r) => Subject::userset(ObjectRef::new(t, id), r),
				None => Subject::new(ObjectRef::new(t, id)),
			};
			prop_assert_eq!(subject.to_string().parse::<Subject>().unwrap(), subject);
		}
	}
}
