// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization hierarchy as an id-indexed adjacency structure.
//!
//! Built from `(org, parent)` edges loaded from the relational store, so
//! traversal never follows live entity references and can be tested without
//! storage.

use orgraph_server_auth::OrgId;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct OrgHierarchy {
	parents: HashMap<OrgId, OrgId>,
	children: HashMap<OrgId, Vec<OrgId>>,
}

impl OrgHierarchy {
	pub fn from_edges(edges: impl IntoIterator<Item = (OrgId, Option<OrgId>)>) -> Self {
		let mut hierarchy = Self::default();
		for (org, parent) in edges {
			if let Some(parent) = parent {
				hierarchy.parents.insert(org, parent);
				hierarchy.children.entry(parent).or_default().push(org);
			}
		}
		for children in hierarchy.children.values_mut() {
			children.sort();
		}
		hierarchy
	}

	pub fn parent_of(&self, org: &OrgId) -> Option<OrgId> {
		self.parents.get(org).copied()
	}

	pub fn children_of(&self, org: &OrgId) -> &[OrgId] {
		self.children.get(org).map(Vec::as_slice).unwrap_or(&[])
	}

	/// `root` and every transitive descendant, breadth first.
	///
	/// Each org appears once even if the stored edges contain a cycle.
	pub fn closure(&self, root: &OrgId) -> Vec<OrgId> {
		let mut visited = HashSet::from([*root]);
		let mut order = vec![*root];
		let mut queue = VecDeque::from([*root]);

		while let Some(current) = queue.pop_front() {
			for child in self.children_of(&current) {
				if visited.insert(*child) {
					order.push(*child);
					queue.push_back(*child);
				}
			}
		}
		order
	}

	/// Parents of `org`, nearest first, excluding `org` itself.
	pub fn ancestors(&self, org: &OrgId) -> Vec<OrgId> {
		let mut seen = HashSet::from([*org]);
		let mut ancestors = Vec::new();
		let mut current = *org;
		while let Some(parent) = self.parent_of(&current) {
			if !seen.insert(parent) {
				break;
			}
			ancestors.push(parent);
			current = parent;
		}
		ancestors
	}

	/// `org` followed by its ancestors.
	pub fn lineage(&self, org: &OrgId) -> Vec<OrgId> {
		let mut lineage = vec![*org];
		lineage.extend(self.ancestors(org));
		lineage
	}
}
