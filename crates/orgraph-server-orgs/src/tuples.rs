// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Relationship tuples derived from relational mutations.

use orgraph_fga::{FgaError, ObjectRef, Subject, Tuple};
use orgraph_server_auth::{Group, OrgMembership, OrgRole, Organization, UserSetting};
use orgraph_server_db::TupleKey;

use crate::authz::{
	group_object, org_object, user_setting_object, user_subject, ADMIN_RELATION, OWNER_RELATION,
	PARENT_RELATION,
};

/// Tuples to write and delete for one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleDelta {
	pub writes: Vec<Tuple>,
	pub deletes: Vec<Tuple>,
}

impl TupleDelta {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn write(mut self, tuple: Tuple) -> Self {
		self.writes.push(tuple);
		self
	}

	pub fn delete(mut self, tuple: Tuple) -> Self {
		self.deletes.push(tuple);
		self
	}

	pub fn merge(mut self, other: TupleDelta) -> Self {
		self.writes.extend(other.writes);
		self.deletes.extend(other.deletes);
		self
	}

	pub fn is_empty(&self) -> bool {
		self.writes.is_empty() && self.deletes.is_empty()
	}

	pub fn len(&self) -> usize {
		self.writes.len() + self.deletes.len()
	}
}

pub fn membership_tuple(membership: &OrgMembership) -> Tuple {
	role_tuple(membership, membership.role)
}

fn role_tuple(membership: &OrgMembership, role: OrgRole) -> Tuple {
	Tuple::new(
		user_subject(&membership.user_id),
		role.relation(),
		org_object(&membership.org_id),
	)
}

/// `organization:P #parent organization:C`, for child orgs.
pub fn parent_tuple(org: &Organization) -> Option<Tuple> {
	org.parent_id
		.map(|parent| Tuple::new(org_object(&parent), PARENT_RELATION, org_object(&org.id)))
}

/// Tuples for a newly created organization and its owner membership.
pub fn org_created(org: &Organization, owner: &OrgMembership) -> TupleDelta {
	let mut delta = TupleDelta::new().write(membership_tuple(owner));
	if let Some(parent) = parent_tuple(org) {
		delta = delta.write(parent);
	}
	delta
}

pub fn membership_created(membership: &OrgMembership) -> TupleDelta {
	TupleDelta::new().write(membership_tuple(membership))
}

pub fn membership_deleted(membership: &OrgMembership) -> TupleDelta {
	TupleDelta::new().delete(membership_tuple(membership))
}

pub fn role_changed(membership: &OrgMembership, new_role: OrgRole) -> TupleDelta {
	if membership.role == new_role {
		return TupleDelta::new();
	}
	TupleDelta::new()
		.write(role_tuple(membership, new_role))
		.delete(membership_tuple(membership))
}

fn group_tuples(group: &Group) -> Vec<Tuple> {
	vec![
		Tuple::new(org_object(&group.owner_id), PARENT_RELATION, group_object(&group.id)),
		Tuple::new(user_subject(&group.created_by), ADMIN_RELATION, group_object(&group.id)),
	]
}

pub fn group_created(group: &Group) -> TupleDelta {
	TupleDelta {
		writes: group_tuples(group),
		deletes: Vec::new(),
	}
}

pub fn group_deleted(group: &Group) -> TupleDelta {
	TupleDelta {
		writes: Vec::new(),
		deletes: group_tuples(group),
	}
}

pub fn user_setting_created(setting: &UserSetting) -> TupleDelta {
	TupleDelta::new().write(Tuple::new(
		user_subject(&setting.user_id),
		OWNER_RELATION,
		user_setting_object(&setting.id),
	))
}

/// Every tuple referencing an entity in a deleted closure.
pub fn cascade_deletions(
	orgs: &[Organization],
	memberships: &[OrgMembership],
	groups: &[Group],
) -> Vec<Tuple> {
	let mut tuples: Vec<Tuple> = orgs.iter().filter_map(parent_tuple).collect();
	tuples.extend(memberships.iter().map(membership_tuple));
	tuples.extend(groups.iter().flat_map(group_tuples));
	tuples.sort();
	tuples.dedup();
	tuples
}

/// Ledger form of a tuple.
pub fn ledger_key(tuple: &Tuple) -> TupleKey {
	TupleKey {
		subject: tuple.subject.to_string(),
		relation: tuple.relation.clone(),
		object: tuple.object.to_string(),
	}
}

/// Parse a ledger row back into a tuple.
pub fn tuple_from_parts(subject: &str, relation: &str, object: &str) -> Result<Tuple, FgaError> {
	let subject: Subject = subject.parse()?;
	let object: ObjectRef = object.parse()?;
	if relation.is_empty() {
		return Err(FgaError::InvalidTuple("empty relation".to_string()));
	}
	Ok(Tuple::new(subject, relation, object))
}

#[cfg(test)]
mod tests {
	use super::*;
	use orgraph_server_auth::{OrgId, UserId};

	#[test]
	fn child_org_writes_owner_and_parent() {
		let user = UserId::generate();
		let parent = OrgId::generate();
		let org = Organization::new("child", "child", None, Some(parent), user);
		let owner = OrgMembership::new(org.id, user, OrgRole::Owner);

		let delta = org_created(&org, &owner);
		assert_eq!(delta.writes.len(), 2);
		assert!(delta.deletes.is_empty());
		assert_eq!(
			delta.writes[1].to_string(),
			format!("organization:{parent} #parent organization:{}", org.id)
		);
	}

	#[test]
	fn role_change_swaps_relation() {
		let membership = OrgMembership::new(OrgId::generate(), UserId::generate(), OrgRole::Member);
		let delta = role_changed(&membership, OrgRole::Admin);
		assert_eq!(delta.writes[0].relation, "admin");
		assert_eq!(delta.deletes[0].relation, "member");
		assert!(role_changed(&membership, OrgRole::Member).is_empty());
	}

	#[test]
	fn cascade_deletions_cover_every_entity() {
		let user = UserId::generate();
		let root = Organization::new("root", "root", None, None, user);
		let child = Organization::new("child", "child", None, Some(root.id), user);
		let memberships = vec![
			OrgMembership::new(root.id, user, OrgRole::Owner),
			OrgMembership::new(child.id, user, OrgRole::Owner),
		];
		let group = Group::new(child.id, "eng", "eng", None, user);

		let tuples = cascade_deletions(&[root.clone(), child.clone()], &memberships, &[group.clone()]);
		// child parent + 2 memberships + 2 group tuples
		assert_eq!(tuples.len(), 5);
		for org in [&root, &child] {
			assert!(tuples.iter().any(|t| t.references(&org_object(&org.id))));
		}
		assert!(tuples.iter().any(|t| t.references(&group_object(&group.id))));
	}

	#[test]
	fn ledger_keys_parse_back() {
		let tuple = membership_tuple(&OrgMembership::new(
			OrgId::generate(),
			UserId::generate(),
			OrgRole::Admin,
		));
		let key = ledger_key(&tuple);
		assert_eq!(tuple_from_parts(&key.subject, &key.relation, &key.object).unwrap(), tuple);
		assert!(tuple_from_parts("nonsense", "member", &key.object).is_err());
	}
}
