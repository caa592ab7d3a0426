// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-facing organization service.
//!
//! Operations are grouped by entity in sibling modules; this module holds
//! the service handle and the read-visibility rules they share.
//!
//! Mutations are check-first: the caller is authorized before anything is
//! loaded, so a denied caller cannot learn whether an entity exists. Reads
//! are filter-first: an absent or filtered entity is `NotFound`, and only
//! then is the caller's view permission checked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use orgraph_fga::{ObjectRef, RelationshipStore};
use chrono::{DateTime, Utc};
use orgraph_server_auth::{
	Decision, OrgId, OrgMembership, Organization, RequestContext, SoftDeleteMode, UserId,
};
use orgraph_server_db::{MembershipRepository, OrgRepository, UserRepository};
use sqlx::{SqliteConnection, SqlitePool};

use crate::authz::{user_subject, Action};
use crate::cascade::CascadeEngine;
use crate::coordinator::MutationCoordinator;
use crate::error::{OrgError, Result};
use crate::hierarchy::OrgHierarchy;
use crate::reconcile::Reconciler;

#[derive(Clone)]
pub struct OrgService {
	pub(crate) coordinator: MutationCoordinator,
	pub(crate) cascade: CascadeEngine,
}

/// Which ids of a type the caller may see.
#[derive(Debug, Clone)]
pub(crate) enum Visibility<T> {
	All,
	Only(HashSet<T>),
}

impl<T: std::hash::Hash + Eq> Visibility<T> {
	pub(crate) fn contains(&self, id: &T) -> bool {
		match self {
			Visibility::All => true,
			Visibility::Only(ids) => ids.contains(id),
		}
	}
}

impl OrgService {
	pub fn new(pool: SqlitePool, store: Arc<dyn RelationshipStore>) -> Self {
		Self::from_coordinator(MutationCoordinator::new(pool, store))
	}

	pub fn from_coordinator(coordinator: MutationCoordinator) -> Self {
		Self {
			cascade: CascadeEngine::new(coordinator.clone()),
			coordinator,
		}
	}

	pub fn coordinator(&self) -> &MutationCoordinator {
		&self.coordinator
	}

	pub fn cascade(&self) -> &CascadeEngine {
		&self.cascade
	}

	/// A reconciler sharing this service's pool and relationship store.
	pub fn reconciler(&self) -> Reconciler {
		Reconciler::from_coordinator(&self.coordinator)
	}

	pub(crate) fn pool(&self) -> &SqlitePool {
		self.coordinator.pool()
	}

	/// Fails with `Unauthorized` unless the caller may view `object`.
	///
	/// `owner_org` is the organization whose lineage scopes the object. Under
	/// `SoftDeleteMode::Include`, a deleted object stays visible to callers
	/// whose membership in that lineage was still active when it was deleted,
	/// since its tuples are gone.
	pub(crate) async fn ensure_visible(
		&self,
		conn: &mut SqliteConnection,
		ctx: &RequestContext,
		object: &ObjectRef,
		owner_org: &OrgId,
		deleted: bool,
	) -> Result<()> {
		if self.coordinator.is_allowed(ctx, Action::View, object).await? {
			return Ok(());
		}
		if deleted
			&& ctx.decision() == Decision::Defer
			&& ctx.soft_delete().includes_deleted()
			&& held_membership_in_lineage(conn, &ctx.user_id(), owner_org).await?
		{
			return Ok(());
		}
		Err(OrgError::Unauthorized)
	}

	/// Organizations the caller may list.
	pub(crate) async fn visible_orgs(
		&self,
		conn: &mut SqliteConnection,
		ctx: &RequestContext,
	) -> Result<Visibility<OrgId>> {
		match ctx.decision() {
			Decision::Allow => return Ok(Visibility::All),
			Decision::Deny => return Err(OrgError::Unauthorized),
			Decision::Defer => {}
		}

		let ids = self
			.coordinator
			.store()
			.list_objects(
				&user_subject(&ctx.user_id()),
				Action::View.relation(),
				crate::authz::ORGANIZATION_TYPE,
			)
			.await?;
		let mut visible: HashSet<OrgId> = ids.iter().filter_map(|id| id.parse().ok()).collect();

		if ctx.soft_delete().includes_deleted() {
			visible.extend(deleted_orgs_in_member_lineage(conn, &ctx.user_id()).await?);
		}
		Ok(Visibility::Only(visible))
	}

	pub(crate) async fn ensure_user_exists(&self, conn: &mut SqliteConnection, user_id: &UserId) -> Result<()> {
		UserRepository::get_user_by_id(conn, user_id)
			.await?
			.map(|_| ())
			.ok_or_else(|| OrgError::not_found("user"))
	}
}

/// Orgs whose membership the user kept until the org itself went away:
/// active memberships, and memberships removed by the cascade that deleted
/// their org. A membership removed on its own earlier grants nothing.
fn memberships_held_at_deletion(
	memberships: Vec<OrgMembership>,
	orgs: &[Organization],
) -> HashSet<OrgId> {
	let deleted_at: HashMap<OrgId, Option<DateTime<Utc>>> =
		orgs.iter().map(|o| (o.id, o.deleted_at)).collect();
	memberships
		.into_iter()
		.filter(|m| match m.deleted_at {
			None => true,
			Some(at) => deleted_at.get(&m.org_id).copied().flatten() == Some(at),
		})
		.map(|m| m.org_id)
		.collect()
}

async fn held_membership_in_lineage(
	conn: &mut SqliteConnection,
	user_id: &UserId,
	org_id: &OrgId,
) -> Result<bool> {
	let memberships =
		MembershipRepository::list_memberships_for_user(conn, user_id, SoftDeleteMode::Include).await?;
	if memberships.is_empty() {
		return Ok(false);
	}
	let edges = OrgRepository::list_hierarchy_edges(conn, SoftDeleteMode::Include).await?;
	let hierarchy = OrgHierarchy::from_edges(edges);
	let lineage = hierarchy.lineage(org_id);
	let orgs = OrgRepository::list_orgs_by_ids(conn, &lineage, SoftDeleteMode::Include).await?;
	let held = memberships_held_at_deletion(memberships, &orgs);
	Ok(lineage.iter().any(|o| held.contains(o)))
}

/// Deleted orgs whose lineage contains an org the user was a member of.
async fn deleted_orgs_in_member_lineage(
	conn: &mut SqliteConnection,
	user_id: &UserId,
) -> Result<Vec<OrgId>> {
	let memberships =
		MembershipRepository::list_memberships_for_user(conn, user_id, SoftDeleteMode::Include).await?;
	if memberships.is_empty() {
		return Ok(Vec::new());
	}
	let edges = OrgRepository::list_hierarchy_edges(conn, SoftDeleteMode::Include).await?;
	let hierarchy = OrgHierarchy::from_edges(edges);
	let orgs = OrgRepository::list_orgs(conn, SoftDeleteMode::Include).await?;
	let member_of = memberships_held_at_deletion(memberships, &orgs);
	if member_of.is_empty() {
		return Ok(Vec::new());
	}

	let deleted = orgs
		.into_iter()
		.filter(|o| o.is_deleted())
		.map(|o| o.id)
		.filter(|id| hierarchy.lineage(id).iter().any(|o| member_of.contains(o)))
		.collect();
	Ok(deleted)
}
