// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hierarchy cascade engine.
//!
//! Deleting an organization soft-deletes the organization, every descendant,
//! and everything they own (memberships, settings, groups) in one relational
//! transaction, then deletes the relationship tuples referencing them.
//!
//! Unlike single-entity mutations, the relational side commits first and is
//! never rolled back. Tuple deletions are persisted in the reconciliation
//! ledger inside the same transaction; a deletion failure leaves ledger rows
//! behind and surfaces as [`OrgError::CascadeIncomplete`].

use chrono::Utc;
use orgraph_server_auth::{GroupId, OrgId, RequestContext, SoftDeleteMode};
use orgraph_server_db::{
	GroupRepository, HistoryOperation, MembershipRepository, OrgRepository, OrgSettingRepository,
	ReconciliationRepository, TupleKey,
};
use serde::Serialize;

use crate::authz::{org_object, Action};
use crate::coordinator::MutationCoordinator;
use crate::default_org::{reassign_after_delete, Reassignment};
use crate::error::{OrgError, Result};
use crate::hierarchy::OrgHierarchy;
use crate::history::{
	self, GROUP_ENTITY, MEMBERSHIP_ENTITY, ORGANIZATION_ENTITY, ORG_SETTING_ENTITY,
};
use crate::reconcile::drain;
use crate::tuples::{cascade_deletions, ledger_key};

/// Everything a committed cascade touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeOutcome {
	pub root_id: OrgId,
	pub orgs: Vec<OrgId>,
	pub groups: Vec<GroupId>,
	pub memberships: usize,
	pub reassignments: Vec<Reassignment>,
	pub tuples_deleted: usize,
}

#[derive(Clone)]
pub struct CascadeEngine {
	coordinator: MutationCoordinator,
}

impl CascadeEngine {
	pub fn new(coordinator: MutationCoordinator) -> Self {
		Self { coordinator }
	}

	/// Delete `org_id` and its closure.
	///
	/// # Errors
	/// - `Unauthorized` if the caller may not delete the organization
	/// - `NotFound` if it is missing or already deleted
	/// - `ForbiddenOperation` for personal organizations
	/// - `CascadeIncomplete` if the relational delete committed but some
	///   tuple deletions are still pending
	#[tracing::instrument(skip(self, ctx), fields(org_id = %org_id, user_id = %ctx.user_id()))]
	pub async fn delete_organization(&self, ctx: &RequestContext, org_id: &OrgId) -> Result<CascadeOutcome> {
		self
			.coordinator
			.authorize(ctx, Action::Delete, &org_object(org_id))
			.await?;

		let mut tx = self.coordinator.begin().await?;
		let org = OrgRepository::get_org_by_id(&mut tx, org_id, SoftDeleteMode::Exclude)
			.await?
			.ok_or_else(|| OrgError::not_found(ORGANIZATION_ENTITY))?;
		if org.is_personal {
			return Err(OrgError::ForbiddenOperation(
				"cannot delete personal organizations".to_string(),
			));
		}

		let edges = OrgRepository::list_hierarchy_edges(&mut tx, SoftDeleteMode::Exclude).await?;
		let closure = OrgHierarchy::from_edges(edges).closure(org_id);

		let orgs = OrgRepository::list_orgs_by_ids(&mut tx, &closure, SoftDeleteMode::Exclude).await?;
		let memberships =
			MembershipRepository::list_memberships_for_orgs(&mut tx, &closure, SoftDeleteMode::Exclude)
				.await?;
		let groups = GroupRepository::list_groups_for_orgs(&mut tx, &closure, SoftDeleteMode::Exclude)
			.await?;
		let settings = OrgSettingRepository::list_settings_for_orgs(&mut tx, &closure).await?;
		let keys: Vec<TupleKey> = cascade_deletions(&orgs, &memberships, &groups)
			.iter()
			.map(ledger_key)
			.collect();

		let actor = ctx.user_id();
		let at = Utc::now();
		let group_ids: Vec<GroupId> = groups.iter().map(|g| g.id).collect();

		OrgRepository::soft_delete_orgs(&mut tx, &closure, &actor, at).await?;
		MembershipRepository::soft_delete_memberships_for_orgs(&mut tx, &closure, at).await?;
		OrgSettingRepository::soft_delete_settings_for_orgs(&mut tx, &closure, at).await?;
		GroupRepository::soft_delete_groups(&mut tx, &group_ids, at).await?;

		for mut deleted in orgs {
			deleted.deleted_at = Some(at);
			deleted.deleted_by = Some(actor);
			history::record(
				&mut tx,
				ORGANIZATION_ENTITY,
				deleted.id,
				HistoryOperation::Delete,
				Some(actor),
				&deleted,
			)
			.await?;
		}
		for mut deleted in memberships.iter().cloned() {
			deleted.deleted_at = Some(at);
			history::record(
				&mut tx,
				MEMBERSHIP_ENTITY,
				deleted.id,
				HistoryOperation::Delete,
				Some(actor),
				&deleted,
			)
			.await?;
		}
		for mut deleted in settings {
			deleted.deleted_at = Some(at);
			deleted.updated_at = at;
			history::record(
				&mut tx,
				ORG_SETTING_ENTITY,
				deleted.id,
				HistoryOperation::Delete,
				Some(actor),
				&deleted,
			)
			.await?;
		}
		for mut deleted in groups {
			deleted.deleted_at = Some(at);
			history::record(
				&mut tx,
				GROUP_ENTITY,
				deleted.id,
				HistoryOperation::Delete,
				Some(actor),
				&deleted,
			)
			.await?;
		}

		let reassignments = reassign_after_delete(&mut tx, &closure, Some(actor), at).await?;
		ReconciliationRepository::enqueue(&mut tx, org_id, &keys, at).await?;
		tx.commit().await?;

		tracing::info!(
			orgs = closure.len(),
			groups = group_ids.len(),
			memberships = memberships.len(),
			reassigned = reassignments.len(),
			tuples = keys.len(),
			"organization cascade committed"
		);

		let tuples_deleted = self.delete_pending_tuples(org_id).await?;

		Ok(CascadeOutcome {
			root_id: *org_id,
			orgs: closure,
			groups: group_ids,
			memberships: memberships.len(),
			reassignments,
			tuples_deleted,
		})
	}

	/// Delete the ledgered tuples of the cascade rooted at `org_id`.
	async fn delete_pending_tuples(&self, org_id: &OrgId) -> Result<usize> {
		let mut conn = self.coordinator.pool().acquire().await?;
		let pending = ReconciliationRepository::list_pending_for_root(&mut conn, org_id).await?;
		let outcome = drain(
			&mut conn,
			self.coordinator.store().as_ref(),
			&pending,
			self.coordinator.max_tuples_per_write(),
		)
		.await?;

		if outcome.failed > 0 {
			tracing::warn!(
				org_id = %org_id,
				pending = outcome.failed,
				"cascade left authorization tuples pending reconciliation"
			);
			return Err(OrgError::CascadeIncomplete {
				org_id: *org_id,
				pending: outcome.failed,
			});
		}
		Ok(outcome.reconciled)
	}
}
