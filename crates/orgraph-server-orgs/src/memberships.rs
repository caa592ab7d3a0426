// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::Utc;
use orgraph_server_auth::{
	MembershipId, OrgId, OrgMembership, OrgRole, RequestContext, SoftDeleteMode, UserId,
};
use orgraph_server_db::{HistoryOperation, MembershipRepository, OrgRepository};
use serde::{Deserialize, Serialize};

use crate::authz::{org_object, Action};
use crate::default_org::reassign_after_membership_removal;
use crate::error::{OrgError, Result};
use crate::history::{self, MEMBERSHIP_ENTITY, ORGANIZATION_ENTITY};
use crate::service::OrgService;
use crate::tuples;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrgMembershipInput {
	pub org_id: OrgId,
	pub user_id: UserId,
	/// Defaults to `member`.
	pub role: Option<OrgRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrgMembershipInput {
	pub role: OrgRole,
}

fn owner_forbidden(action: &str) -> OrgError {
	OrgError::ForbiddenOperation(format!("cannot {action} the organization owner membership"))
}

/// The row no longer matches the copy the change was computed from; the
/// caller may retry.
fn changed_concurrently() -> OrgError {
	OrgError::TransientStore("membership was modified concurrently".to_string())
}

impl OrgService {
	#[tracing::instrument(skip(self, ctx, input), fields(org_id = %input.org_id, member_id = %input.user_id))]
	pub async fn create_org_membership(
		&self,
		ctx: &RequestContext,
		input: CreateOrgMembershipInput,
	) -> Result<OrgMembership> {
		self
			.coordinator
			.authorize(ctx, Action::Edit, &org_object(&input.org_id))
			.await?;

		let role = input.role.unwrap_or(OrgRole::Member);
		if role == OrgRole::Owner {
			return Err(owner_forbidden("create"));
		}

		let mut tx = self.coordinator.begin().await?;
		OrgRepository::get_org_by_id(&mut tx, &input.org_id, SoftDeleteMode::Exclude)
			.await?
			.ok_or_else(|| OrgError::not_found(ORGANIZATION_ENTITY))?;
		self.ensure_user_exists(&mut tx, &input.user_id).await?;

		let membership = OrgMembership::new(input.org_id, input.user_id, role);
		MembershipRepository::create_membership(&mut tx, &membership)
			.await
			.map_err(|e| OrgError::from_db(e, "user_id"))?;
		history::record(
			&mut tx,
			MEMBERSHIP_ENTITY,
			membership.id,
			HistoryOperation::Create,
			Some(ctx.user_id()),
			&membership,
		)
		.await?;

		self
			.coordinator
			.commit(tx, tuples::membership_created(&membership), MEMBERSHIP_ENTITY)
			.await?;
		tracing::info!(membership_id = %membership.id, role = %role, "membership created");
		Ok(membership)
	}

	/// Change a member's role. The owner's role is fixed, and no one can be
	/// promoted to owner.
	#[tracing::instrument(skip(self, ctx, input), fields(membership_id = %membership_id, role = %input.role))]
	pub async fn update_org_membership(
		&self,
		ctx: &RequestContext,
		membership_id: &MembershipId,
		input: UpdateOrgMembershipInput,
	) -> Result<OrgMembership> {
		let target = self.load_active_membership(membership_id).await?;
		self
			.coordinator
			.authorize(ctx, Action::Edit, &org_object(&target.org_id))
			.await?;
		if input.role == OrgRole::Owner {
			return Err(owner_forbidden("create"));
		}

		let at = Utc::now();
		let mut tx = self.coordinator.begin().await?;
		let existing = MembershipRepository::get_membership_for_update(&mut tx, membership_id)
			.await?
			.ok_or_else(|| OrgError::not_found(MEMBERSHIP_ENTITY))?;
		if existing.is_owner() {
			return Err(owner_forbidden("change"));
		}
		let delta = tuples::role_changed(&existing, input.role);
		if !MembershipRepository::update_membership_role(&mut tx, &existing, input.role, at).await? {
			return Err(changed_concurrently());
		}
		let updated = OrgMembership {
			role: input.role,
			updated_at: at,
			..existing
		};
		history::record(
			&mut tx,
			MEMBERSHIP_ENTITY,
			updated.id,
			HistoryOperation::Update,
			Some(ctx.user_id()),
			&updated,
		)
		.await?;

		self.coordinator.commit(tx, delta, MEMBERSHIP_ENTITY).await?;
		tracing::info!("membership role changed");
		Ok(updated)
	}

	/// Remove a membership. Returns the removed id.
	#[tracing::instrument(skip(self, ctx), fields(membership_id = %membership_id))]
	pub async fn delete_org_membership(
		&self,
		ctx: &RequestContext,
		membership_id: &MembershipId,
	) -> Result<MembershipId> {
		let target = self.load_active_membership(membership_id).await?;
		self
			.coordinator
			.authorize(ctx, Action::Edit, &org_object(&target.org_id))
			.await?;

		let at = Utc::now();
		let mut tx = self.coordinator.begin().await?;
		let mut membership = MembershipRepository::get_membership_for_update(&mut tx, membership_id)
			.await?
			.ok_or_else(|| OrgError::not_found(MEMBERSHIP_ENTITY))?;
		if membership.is_owner() {
			return Err(owner_forbidden("delete"));
		}
		let delta = tuples::membership_deleted(&membership);
		if !MembershipRepository::soft_delete_membership(&mut tx, &membership, at).await? {
			return Err(changed_concurrently());
		}
		membership.deleted_at = Some(at);
		history::record(
			&mut tx,
			MEMBERSHIP_ENTITY,
			membership.id,
			HistoryOperation::Delete,
			Some(ctx.user_id()),
			&membership,
		)
		.await?;
		reassign_after_membership_removal(
			&mut tx,
			&membership.user_id,
			&membership.org_id,
			Some(ctx.user_id()),
			at,
		)
		.await?;

		self.coordinator.commit(tx, delta, MEMBERSHIP_ENTITY).await?;
		tracing::info!("membership deleted");
		Ok(membership.id)
	}

	#[tracing::instrument(skip(self, ctx), fields(membership_id = %membership_id))]
	pub async fn get_org_membership_by_id(
		&self,
		ctx: &RequestContext,
		membership_id: &MembershipId,
	) -> Result<OrgMembership> {
		let mut conn = self.pool().acquire().await?;
		let membership =
			MembershipRepository::get_membership_by_id(&mut conn, membership_id, ctx.soft_delete())
				.await?
				.ok_or_else(|| OrgError::not_found(MEMBERSHIP_ENTITY))?;
		self
			.ensure_visible(
				&mut conn,
				ctx,
				&org_object(&membership.org_id),
				&membership.org_id,
				membership.is_deleted(),
			)
			.await?;
		Ok(membership)
	}

	/// Members of an organization the caller can see.
	#[tracing::instrument(skip(self, ctx), fields(org_id = %org_id))]
	pub async fn get_all_org_memberships(
		&self,
		ctx: &RequestContext,
		org_id: &OrgId,
	) -> Result<Vec<OrgMembership>> {
		let mut conn = self.pool().acquire().await?;
		let org = OrgRepository::get_org_by_id(&mut conn, org_id, ctx.soft_delete())
			.await?
			.ok_or_else(|| OrgError::not_found(ORGANIZATION_ENTITY))?;
		self
			.ensure_visible(&mut conn, ctx, &org_object(&org.id), &org.id, org.is_deleted())
			.await?;
		Ok(MembershipRepository::list_memberships_for_org(&mut conn, org_id, ctx.soft_delete()).await?)
	}

	async fn load_active_membership(&self, membership_id: &MembershipId) -> Result<OrgMembership> {
		let mut conn = self.pool().acquire().await?;
		MembershipRepository::get_membership_by_id(&mut conn, membership_id, SoftDeleteMode::Exclude)
			.await?
			.ok_or_else(|| OrgError::not_found(MEMBERSHIP_ENTITY))
	}
}
