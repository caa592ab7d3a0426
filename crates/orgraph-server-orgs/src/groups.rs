// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashSet;

use chrono::Utc;
use orgraph_server_auth::{Decision, Group, GroupId, OrgId, RequestContext, SoftDeleteMode};
use orgraph_server_db::{GroupRepository, HistoryOperation, OrgRepository};
use serde::{Deserialize, Serialize};

use crate::authz::{group_object, org_object, user_subject, Action, GROUP_TYPE};
use crate::error::{OrgError, Result};
use crate::history::{self, GROUP_ENTITY, ORGANIZATION_ENTITY};
use crate::service::OrgService;
use crate::tuples;
use crate::validation::{resolve_display_name, validate_group_name};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateGroupInput {
	/// Owning organization. Falls back to the caller's organization scope.
	pub owner_id: Option<OrgId>,
	pub name: String,
	pub display_name: Option<String>,
	pub description: Option<String>,
}

impl OrgService {
	#[tracing::instrument(skip(self, ctx, input), fields(user_id = %ctx.user_id()))]
	pub async fn create_group(&self, ctx: &RequestContext, input: CreateGroupInput) -> Result<Group> {
		let owner_id = input
			.owner_id
			.or(ctx.org_scope())
			.ok_or_else(|| OrgError::validation("owner_id", "an owning organization is required"))?;
		self
			.coordinator
			.authorize(ctx, Action::Edit, &org_object(&owner_id))
			.await?;

		validate_group_name(&input.name)?;
		let display_name = resolve_display_name(input.display_name.as_deref(), &input.name)?;

		let mut tx = self.coordinator.begin().await?;
		OrgRepository::get_org_by_id(&mut tx, &owner_id, SoftDeleteMode::Exclude)
			.await?
			.ok_or_else(|| OrgError::not_found(ORGANIZATION_ENTITY))?;

		let group = Group::new(owner_id, input.name, display_name, input.description, ctx.user_id());
		GroupRepository::create_group(&mut tx, &group)
			.await
			.map_err(|e| OrgError::from_db(e, "name"))?;
		history::record(
			&mut tx,
			GROUP_ENTITY,
			group.id,
			HistoryOperation::Create,
			Some(ctx.user_id()),
			&group,
		)
		.await?;

		self
			.coordinator
			.commit(tx, tuples::group_created(&group), GROUP_ENTITY)
			.await?;
		tracing::info!(group_id = %group.id, owner_id = %owner_id, "group created");
		Ok(group)
	}

	#[tracing::instrument(skip(self, ctx), fields(group_id = %group_id))]
	pub async fn get_group_by_id(&self, ctx: &RequestContext, group_id: &GroupId) -> Result<Group> {
		let mut conn = self.pool().acquire().await?;
		let group = GroupRepository::get_group_by_id(&mut conn, group_id, ctx.soft_delete())
			.await?
			.ok_or_else(|| OrgError::not_found(GROUP_ENTITY))?;
		self
			.ensure_visible(
				&mut conn,
				ctx,
				&group_object(&group.id),
				&group.owner_id,
				group.is_deleted(),
			)
			.await?;
		Ok(group)
	}

	#[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id()))]
	pub async fn get_all_groups(&self, ctx: &RequestContext) -> Result<Vec<Group>> {
		let mut conn = self.pool().acquire().await?;
		let groups = GroupRepository::list_groups(&mut conn, ctx.soft_delete()).await?;

		match ctx.decision() {
			Decision::Allow => return Ok(groups),
			Decision::Deny => return Err(OrgError::Unauthorized),
			Decision::Defer => {}
		}

		let ids = self
			.coordinator
			.store()
			.list_objects(&user_subject(&ctx.user_id()), Action::View.relation(), GROUP_TYPE)
			.await?;
		let viewable: HashSet<GroupId> = ids.iter().filter_map(|id| id.parse().ok()).collect();

		// Deleted groups have no tuples left; fall back to org lineage.
		let owner_visible = if ctx.soft_delete().includes_deleted() {
			Some(self.visible_orgs(&mut conn, ctx).await?)
		} else {
			None
		};

		Ok(groups
			.into_iter()
			.filter(|g| {
				viewable.contains(&g.id)
					|| (g.is_deleted()
						&& owner_visible
							.as_ref()
							.is_some_and(|orgs| orgs.contains(&g.owner_id)))
			})
			.collect())
	}

	/// Delete a single group. Returns the deleted id.
	#[tracing::instrument(skip(self, ctx), fields(group_id = %group_id))]
	pub async fn delete_group(&self, ctx: &RequestContext, group_id: &GroupId) -> Result<GroupId> {
		self
			.coordinator
			.authorize(ctx, Action::Delete, &group_object(group_id))
			.await?;

		let mut tx = self.coordinator.begin().await?;
		let mut group = GroupRepository::get_group_by_id(&mut tx, group_id, SoftDeleteMode::Exclude)
			.await?
			.ok_or_else(|| OrgError::not_found(GROUP_ENTITY))?;

		let at = Utc::now();
		GroupRepository::soft_delete_groups(&mut tx, &[group.id], at).await?;
		group.deleted_at = Some(at);
		history::record(
			&mut tx,
			GROUP_ENTITY,
			group.id,
			HistoryOperation::Delete,
			Some(ctx.user_id()),
			&group,
		)
		.await?;

		self
			.coordinator
			.commit(tx, tuples::group_deleted(&group), GROUP_ENTITY)
			.await?;
		tracing::info!("group deleted");
		Ok(group.id)
	}
}
