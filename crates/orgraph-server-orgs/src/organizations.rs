// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::Utc;
use orgraph_server_auth::{
	OrgId, OrgMembership, OrgRole, Organization, OrganizationSetting, OrganizationSettingFields,
	RequestContext, SoftDeleteMode, UserId, UserSetting,
};
use orgraph_server_db::{
	HistoryOperation, MembershipRepository, OrgRepository, OrgSettingRepository, UserRepository,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::authz::{org_object, Action};
use crate::default_org::reassign_after_membership_removal;
use crate::error::{OrgError, Result};
use crate::history::{
	self, MEMBERSHIP_ENTITY, ORGANIZATION_ENTITY, ORG_SETTING_ENTITY, USER_SETTING_ENTITY,
};
use crate::service::OrgService;
use crate::settings::UpdateOrganizationSettingInput;
use crate::tuples::{self, TupleDelta};
use crate::validation::{resolve_display_name, validate_domains, validate_name};

pub type CreateOrganizationSettingInput = OrganizationSettingFields;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrganizationInput {
	pub name: String,
	pub display_name: Option<String>,
	pub description: Option<String>,
	pub parent_id: Option<OrgId>,
	pub settings: Option<CreateOrganizationSettingInput>,
}

impl CreateOrganizationInput {
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOrgMemberInput {
	pub user_id: UserId,
	pub role: OrgRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrganizationInput {
	pub name: Option<String>,
	pub display_name: Option<String>,
	pub description: Option<String>,
	#[serde(default)]
	pub add_members: Vec<AddOrgMemberInput>,
	#[serde(default)]
	pub remove_members: Vec<UserId>,
	pub update_settings: Option<UpdateOrganizationSettingInput>,
}

/// An organization with its setting and members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationView {
	pub organization: Organization,
	pub setting: Option<OrganizationSetting>,
	pub members: Vec<OrgMembership>,
}

impl OrgService {
	/// Create an organization owned by the caller.
	///
	/// The first root organization a user creates becomes their default.
	#[tracing::instrument(skip(self, ctx, input), fields(user_id = %ctx.user_id(), parent_id = ?input.parent_id))]
	pub async fn create_organization(
		&self,
		ctx: &RequestContext,
		input: CreateOrganizationInput,
	) -> Result<OrganizationView> {
		if let Some(parent_id) = &input.parent_id {
			self
				.coordinator
				.authorize(ctx, Action::Edit, &org_object(parent_id))
				.await?;
		}

		validate_name(&input.name)?;
		let display_name = resolve_display_name(input.display_name.as_deref(), &input.name)?;
		let fields = input.settings.unwrap_or_default();
		validate_domains(&fields.domains)?;

		let user_id = ctx.user_id();
		let mut tx = self.coordinator.begin().await?;
		self.ensure_user_exists(&mut tx, &user_id).await?;

		if let Some(parent_id) = &input.parent_id {
			let parent = OrgRepository::get_org_by_id(&mut tx, parent_id, SoftDeleteMode::Exclude)
				.await?
				.ok_or_else(|| OrgError::not_found("parent organization"))?;
			if parent.is_personal {
				return Err(OrgError::InvalidHierarchy(
					"personal organizations are not allowed to have child organizations".to_string(),
				));
			}
		}

		let org = Organization::new(
			input.name,
			display_name,
			input.description,
			input.parent_id,
			user_id,
		);
		OrgRepository::create_org(&mut tx, &org)
			.await
			.map_err(|e| OrgError::from_db(e, "name"))?;

		let owner = OrgMembership::new(org.id, user_id, OrgRole::Owner);
		MembershipRepository::create_membership(&mut tx, &owner).await?;

		let setting = OrganizationSetting::new(org.id, fields);
		OrgSettingRepository::create_setting(&mut tx, &setting).await?;

		history::record(
			&mut tx,
			ORGANIZATION_ENTITY,
			org.id,
			HistoryOperation::Create,
			Some(user_id),
			&org,
		)
		.await?;
		history::record(
			&mut tx,
			MEMBERSHIP_ENTITY,
			owner.id,
			HistoryOperation::Create,
			Some(user_id),
			&owner,
		)
		.await?;
		history::record(
			&mut tx,
			ORG_SETTING_ENTITY,
			setting.id,
			HistoryOperation::Create,
			Some(user_id),
			&setting,
		)
		.await?;

		let mut delta = tuples::org_created(&org, &owner);
		if org.is_root() {
			delta = delta.merge(promote_to_default(&mut tx, &user_id, &org.id).await?);
		}

		self.coordinator.commit(tx, delta, ORGANIZATION_ENTITY).await?;
		tracing::info!(org_id = %org.id, "organization created");

		Ok(OrganizationView {
			organization: org,
			setting: Some(setting),
			members: vec![owner],
		})
	}

	#[tracing::instrument(skip(self, ctx, input), fields(org_id = %org_id, user_id = %ctx.user_id()))]
	pub async fn update_organization(
		&self,
		ctx: &RequestContext,
		org_id: &OrgId,
		input: UpdateOrganizationInput,
	) -> Result<OrganizationView> {
		self
			.coordinator
			.authorize(ctx, Action::Edit, &org_object(org_id))
			.await?;

		if let Some(name) = &input.name {
			validate_name(name)?;
		}
		if let Some(settings) = &input.update_settings {
			if let Some(domains) = &settings.domains {
				validate_domains(domains)?;
			}
		}
		if input.add_members.iter().any(|m| m.role == OrgRole::Owner) {
			return Err(OrgError::ForbiddenOperation(
				"an organization can only have one owner".to_string(),
			));
		}

		let actor = ctx.user_id();
		let at = Utc::now();
		let mut tx = self.coordinator.begin().await?;
		let mut org = OrgRepository::get_org_by_id(&mut tx, org_id, SoftDeleteMode::Exclude)
			.await?
			.ok_or_else(|| OrgError::not_found(ORGANIZATION_ENTITY))?;

		let mut delta = TupleDelta::new();

		if input.name.is_some() || input.display_name.is_some() || input.description.is_some() {
			if let Some(name) = input.name {
				org.name = name;
			}
			if let Some(display_name) = input.display_name.as_deref() {
				org.display_name = resolve_display_name(Some(display_name), &org.name)?;
			}
			if let Some(description) = input.description {
				org.description = Some(description);
			}
			org.updated_at = at;
			OrgRepository::update_org(&mut tx, &org)
				.await
				.map_err(|e| OrgError::from_db(e, "name"))?;
			history::record(
				&mut tx,
				ORGANIZATION_ENTITY,
				org.id,
				HistoryOperation::Update,
				Some(actor),
				&org,
			)
			.await?;
		}

		for member in &input.add_members {
			self.ensure_user_exists(&mut tx, &member.user_id).await?;
			let membership = OrgMembership::new(org.id, member.user_id, member.role);
			MembershipRepository::create_membership(&mut tx, &membership)
				.await
				.map_err(|e| OrgError::from_db(e, "user_id"))?;
			history::record(
				&mut tx,
				MEMBERSHIP_ENTITY,
				membership.id,
				HistoryOperation::Create,
				Some(actor),
				&membership,
			)
			.await?;
			delta = delta.merge(tuples::membership_created(&membership));
		}

		for user_id in &input.remove_members {
			let mut membership = MembershipRepository::get_membership(&mut tx, &org.id, user_id)
				.await?
				.ok_or_else(|| OrgError::not_found("organization membership"))?;
			if membership.is_owner() {
				return Err(OrgError::ForbiddenOperation(
					"the organization owner cannot be removed".to_string(),
				));
			}
			if !MembershipRepository::soft_delete_membership(&mut tx, &membership, at).await? {
				return Err(OrgError::TransientStore(
					"membership was modified concurrently".to_string(),
				));
			}
			membership.deleted_at = Some(at);
			history::record(
				&mut tx,
				MEMBERSHIP_ENTITY,
				membership.id,
				HistoryOperation::Delete,
				Some(actor),
				&membership,
			)
			.await?;
			reassign_after_membership_removal(&mut tx, user_id, &org.id, Some(actor), at).await?;
			delta = delta.merge(tuples::membership_deleted(&membership));
		}

		if let Some(update) = &input.update_settings {
			upsert_setting(&mut tx, &org.id, update, actor).await?;
		}

		self.coordinator.commit(tx, delta, ORGANIZATION_ENTITY).await?;
		tracing::info!(org_id = %org.id, "organization updated");

		let mut conn = self.pool().acquire().await?;
		load_view(&mut conn, org, SoftDeleteMode::Exclude).await
	}

	/// Delete an organization and everything beneath it.
	///
	/// Returns the deleted id. A `CascadeIncomplete` error means the
	/// organization is deleted but some authorization tuples are still
	/// pending reconciliation.
	pub async fn delete_organization(&self, ctx: &RequestContext, org_id: &OrgId) -> Result<OrgId> {
		let outcome = self.cascade.delete_organization(ctx, org_id).await?;
		Ok(outcome.root_id)
	}

	#[tracing::instrument(skip(self, ctx), fields(org_id = %org_id, user_id = %ctx.user_id()))]
	pub async fn get_organization_by_id(
		&self,
		ctx: &RequestContext,
		org_id: &OrgId,
	) -> Result<OrganizationView> {
		let mut conn = self.pool().acquire().await?;
		let org = OrgRepository::get_org_by_id(&mut conn, org_id, ctx.soft_delete())
			.await?
			.ok_or_else(|| OrgError::not_found(ORGANIZATION_ENTITY))?;
		self
			.ensure_visible(&mut conn, ctx, &org_object(&org.id), &org.id, org.is_deleted())
			.await?;
		load_view(&mut conn, org, ctx.soft_delete()).await
	}

	#[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id()))]
	pub async fn get_all_organizations(&self, ctx: &RequestContext) -> Result<Vec<Organization>> {
		let mut conn = self.pool().acquire().await?;
		let visible = self.visible_orgs(&mut conn, ctx).await?;
		let orgs = OrgRepository::list_orgs(&mut conn, ctx.soft_delete()).await?;
		Ok(orgs.into_iter().filter(|o| visible.contains(&o.id)).collect())
	}
}

async fn load_view(
	conn: &mut SqliteConnection,
	organization: Organization,
	mode: SoftDeleteMode,
) -> Result<OrganizationView> {
	let setting = OrgSettingRepository::get_setting_for_org(conn, &organization.id, mode).await?;
	let members = MembershipRepository::list_memberships_for_org(conn, &organization.id, mode).await?;
	Ok(OrganizationView {
		organization,
		setting,
		members,
	})
}

/// Make `org_id` the user's default if they have none.
///
/// Returns the tuple delta for a newly created user setting.
async fn promote_to_default(
	conn: &mut SqliteConnection,
	user_id: &UserId,
	org_id: &OrgId,
) -> Result<TupleDelta> {
	let at = Utc::now();
	match UserRepository::get_user_setting_for_user(conn, user_id).await? {
		Some(setting) if setting.default_org_id.is_some() => Ok(TupleDelta::new()),
		Some(setting) => {
			UserRepository::update_default_org(conn, &setting.id, Some(*org_id), at).await?;
			let updated = UserSetting {
				default_org_id: Some(*org_id),
				updated_at: at,
				..setting
			};
			history::record(
				conn,
				USER_SETTING_ENTITY,
				updated.id,
				HistoryOperation::Update,
				Some(*user_id),
				&updated,
			)
			.await?;
			tracing::info!(user_id = %user_id, org_id = %org_id, "default organization set");
			Ok(TupleDelta::new())
		}
		None => {
			let mut setting = UserSetting::new(*user_id);
			setting.default_org_id = Some(*org_id);
			UserRepository::create_user_setting(conn, &setting).await?;
			history::record(
				conn,
				USER_SETTING_ENTITY,
				setting.id,
				HistoryOperation::Create,
				Some(*user_id),
				&setting,
			)
			.await?;
			tracing::info!(user_id = %user_id, org_id = %org_id, "default organization set");
			Ok(tuples::user_setting_created(&setting))
		}
	}
}

/// Apply `update` to the org's setting, creating the setting if missing.
pub(crate) async fn upsert_setting(
	conn: &mut SqliteConnection,
	org_id: &OrgId,
	update: &UpdateOrganizationSettingInput,
	actor: UserId,
) -> Result<OrganizationSetting> {
	match OrgSettingRepository::get_setting_for_org(conn, org_id, SoftDeleteMode::Exclude).await? {
		Some(mut setting) => {
			update.apply(&mut setting.fields);
			setting.updated_at = Utc::now();
			OrgSettingRepository::update_setting(conn, &setting).await?;
			history::record(
				conn,
				ORG_SETTING_ENTITY,
				setting.id,
				HistoryOperation::Update,
				Some(actor),
				&setting,
			)
			.await?;
			Ok(setting)
		}
		None => {
			let mut fields = OrganizationSettingFields::default();
			update.apply(&mut fields);
			let setting = OrganizationSetting::new(*org_id, fields);
			OrgSettingRepository::create_setting(conn, &setting).await?;
			history::record(
				conn,
				ORG_SETTING_ENTITY,
				setting.id,
				HistoryOperation::Create,
				Some(actor),
				&setting,
			)
			.await?;
			Ok(setting)
		}
	}
}
