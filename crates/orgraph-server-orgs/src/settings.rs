// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::Utc;
use orgraph_server_auth::{
	OrgId, OrgSettingId, OrganizationSetting, OrganizationSettingFields, RequestContext,
	SoftDeleteMode, UserSetting, UserSettingId,
};
use orgraph_server_db::{
	HistoryOperation, MembershipRepository, OrgRepository, OrgSettingRepository, UserRepository,
};
use serde::{Deserialize, Serialize};

use crate::authz::{org_object, user_setting_object, Action};
use crate::error::{OrgError, Result};
use crate::history::{self, ORG_SETTING_ENTITY, USER_SETTING_ENTITY};
use crate::service::OrgService;
use crate::tuples::TupleDelta;
use crate::validation::validate_domains;

/// Partial update of an organization setting. `None` leaves a field as is;
/// list fields are replaced, not merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrganizationSettingInput {
	pub domains: Option<Vec<String>>,
	pub billing_contact: Option<String>,
	pub billing_email: Option<String>,
	pub billing_phone: Option<String>,
	pub billing_address: Option<String>,
	pub tax_identifier: Option<String>,
	pub tags: Option<Vec<String>>,
}

impl UpdateOrganizationSettingInput {
	pub fn apply(&self, fields: &mut OrganizationSettingFields) {
		if let Some(domains) = &self.domains {
			fields.domains = domains.clone();
		}
		if let Some(v) = &self.billing_contact {
			fields.billing_contact = Some(v.clone());
		}
		if let Some(v) = &self.billing_email {
			fields.billing_email = Some(v.clone());
		}
		if let Some(v) = &self.billing_phone {
			fields.billing_phone = Some(v.clone());
		}
		if let Some(v) = &self.billing_address {
			fields.billing_address = Some(v.clone());
		}
		if let Some(v) = &self.tax_identifier {
			fields.tax_identifier = Some(v.clone());
		}
		if let Some(tags) = &self.tags {
			fields.tags = tags.clone();
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserSettingInput {
	pub default_org_id: Option<OrgId>,
	pub tags: Option<Vec<String>>,
}

impl OrgService {
	#[tracing::instrument(skip(self, ctx), fields(setting_id = %setting_id, user_id = %ctx.user_id()))]
	pub async fn get_organization_setting_by_id(
		&self,
		ctx: &RequestContext,
		setting_id: &OrgSettingId,
	) -> Result<OrganizationSetting> {
		let mut conn = self.pool().acquire().await?;
		let setting = OrgSettingRepository::get_setting_by_id(&mut conn, setting_id, ctx.soft_delete())
			.await?
			.ok_or_else(|| OrgError::not_found(ORG_SETTING_ENTITY))?;
		self
			.ensure_visible(
				&mut conn,
				ctx,
				&org_object(&setting.org_id),
				&setting.org_id,
				setting.deleted_at.is_some(),
			)
			.await?;
		Ok(setting)
	}

	#[tracing::instrument(skip(self, ctx, input), fields(setting_id = %setting_id, user_id = %ctx.user_id()))]
	pub async fn update_organization_setting(
		&self,
		ctx: &RequestContext,
		setting_id: &OrgSettingId,
		input: UpdateOrganizationSettingInput,
	) -> Result<OrganizationSetting> {
		let target = {
			let mut conn = self.pool().acquire().await?;
			OrgSettingRepository::get_setting_by_id(&mut conn, setting_id, SoftDeleteMode::Exclude)
				.await?
				.ok_or_else(|| OrgError::not_found(ORG_SETTING_ENTITY))?
		};
		self
			.coordinator
			.authorize(ctx, Action::Edit, &org_object(&target.org_id))
			.await?;
		if let Some(domains) = &input.domains {
			validate_domains(domains)?;
		}

		let mut tx = self.coordinator.begin().await?;
		let mut setting = OrgSettingRepository::get_setting_for_update(&mut tx, setting_id)
			.await?
			.ok_or_else(|| OrgError::not_found(ORG_SETTING_ENTITY))?;
		input.apply(&mut setting.fields);
		setting.updated_at = Utc::now();

		OrgSettingRepository::update_setting(&mut tx, &setting).await?;
		history::record(
			&mut tx,
			ORG_SETTING_ENTITY,
			setting.id,
			HistoryOperation::Update,
			Some(ctx.user_id()),
			&setting,
		)
		.await?;
		self
			.coordinator
			.commit(tx, TupleDelta::new(), ORG_SETTING_ENTITY)
			.await?;

		tracing::debug!(org_id = %setting.org_id, "organization setting updated");
		Ok(setting)
	}

	#[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id()))]
	pub async fn get_all_organization_settings(
		&self,
		ctx: &RequestContext,
	) -> Result<Vec<OrganizationSetting>> {
		let mut conn = self.pool().acquire().await?;
		let visible = self.visible_orgs(&mut conn, ctx).await?;
		let settings = OrgSettingRepository::list_settings(&mut conn, ctx.soft_delete()).await?;
		Ok(settings
			.into_iter()
			.filter(|s| visible.contains(&s.org_id))
			.collect())
	}

	#[tracing::instrument(skip(self, ctx), fields(setting_id = %setting_id, user_id = %ctx.user_id()))]
	pub async fn get_user_setting_by_id(
		&self,
		ctx: &RequestContext,
		setting_id: &UserSettingId,
	) -> Result<UserSetting> {
		let mut conn = self.pool().acquire().await?;
		let setting = UserRepository::get_user_setting_by_id(&mut conn, setting_id)
			.await?
			.ok_or_else(|| OrgError::not_found(USER_SETTING_ENTITY))?;
		self
			.coordinator
			.authorize(ctx, Action::View, &user_setting_object(&setting.id))
			.await?;
		Ok(setting)
	}

	/// Update a user setting. A new default organization must be active and
	/// the user must belong to it.
	#[tracing::instrument(skip(self, ctx, input), fields(setting_id = %setting_id, user_id = %ctx.user_id()))]
	pub async fn update_user_setting(
		&self,
		ctx: &RequestContext,
		setting_id: &UserSettingId,
		input: UpdateUserSettingInput,
	) -> Result<UserSetting> {
		self
			.coordinator
			.authorize(ctx, Action::Edit, &user_setting_object(setting_id))
			.await?;

		let at = Utc::now();
		let mut tx = self.coordinator.begin().await?;
		let mut setting = UserRepository::get_user_setting_by_id(&mut tx, setting_id)
			.await?
			.ok_or_else(|| OrgError::not_found(USER_SETTING_ENTITY))?;

		if let Some(org_id) = input.default_org_id {
			OrgRepository::get_org_by_id(&mut tx, &org_id, SoftDeleteMode::Exclude)
				.await?
				.ok_or_else(|| OrgError::not_found("organization"))?;
			MembershipRepository::get_membership(&mut tx, &org_id, &setting.user_id)
				.await?
				.ok_or_else(|| {
					OrgError::validation("default_org_id", "user is not a member of the organization")
				})?;
			UserRepository::update_default_org(&mut tx, &setting.id, Some(org_id), at).await?;
			setting.default_org_id = Some(org_id);
		}
		if let Some(tags) = &input.tags {
			UserRepository::update_tags(&mut tx, &setting.id, tags, at).await?;
			setting.tags = tags.clone();
		}
		setting.updated_at = at;

		history::record(
			&mut tx,
			USER_SETTING_ENTITY,
			setting.id,
			HistoryOperation::Update,
			Some(ctx.user_id()),
			&setting,
		)
		.await?;
		self
			.coordinator
			.commit(tx, TupleDelta::new(), USER_SETTING_ENTITY)
			.await?;
		Ok(setting)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn update_replaces_lists_and_keeps_unset_fields() {
		let mut fields = OrganizationSettingFields {
			domains: vec!["old.io".into()],
			billing_email: Some("billing@old.io".into()),
			..OrganizationSettingFields::default()
		};
		let update = UpdateOrganizationSettingInput {
			domains: Some(vec!["a.io".into(), "b.io".into()]),
			tax_identifier: Some("TX-1".into()),
			..UpdateOrganizationSettingInput::default()
		};
		update.apply(&mut fields);

		assert_eq!(fields.domains, vec!["a.io".to_string(), "b.io".to_string()]);
		assert_eq!(fields.billing_email.as_deref(), Some("billing@old.io"));
		assert_eq!(fields.tax_identifier.as_deref(), Some("TX-1"));
	}
}
