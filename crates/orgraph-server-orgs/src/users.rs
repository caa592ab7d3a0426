// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use orgraph_server_auth::{
	OrgMembership, OrgRole, Organization, OrganizationSetting, OrganizationSettingFields, User,
	UserSetting,
};
use orgraph_server_db::{
	HistoryOperation, MembershipRepository, OrgRepository, OrgSettingRepository, UserRepository,
};
use serde::{Deserialize, Serialize};

use crate::error::{OrgError, Result};
use crate::history::{
	self, MEMBERSHIP_ENTITY, ORGANIZATION_ENTITY, ORG_SETTING_ENTITY, USER_ENTITY, USER_SETTING_ENTITY,
};
use crate::service::OrgService;
use crate::tuples;
use crate::validation::resolve_display_name;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUserInput {
	pub display_name: String,
	pub email: String,
}

/// A newly registered user and the resources created with them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredUser {
	pub user: User,
	pub personal_org: Organization,
	pub user_setting: UserSetting,
}

impl OrgService {
	/// Register a user along with their personal organization and settings.
	///
	/// This runs on behalf of the system, not a caller, so no authorization
	/// check applies.
	#[tracing::instrument(skip(self, input))]
	pub async fn register_user(&self, input: RegisterUserInput) -> Result<RegisteredUser> {
		let email = input.email.trim().to_string();
		if email.is_empty() || !email.contains('@') {
			return Err(OrgError::validation("email", "value is not a valid email address"));
		}
		let display_name = resolve_display_name(Some(&input.display_name), &email)?;

		let user = User::new(display_name.clone(), email);
		let personal_org = Organization::new_personal(&user.id, display_name);
		let owner = OrgMembership::new(personal_org.id, user.id, OrgRole::Owner);
		let org_setting = OrganizationSetting::new(personal_org.id, OrganizationSettingFields::default());
		let user_setting = UserSetting::new(user.id);

		let mut tx = self.coordinator.begin().await?;
		UserRepository::create_user(&mut tx, &user)
			.await
			.map_err(|e| OrgError::from_db(e, "email"))?;
		OrgRepository::create_org(&mut tx, &personal_org).await?;
		MembershipRepository::create_membership(&mut tx, &owner).await?;
		OrgSettingRepository::create_setting(&mut tx, &org_setting).await?;
		UserRepository::create_user_setting(&mut tx, &user_setting).await?;

		history::record(&mut tx, USER_ENTITY, user.id, HistoryOperation::Create, None, &user).await?;
		history::record(
			&mut tx,
			ORGANIZATION_ENTITY,
			personal_org.id,
			HistoryOperation::Create,
			Some(user.id),
			&personal_org,
		)
		.await?;
		history::record(
			&mut tx,
			MEMBERSHIP_ENTITY,
			owner.id,
			HistoryOperation::Create,
			Some(user.id),
			&owner,
		)
		.await?;
		history::record(
			&mut tx,
			ORG_SETTING_ENTITY,
			org_setting.id,
			HistoryOperation::Create,
			Some(user.id),
			&org_setting,
		)
		.await?;
		history::record(
			&mut tx,
			USER_SETTING_ENTITY,
			user_setting.id,
			HistoryOperation::Create,
			Some(user.id),
			&user_setting,
		)
		.await?;

		let delta = tuples::org_created(&personal_org, &owner)
			.merge(tuples::user_setting_created(&user_setting));
		self.coordinator.commit(tx, delta, USER_ENTITY).await?;

		tracing::info!(user_id = %user.id, org_id = %personal_org.id, "user registered");
		Ok(RegisteredUser {
			user,
			personal_org,
			user_setting,
		})
	}
}
