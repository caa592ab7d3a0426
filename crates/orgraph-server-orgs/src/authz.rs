// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization model and object naming for the organization graph.
//!
//! ```text
//! type organization
//!   relations
//!     define parent: [organization]
//!     define owner: [user] or owner from parent
//!     define admin: [user] or owner or admin from parent
//!     define member: [user] or admin or member from parent
//!     define can_view: member
//!     define can_edit: admin
//!     define can_delete: owner
//!
//! type group
//!   relations
//!     define parent: [organization]
//!     define admin: [user] or admin from parent
//!     define member: [user] or admin or member from parent
//!     define can_view: member
//!     define can_edit: admin
//!     define can_delete: admin
//!
//! type user_setting
//!   relations
//!     define owner: [user]
//!     define can_view: owner
//!     define can_edit: owner
//! ```

use orgraph_fga::{AuthorizationModel, ObjectRef, Subject, TypeDefinition, Userset};
use orgraph_server_auth::{GroupId, OrgId, UserId, UserSettingId};

pub const USER_TYPE: &str = "user";
pub const ORGANIZATION_TYPE: &str = "organization";
pub const GROUP_TYPE: &str = "group";
pub const USER_SETTING_TYPE: &str = "user_setting";

pub const PARENT_RELATION: &str = "parent";
pub const OWNER_RELATION: &str = "owner";
pub const ADMIN_RELATION: &str = "admin";
pub const MEMBER_RELATION: &str = "member";

/// Permission checked before an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	View,
	Edit,
	Delete,
}

impl Action {
	pub fn relation(&self) -> &'static str {
		match self {
			Action::View => "can_view",
			Action::Edit => "can_edit",
			Action::Delete => "can_delete",
		}
	}
}

pub fn authorization_model() -> AuthorizationModel {
	AuthorizationModel::new()
		.with_type(TypeDefinition::new(USER_TYPE))
		.with_type(
			TypeDefinition::new(ORGANIZATION_TYPE)
				.relation(PARENT_RELATION, vec![Userset::Direct])
				.relation(
					OWNER_RELATION,
					vec![Userset::Direct, Userset::from_parent(PARENT_RELATION, OWNER_RELATION)],
				)
				.relation(
					ADMIN_RELATION,
					vec![
						Userset::Direct,
						Userset::computed(OWNER_RELATION),
						Userset::from_parent(PARENT_RELATION, ADMIN_RELATION),
					],
				)
				.relation(
					MEMBER_RELATION,
					vec![
						Userset::Direct,
						Userset::computed(ADMIN_RELATION),
						Userset::from_parent(PARENT_RELATION, MEMBER_RELATION),
					],
				)
				.relation(Action::View.relation(), vec![Userset::computed(MEMBER_RELATION)])
				.relation(Action::Edit.relation(), vec![Userset::computed(ADMIN_RELATION)])
				.relation(Action::Delete.relation(), vec![Userset::computed(OWNER_RELATION)]),
		)
		.with_type(
			TypeDefinition::new(GROUP_TYPE)
				.relation(PARENT_RELATION, vec![Userset::Direct])
				.relation(
					ADMIN_RELATION,
					vec![Userset::Direct, Userset::from_parent(PARENT_RELATION, ADMIN_RELATION)],
				)
				.relation(
					MEMBER_RELATION,
					vec![
						Userset::Direct,
						Userset::computed(ADMIN_RELATION),
						Userset::from_parent(PARENT_RELATION, MEMBER_RELATION),
					],
				)
				.relation(Action::View.relation(), vec![Userset::computed(MEMBER_RELATION)])
				.relation(Action::Edit.relation(), vec![Userset::computed(ADMIN_RELATION)])
				.relation(Action::Delete.relation(), vec![Userset::computed(ADMIN_RELATION)]),
		)
		.with_type(
			TypeDefinition::new(USER_SETTING_TYPE)
				.relation(OWNER_RELATION, vec![Userset::Direct])
				.relation(Action::View.relation(), vec![Userset::computed(OWNER_RELATION)])
				.relation(Action::Edit.relation(), vec![Userset::computed(OWNER_RELATION)]),
		)
}

pub fn user_subject(user_id: &UserId) -> Subject {
	Subject::new(ObjectRef::new(USER_TYPE, user_id.to_string()))
}

pub fn org_object(org_id: &OrgId) -> ObjectRef {
	ObjectRef::new(ORGANIZATION_TYPE, org_id.to_string())
}

pub fn group_object(group_id: &GroupId) -> ObjectRef {
	ObjectRef::new(GROUP_TYPE, group_id.to_string())
}

pub fn user_setting_object(setting_id: &UserSettingId) -> ObjectRef {
	ObjectRef::new(USER_SETTING_TYPE, setting_id.to_string())
}
