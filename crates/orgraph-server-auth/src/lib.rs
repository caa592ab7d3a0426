// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity, organization models and request context for orgraph.
//!
//! - [`types`]: ID newtypes and [`OrgRole`]
//! - [`context`]: the immutable per-request [`RequestContext`]
//! - [`org`], [`group`], [`user`]: the relational entity models

pub mod context;
pub mod group;
pub mod org;
pub mod types;
pub mod user;

pub use context::{Caller, Decision, RequestContext, SoftDeleteMode};
pub use group::Group;
pub use org::{
	personal_org_name, OrgMembership, Organization, OrganizationSetting, OrganizationSettingFields,
};
pub use types::{
	GroupId, MembershipId, OrgId, OrgRole, OrgSettingId, UnknownRole, UserId, UserSettingId,
};
pub use user::{User, UserSetting};
