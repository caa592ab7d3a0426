// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # orgraph-server-orgs
//!
//! Organization graph service whose mutations stay consistent with an
//! external relationship store.
//!
//! ## Consistency
//!
//! | Mutation | Relational side | Tuple side | On tuple failure |
//! |----------|-----------------|------------|------------------|
//! | Single entity | one transaction | written before commit | rolled back, `AuthorizationSync` |
//! | Organization delete | closure soft-deleted, committed first | deleted after commit | ledgered, `CascadeIncomplete` |
//!
//! A ledgered deletion is retried by [`Reconciler::run`].
//!
//! ## Request Context
//!
//! Every operation takes a [`RequestContext`]. Its `Decision` forces an
//! authorization outcome for trusted internal callers and its
//! `SoftDeleteMode` decides whether reads see deleted rows. Neither is ever
//! process-wide state.
//!
//! [`RequestContext`]: orgraph_server_auth::RequestContext

pub mod authz;
pub mod cascade;
pub mod coordinator;
pub mod default_org;
pub mod error;
pub mod groups;
pub mod hierarchy;
pub mod history;
pub mod memberships;
pub mod organizations;
pub mod reconcile;
pub mod service;
pub mod settings;
pub mod tuples;
pub mod users;
pub mod validation;

pub use authz::{authorization_model, Action};
pub use cascade::{CascadeEngine, CascadeOutcome};
pub use coordinator::MutationCoordinator;
pub use default_org::Reassignment;
pub use error::{ErrorKind, OrgError, Result};
pub use groups::CreateGroupInput;
pub use hierarchy::OrgHierarchy;
pub use memberships::{CreateOrgMembershipInput, UpdateOrgMembershipInput};
pub use organizations::{
	AddOrgMemberInput, CreateOrganizationInput, CreateOrganizationSettingInput, OrganizationView,
	UpdateOrganizationInput,
};
pub use reconcile::{ReconcileReport, Reconciler};
pub use service::OrgService;
pub use settings::{UpdateOrganizationSettingInput, UpdateUserSettingInput};
pub use tuples::TupleDelta;
pub use users::{RegisterUserInput, RegisteredUser};
