// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use orgraph_fga::MockRelationshipStore;
use orgraph_server_auth::{OrgId, RequestContext, SoftDeleteMode};
use orgraph_server_db::testing::create_test_pool;
use orgraph_server_db::{HistoryOperation, HistoryRepository, OrgRepository};
use orgraph_server_orgs::authz::org_object;
use orgraph_server_orgs::error::{ALREADY_EXISTS, TOO_LONG, TOO_SHORT, UNAUTHORIZED_MESSAGE};
use orgraph_server_orgs::history::{
	MEMBERSHIP_ENTITY, ORGANIZATION_ENTITY, ORG_SETTING_ENTITY, USER_ENTITY, USER_SETTING_ENTITY,
};
use orgraph_server_orgs::{
	authorization_model, AddOrgMemberInput, CreateOrgMembershipInput, CreateOrganizationInput,
	CreateOrganizationSettingInput,
	ErrorKind, OrgService, RegisterUserInput, RegisteredUser, UpdateOrganizationInput,
	UpdateOrganizationSettingInput,
};
use orgraph_server_auth::{Decision, OrgRole};

struct Harness {
	service: OrgService,
	store: Arc<MockRelationshipStore>,
}

impl Harness {
	async fn new() -> Self {
		let pool = create_test_pool().await;
		let store = Arc::new(MockRelationshipStore::new(authorization_model()));
		Self {
			service: OrgService::new(pool, store.clone()),
			store,
		}
	}

	async fn register(&self, name: &str) -> RegisteredUser {
		self
			.service
			.register_user(RegisterUserInput {
				display_name: name.to_string(),
				email: format!("{name}@example.com"),
			})
			.await
			.unwrap()
	}

	async fn create(&self, ctx: &RequestContext, name: &str) -> OrgId {
		self
			.service
			.create_organization(ctx, CreateOrganizationInput::named(name))
			.await
			.unwrap()
			.organization
			.id
	}

	/// Operations recorded for one entity, oldest first.
	async fn history(&self, entity_type: &str, entity_id: impl ToString) -> Vec<HistoryOperation> {
		let mut conn = self.service.coordinator().pool().acquire().await.unwrap();
		HistoryRepository::list_for_entity(&mut conn, entity_type, &entity_id.to_string())
			.await
			.unwrap()
			.into_iter()
			.map(|e| e.operation)
			.collect()
	}

	async fn default_org(&self, user: &RegisteredUser) -> Option<OrgId> {
		self
			.service
			.get_user_setting_by_id(&ctx(user), &user.user_setting.id)
			.await
			.unwrap()
			.default_org_id
	}
}

fn ctx(user: &RegisteredUser) -> RequestContext {
	RequestContext::for_user(user.user.id)
}

#[tokio::test]
async fn acme_beta_scenario() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);
	assert_eq!(h.default_org(&user).await, None);

	let acme = h.create(&ctx, "Acme").await;
	assert_eq!(h.default_org(&user).await, Some(acme));

	let beta = h
		.service
		.create_organization(
			&ctx,
			CreateOrganizationInput {
				settings: Some(CreateOrganizationSettingInput {
					domains: vec!["beta.io".to_string()],
					..Default::default()
				}),
				..CreateOrganizationInput::named("Beta")
			},
		)
		.await
		.unwrap();
	assert_eq!(beta.setting.unwrap().fields.domains, vec!["beta.io".to_string()]);
	assert_eq!(h.default_org(&user).await, Some(acme));

	let err = h
		.service
		.create_organization(
			&ctx,
			CreateOrganizationInput {
				parent_id: Some(user.personal_org.id),
				..CreateOrganizationInput::named("child")
			},
		)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::InvalidHierarchy);
	assert_eq!(
		err.to_string(),
		"personal organizations are not allowed to have child organizations"
	);

	assert_eq!(h.service.delete_organization(&ctx, &acme).await.unwrap(), acme);
	let default = h.default_org(&user).await;
	assert!(default.is_some());
	assert_ne!(default, Some(acme));

	let err = h.service.get_organization_by_id(&ctx, &acme).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotFound);
	assert_eq!(err.to_string(), "organization not found");
}

#[tokio::test]
async fn failed_tuple_write_leaves_no_organization() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);

	h.store.fail_writes("relationship store unavailable");
	let err = h
		.service
		.create_organization(&ctx, CreateOrganizationInput::named("acme"))
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::AuthorizationSync);
	h.store.clear_mocks();

	let all = h
		.service
		.get_all_organizations(&ctx.privileged().skip_soft_delete())
		.await
		.unwrap();
	assert!(all.iter().all(|o| o.name != "acme"));
	assert_eq!(h.default_org(&user).await, None);

	// The name was never taken.
	h.create(&ctx, "acme").await;
}

#[tokio::test]
async fn failed_create_records_no_history() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	h.store.fail_writes("boom");
	let _ = h
		.service
		.create_organization(&ctx(&user), CreateOrganizationInput::named("acme"))
		.await;

	let mut conn = h.service.coordinator().pool().acquire().await.unwrap();
	let orgs = OrgRepository::list_orgs(&mut conn, SoftDeleteMode::Include).await.unwrap();
	assert_eq!(orgs.len(), 1, "only the personal organization remains");
	let history = HistoryRepository::list_for_entity(&mut conn, "organization", &user.personal_org.id.to_string())
		.await
		.unwrap();
	assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn deleted_org_is_hidden_by_default_and_visible_with_soft_delete() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);
	let created = h
		.service
		.create_organization(
			&ctx,
			CreateOrganizationInput {
				description: Some("widgets".to_string()),
				..CreateOrganizationInput::named("acme")
			},
		)
		.await
		.unwrap()
		.organization;

	h.service.delete_organization(&ctx, &created.id).await.unwrap();

	let err = h.service.get_organization_by_id(&ctx, &created.id).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotFound);

	let view = h
		.service
		.get_organization_by_id(&ctx.skip_soft_delete(), &created.id)
		.await
		.unwrap();
	assert_eq!(view.organization.name, created.name);
	assert_eq!(view.organization.display_name, created.display_name);
	assert_eq!(view.organization.description, created.description);
	assert!(view.organization.deleted_at.is_some());

	// A stranger still cannot see it.
	let stranger = h.register("eve").await;
	let err = h
		.service
		.get_organization_by_id(&self::ctx(&stranger).skip_soft_delete(), &created.id)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn cascade_hides_descendants_and_groups() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);

	let parent = h.create(&ctx, "parent").await;
	let child = h
		.service
		.create_organization(
			&ctx,
			CreateOrganizationInput {
				parent_id: Some(parent),
				..CreateOrganizationInput::named("child")
			},
		)
		.await
		.unwrap()
		.organization
		.id;
	let grandchild = h
		.service
		.create_organization(
			&ctx,
			CreateOrganizationInput {
				parent_id: Some(child),
				..CreateOrganizationInput::named("grandchild")
			},
		)
		.await
		.unwrap()
		.organization
		.id;
	let group = h
		.service
		.create_group(
			&ctx,
			orgraph_server_orgs::CreateGroupInput {
				owner_id: Some(child),
				name: "eng".to_string(),
				..Default::default()
			},
		)
		.await
		.unwrap();

	let outcome = h.service.cascade().delete_organization(&ctx, &parent).await.unwrap();
	assert_eq!(outcome.orgs.len(), 3);
	assert_eq!(outcome.groups, vec![group.id]);

	for org in [parent, child, grandchild] {
		let err = h.service.get_organization_by_id(&ctx, &org).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
		assert!(h.store.tuples_referencing(&org_object(&org)).await.is_empty());
	}
	let err = h.service.get_group_by_id(&ctx, &group.id).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotFound);

	let internal = ctx.privileged().skip_soft_delete();
	for org in [parent, child, grandchild] {
		let view = h.service.get_organization_by_id(&internal, &org).await.unwrap();
		assert!(view.organization.deleted_at.is_some());
	}
	let deleted_group = h.service.get_group_by_id(&internal, &group.id).await.unwrap();
	assert!(deleted_group.deleted_at.is_some());

	assert_eq!(h.service.reconciler().pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn names_are_unique_among_active_orgs() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);

	let first = h.create(&ctx, "acme").await;
	let err = h
		.service
		.create_organization(&ctx, CreateOrganizationInput::named("acme"))
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Validation);
	assert!(err.to_string().contains(ALREADY_EXISTS));

	h.service.delete_organization(&ctx, &first).await.unwrap();
	let second = h.create(&ctx, "acme").await;
	assert_ne!(first, second);

	// Display names may repeat.
	h.service
		.create_organization(
			&ctx,
			CreateOrganizationInput {
				display_name: Some("acme".to_string()),
				..CreateOrganizationInput::named("acme-two")
			},
		)
		.await
		.unwrap();
}

#[tokio::test]
async fn concurrent_duplicate_creates_admit_exactly_one() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);

	let attempts = (0..3).map(|_| {
		h.service
			.create_organization(&ctx, CreateOrganizationInput::named("acme"))
	});
	let results = futures::future::join_all(attempts).await;

	assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
	for err in results.into_iter().filter_map(|r| r.err()) {
		assert_eq!(err.kind(), ErrorKind::Validation);
	}
}

#[tokio::test]
async fn name_length_is_validated() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);

	let err = h
		.service
		.create_organization(&ctx, CreateOrganizationInput::named(""))
		.await
		.unwrap_err();
	assert!(err.to_string().contains(TOO_SHORT));

	let err = h
		.service
		.create_organization(&ctx, CreateOrganizationInput::named("a".repeat(161)))
		.await
		.unwrap_err();
	assert!(err.to_string().contains(TOO_LONG));

	let view = h
		.service
		.create_organization(&ctx, CreateOrganizationInput::named("acme"))
		.await
		.unwrap();
	assert_eq!(view.organization.display_name, "acme");
	assert_eq!(view.members.len(), 1);
	assert_eq!(view.members[0].role, OrgRole::Owner);
}

#[tokio::test]
async fn deletes_are_checked_before_lookup() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);
	let missing = OrgId::generate();

	let err = h.service.delete_organization(&ctx, &missing).await.unwrap_err();
	assert_eq!(err.to_string(), UNAUTHORIZED_MESSAGE);

	let err = h
		.service
		.delete_organization(&ctx.with_decision(Decision::Allow), &missing)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotFound);

	let err = h
		.service
		.delete_organization(&ctx, &user.personal_org.id)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::ForbiddenOperation);
	assert_eq!(err.to_string(), "cannot delete personal organizations");
}

#[tokio::test]
async fn other_users_cannot_touch_an_org() {
	let h = Harness::new().await;
	let owner = h.register("ada").await;
	let stranger = h.register("eve").await;
	let acme = h.create(&ctx(&owner), "acme").await;

	let err = h.service.get_organization_by_id(&ctx(&stranger), &acme).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);
	let err = h.service.delete_organization(&ctx(&stranger), &acme).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);

	let visible = h.service.get_all_organizations(&ctx(&stranger)).await.unwrap();
	assert_eq!(visible.len(), 1);
	assert_eq!(visible[0].id, stranger.personal_org.id);

	let err = h
		.service
		.get_all_organizations(&ctx(&stranger).with_decision(Decision::Deny))
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn update_changes_fields_members_and_settings() {
	let h = Harness::new().await;
	let owner = h.register("ada").await;
	let member = h.register("bob").await;
	let ctx = ctx(&owner);
	let acme = h.create(&ctx, "acme").await;

	let view = h
		.service
		.update_organization(
			&ctx,
			&acme,
			UpdateOrganizationInput {
				name: Some("acme-corp".to_string()),
				display_name: Some("Acme Corp".to_string()),
				description: Some("widgets".to_string()),
				add_members: vec![AddOrgMemberInput {
					user_id: member.user.id,
					role: OrgRole::Admin,
				}],
				update_settings: Some(UpdateOrganizationSettingInput {
					domains: Some(vec!["acme.io".to_string(), "acme.dev".to_string()]),
					..Default::default()
				}),
				..Default::default()
			},
		)
		.await
		.unwrap();

	assert_eq!(view.organization.name, "acme-corp");
	assert_eq!(view.organization.display_name, "Acme Corp");
	assert_eq!(view.organization.description.as_deref(), Some("widgets"));
	assert_eq!(view.members.len(), 2);
	assert_eq!(view.setting.unwrap().fields.domains.len(), 2);

	// The new admin can now read the org.
	h.service
		.get_organization_by_id(&self::ctx(&member), &acme)
		.await
		.unwrap();

	let view = h
		.service
		.update_organization(
			&ctx,
			&acme,
			UpdateOrganizationInput {
				remove_members: vec![member.user.id],
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert_eq!(view.members.len(), 1);
	let err = h
		.service
		.get_organization_by_id(&self::ctx(&member), &acme)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);

	let err = h
		.service
		.update_organization(
			&ctx,
			&acme,
			UpdateOrganizationInput {
				name: Some("a".repeat(161)),
				..Default::default()
			},
		)
		.await
		.unwrap_err();
	assert!(err.to_string().contains(TOO_LONG));

	let err = h
		.service
		.update_organization(
			&ctx,
			&acme,
			UpdateOrganizationInput {
				remove_members: vec![owner.user.id],
				..Default::default()
			},
		)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::ForbiddenOperation);
}

#[tokio::test]
async fn failed_tuple_delete_reports_cascade_incomplete_and_reconciles() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);
	let acme = h.create(&ctx, "acme").await;

	h.store.fail_deletes("relationship store unavailable");
	let err = h.service.delete_organization(&ctx, &acme).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::CascadeIncomplete);

	// The relational delete committed regardless.
	let err = h.service.get_organization_by_id(&ctx, &acme).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NotFound);
	assert_ne!(h.default_org(&user).await, Some(acme));

	let reconciler = h.service.reconciler();
	assert!(reconciler.pending_count().await.unwrap() > 0);
	assert!(!h.store.tuples_referencing(&org_object(&acme)).await.is_empty());

	h.store.clear_mocks();
	let report = reconciler.run().await.unwrap();
	assert_eq!(report.remaining, 0);
	assert_eq!(report.attempted, report.reconciled);
	assert!(h.store.tuples_referencing(&org_object(&acme)).await.is_empty());
}

#[tokio::test]
async fn removed_members_do_not_regain_access_when_the_org_is_deleted() {
	let h = Harness::new().await;
	let owner = h.register("ada").await;
	let removed = h.register("bob").await;
	let kept = h.register("carol").await;
	let acme = h.create(&ctx(&owner), "acme").await;

	let add = |user: &RegisteredUser| CreateOrgMembershipInput {
		org_id: acme,
		user_id: user.user.id,
		role: None,
	};
	let bob = h
		.service
		.create_org_membership(&ctx(&owner), add(&removed))
		.await
		.unwrap();
	h.service
		.create_org_membership(&ctx(&owner), add(&kept))
		.await
		.unwrap();
	h.service
		.delete_org_membership(&ctx(&owner), &bob.id)
		.await
		.unwrap();
	let err = h
		.service
		.get_organization_by_id(&ctx(&removed).skip_soft_delete(), &acme)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);

	h.service.delete_organization(&ctx(&owner), &acme).await.unwrap();

	let err = h
		.service
		.get_organization_by_id(&ctx(&removed).skip_soft_delete(), &acme)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);
	let err = h
		.service
		.get_all_org_memberships(&ctx(&removed).skip_soft_delete(), &acme)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);
	let settings = h
		.service
		.get_all_organization_settings(&ctx(&removed).skip_soft_delete())
		.await
		.unwrap();
	assert!(settings.iter().all(|s| s.org_id != acme));

	// Members at the time of deletion keep read access to the deleted org.
	let view = h
		.service
		.get_organization_by_id(&ctx(&kept).skip_soft_delete(), &acme)
		.await
		.unwrap();
	assert!(view.organization.deleted_at.is_some());
}

#[tokio::test]
async fn registration_and_cascade_record_history_for_every_entity() {
	let h = Harness::new().await;
	let user = h.register("ada").await;
	let ctx = ctx(&user);

	let personal_membership = h
		.service
		.get_all_org_memberships(&ctx, &user.personal_org.id)
		.await
		.unwrap()
		.remove(0);
	let personal_setting = h
		.service
		.get_all_organization_settings(&ctx)
		.await
		.unwrap()
		.into_iter()
		.find(|s| s.org_id == user.personal_org.id)
		.unwrap();
	let created = vec![HistoryOperation::Create];
	assert_eq!(h.history(USER_ENTITY, user.user.id).await, created);
	assert_eq!(h.history(ORGANIZATION_ENTITY, user.personal_org.id).await, created);
	assert_eq!(h.history(MEMBERSHIP_ENTITY, personal_membership.id).await, created);
	assert_eq!(h.history(ORG_SETTING_ENTITY, personal_setting.id).await, created);
	assert_eq!(h.history(USER_SETTING_ENTITY, user.user_setting.id).await, created);

	let view = h
		.service
		.create_organization(&ctx, CreateOrganizationInput::named("acme"))
		.await
		.unwrap();
	let acme = view.organization.id;
	let setting = view.setting.unwrap().id;
	let owner = view.members[0].id;
	h.service.delete_organization(&ctx, &acme).await.unwrap();

	let lifecycle = vec![HistoryOperation::Create, HistoryOperation::Delete];
	assert_eq!(h.history(ORGANIZATION_ENTITY, acme).await, lifecycle);
	assert_eq!(h.history(MEMBERSHIP_ENTITY, owner).await, lifecycle);
	assert_eq!(h.history(ORG_SETTING_ENTITY, setting).await, lifecycle);
}
