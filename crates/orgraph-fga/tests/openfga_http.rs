// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use orgraph_fga::{FgaError, ObjectRef, OpenFgaClient, OpenFgaConfig, RelationshipStore, Subject, Tuple};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenFgaClient {
	let mut config = OpenFgaConfig::new(server.uri(), "store-1");
	config.authorization_model_id = Some("model-1".to_string());
	config.request_timeout = Duration::from_millis(200);
	OpenFgaClient::new(config).unwrap()
}

fn alice() -> Subject {
	Subject::new(ObjectRef::new("user", "alice"))
}

#[tokio::test]
async fn check_sends_tuple_key_and_model() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/stores/store-1/check"))
		.and(body_partial_json(json!({
			"tuple_key": {
				"user": "user:alice",
				"relation": "can_view",
				"object": "organization:o1"
			},
			"authorization_model_id": "model-1"
		})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "allowed": true })))
		.expect(1)
		.mount(&server)
		.await;

	let allowed = client(&server)
		.check(&alice(), "can_view", &ObjectRef::new("organization", "o1"))
		.await
		.unwrap();
	assert!(allowed);
}

#[tokio::test]
async fn write_and_delete_use_idempotent_modes() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/stores/store-1/write"))
		.and(body_partial_json(json!({ "writes": { "on_duplicate": "ignore" } })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/stores/store-1/write"))
		.and(body_partial_json(json!({ "deletes": { "on_missing": "ignore" } })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.expect(1)
		.mount(&server)
		.await;

	let fga = client(&server);
	let tuple = Tuple::new(alice(), "owner", ObjectRef::new("organization", "o1"));
	fga.write(&[tuple.clone()]).await.unwrap();
	fga.delete(&[tuple]).await.unwrap();
}

#[tokio::test]
async fn empty_write_skips_request() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(500))
		.expect(0)
		.mount(&server)
		.await;

	client(&server).write(&[]).await.unwrap();
}

#[tokio::test]
async fn list_objects_strips_type_prefix() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/stores/store-1/list-objects"))
		.and(body_partial_json(json!({
			"type": "organization",
			"relation": "can_view",
			"user": "user:alice"
		})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"objects": ["organization:o1", "organization:o2"]
		})))
		.mount(&server)
		.await;

	let ids = client(&server)
		.list_objects(&alice(), "can_view", "organization")
		.await
		.unwrap();
	assert_eq!(ids, vec!["o1".to_string(), "o2".to_string()]);
}

#[tokio::test]
async fn server_error_is_transient() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/stores/store-1/write"))
		.respond_with(ResponseTemplate::new(503).set_body_json(json!({
			"code": "unavailable",
			"message": "try again"
		})))
		.mount(&server)
		.await;

	let err = client(&server)
		.write(&[Tuple::new(alice(), "owner", ObjectRef::new("organization", "o1"))])
		.await
		.unwrap_err();
	assert!(matches!(err, FgaError::Unavailable(_)));
	assert!(err.is_transient());
}

#[tokio::test]
async fn validation_error_is_rejected() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/stores/store-1/check"))
		.respond_with(ResponseTemplate::new(400).set_body_json(json!({
			"code": "validation_error",
			"message": "relation not found"
		})))
		.mount(&server)
		.await;

	let err = client(&server)
		.check(&alice(), "nope", &ObjectRef::new("organization", "o1"))
		.await
		.unwrap_err();
	assert!(matches!(err, FgaError::Rejected(_)));
	assert!(!err.is_transient());
}

#[tokio::test]
async fn slow_server_times_out() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({ "allowed": true }))
				.set_delay(Duration::from_secs(2)),
		)
		.mount(&server)
		.await;

	let err = client(&server)
		.check(&alice(), "can_view", &ObjectRef::new("organization", "o1"))
		.await
		.unwrap_err();
	assert!(matches!(err, FgaError::Timeout));
	assert!(err.is_transient());
}
