// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OpenFGA HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FgaError, FgaResult};
use crate::store::RelationshipStore;
use crate::tuple::{ObjectRef, Subject, Tuple};

/// Connection settings for an OpenFGA store.
#[derive(Debug, Clone)]
pub struct OpenFgaConfig {
	/// Example: `http://localhost:8080`
	pub api_url: String,
	pub store_id: String,
	pub authorization_model_id: Option<String>,
	pub request_timeout: Duration,
}

impl OpenFgaConfig {
	pub fn new(api_url: impl Into<String>, store_id: impl Into<String>) -> Self {
		Self {
			api_url: api_url.into(),
			store_id: store_id.into(),
			authorization_model_id: None,
			request_timeout: Duration::from_secs(5),
		}
	}
}

#[derive(Debug, Serialize)]
struct TupleKey {
	user: String,
	relation: String,
	object: String,
}

impl From<&Tuple> for TupleKey {
	fn from(tuple: &Tuple) -> Self {
		Self {
			user: tuple.subject.to_string(),
			relation: tuple.relation.clone(),
			object: tuple.object.to_string(),
		}
	}
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
	tuple_key: TupleKey,
	#[serde(skip_serializing_if = "Option::is_none")]
	authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
	allowed: bool,
}

#[derive(Debug, Serialize)]
struct TupleWrites {
	tuple_keys: Vec<TupleKey>,
	on_duplicate: &'static str,
}

#[derive(Debug, Serialize)]
struct TupleDeletes {
	tuple_keys: Vec<TupleKey>,
	on_missing: &'static str,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	writes: Option<TupleWrites>,
	#[serde(skip_serializing_if = "Option::is_none")]
	deletes: Option<TupleDeletes>,
	#[serde(skip_serializing_if = "Option::is_none")]
	authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ListObjectsRequest<'a> {
	#[serde(rename = "type")]
	object_type: &'a str,
	relation: &'a str,
	user: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ListObjectsResponse {
	objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
	#[serde(default)]
	code: String,
	#[serde(default)]
	message: String,
}

/// [`RelationshipStore`] backed by an OpenFGA server.
#[derive(Debug, Clone)]
pub struct OpenFgaClient {
	http: Client,
	base_url: String,
	store_id: String,
	authorization_model_id: Option<String>,
}

impl OpenFgaClient {
	pub fn new(config: OpenFgaConfig) -> FgaResult<Self> {
		let http = Client::builder().timeout(config.request_timeout).build()?;
		let base_url = config.api_url.trim_end_matches('/').to_string();

		info!(base_url = %base_url, store_id = %config.store_id, "OpenFGA client initialized");

		Ok(Self {
			http,
			base_url,
			store_id: config.store_id,
			authorization_model_id: config.authorization_model_id,
		})
	}

	fn url(&self, endpoint: &str) -> String {
		format!("{}/stores/{}/{}", self.base_url, self.store_id, endpoint)
	}

	async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
		&self,
		endpoint: &str,
		body: &B,
	) -> FgaResult<R> {
		let response = self
			.http
			.post(self.url(endpoint))
			.json(body)
			.send()
			.await
			.map_err(|e| if e.is_timeout() { FgaError::Timeout } else { FgaError::Http(e) })?;

		let status = response.status();
		if status.is_success() {
			let bytes = response.bytes().await?;
			return Ok(serde_json::from_slice(&bytes)?);
		}

		let detail = match response.json::<ErrorBody>().await {
			Ok(body) if !body.code.is_empty() => format!("{}: {}", body.code, body.message),
			Ok(body) => body.message,
			Err(_) => String::new(),
		};
		Err(classify(status, detail))
	}

	fn model_id(&self) -> Option<&str> {
		self.authorization_model_id.as_deref()
	}
}

fn classify(status: StatusCode, detail: String) -> FgaError {
	let message = if detail.is_empty() {
		status.to_string()
	} else {
		format!("{status}: {detail}")
	};
	if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
		FgaError::Unavailable(message)
	} else {
		FgaError::Rejected(message)
	}
}

#[async_trait]
impl RelationshipStore for OpenFgaClient {
	#[tracing::instrument(skip(self), fields(subject = %subject, object = %object))]
	async fn check(&self, subject: &Subject, relation: &str, object: &ObjectRef) -> FgaResult<bool> {
		let request = CheckRequest {
			tuple_key: TupleKey {
				user: subject.to_string(),
				relation: relation.to_string(),
				object: object.to_string(),
			},
			authorization_model_id: self.model_id(),
		};
		let response: CheckResponse = self.post("check", &request).await?;
		Ok(response.allowed)
	}

	#[tracing::instrument(skip(self, tuples), fields(count = tuples.len()))]
	async fn write(&self, tuples: &[Tuple]) -> FgaResult<()> {
		if tuples.is_empty() {
			return Ok(());
		}
		let request = WriteRequest {
			writes: Some(TupleWrites {
				tuple_keys: tuples.iter().map(TupleKey::from).collect(),
				on_duplicate: "ignore",
			}),
			deletes: None,
			authorization_model_id: self.model_id(),
		};
		let _: serde_json::Value = self.post("write", &request).await?;
		debug!("tuples written");
		Ok(())
	}

	#[tracing::instrument(skip(self, tuples), fields(count = tuples.len()))]
	async fn delete(&self, tuples: &[Tuple]) -> FgaResult<()> {
		if tuples.is_empty() {
			return Ok(());
		}
		let request = WriteRequest {
			writes: None,
			deletes: Some(TupleDeletes {
				tuple_keys: tuples.iter().map(TupleKey::from).collect(),
				on_missing: "ignore",
			}),
			authorization_model_id: self.model_id(),
		};
		let _: serde_json::Value = self.post("write", &request).await?;
		debug!("tuples deleted");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(subject = %subject))]
	async fn list_objects(
		&self,
		subject: &Subject,
		relation: &str,
		object_type: &str,
	) -> FgaResult<Vec<String>> {
		let request = ListObjectsRequest {
			object_type,
			relation,
			user: subject.to_string(),
			authorization_model_id: self.model_id(),
		};
		let response: ListObjectsResponse = self.post("list-objects", &request).await?;
		response
			.objects
			.iter()
			.map(|o| o.parse::<ObjectRef>().map(|r| r.id))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_errors_and_throttling_are_unavailable() {
		assert!(matches!(
			classify(StatusCode::SERVICE_UNAVAILABLE, String::new()),
			FgaError::Unavailable(_)
		));
		assert!(matches!(
			classify(StatusCode::TOO_MANY_REQUESTS, String::new()),
			FgaError::Unavailable(_)
		));
		assert!(matches!(
			classify(StatusCode::BAD_REQUEST, "validation_error: bad".into()),
			FgaError::Rejected(_)
		));
	}

	#[test]
	fn trailing_slash_is_trimmed() {
		let client = OpenFgaClient::new(OpenFgaConfig::new("http://fga.local/", "store1")).unwrap();
		assert_eq!(client.url("check"), "http://fga.local/stores/store1/check");
	}
}
