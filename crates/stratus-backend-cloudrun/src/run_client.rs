// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use stratus_lifecycle::CredentialCache;
use tracing::{debug, instrument};

use crate::client::ServiceApi;
use crate::error::CloudRunError;
use crate::types::{Service, ServiceList};

/// Regional endpoint of the serving control plane.
pub fn regional_endpoint(region: &str) -> String {
	format!("https://{region}-run.googleapis.com")
}

/// [`ServiceApi`] over the regional REST endpoint, authenticated with the
/// admin credential cache.
pub struct RunApiClient {
	http: Client,
	base_url: String,
	project: String,
	credentials: Arc<CredentialCache>,
}

impl RunApiClient {
	pub fn new(
		http: Client,
		base_url: impl Into<String>,
		project: impl Into<String>,
		credentials: Arc<CredentialCache>,
	) -> Self {
		Self {
			http,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			project: project.into(),
			credentials,
		}
	}

	fn services_url(&self) -> String {
		format!(
			"{}/apis/serving.knative.dev/v1/namespaces/{}/services",
			self.base_url, self.project
		)
	}

	fn service_url(&self, name: &str) -> String {
		format!("{}/{name}", self.services_url())
	}

	async fn send(&self, request: RequestBuilder) -> Result<Response, CloudRunError> {
		let credential = self.credentials.get_token().await?;
		let response = request
			.bearer_auth(credential.token().expose())
			.send()
			.await?;
		Ok(response)
	}
}

async fn api_error(response: Response) -> CloudRunError {
	let status = response.status().as_u16();
	let message = response.text().await.unwrap_or_default();
	debug!(status, "serving API error response");
	CloudRunError::ApiError { status, message }
}

#[async_trait]
impl ServiceApi for RunApiClient {
	#[instrument(skip(self))]
	async fn get_service(&self, name: &str) -> Result<Service, CloudRunError> {
		let response = self.send(self.http.get(self.service_url(name))).await?;
		match response.status() {
			s if s.is_success() => Ok(response.json().await?),
			StatusCode::NOT_FOUND => Err(CloudRunError::ServiceNotFound {
				name: name.to_string(),
			}),
			_ => Err(api_error(response).await),
		}
	}

	#[instrument(skip(self, service), fields(name = %service.name()))]
	async fn create_service(&self, service: &Service) -> Result<Service, CloudRunError> {
		let response = self
			.send(self.http.post(self.services_url()).json(service))
			.await?;
		match response.status() {
			s if s.is_success() => Ok(response.json().await?),
			StatusCode::CONFLICT => Err(CloudRunError::ServiceAlreadyExists {
				name: service.name().to_string(),
			}),
			_ => Err(api_error(response).await),
		}
	}

	#[instrument(skip(self))]
	async fn list_services(&self) -> Result<Vec<Service>, CloudRunError> {
		let response = self.send(self.http.get(self.services_url())).await?;
		if !response.status().is_success() {
			return Err(api_error(response).await);
		}
		let list: ServiceList = response.json().await?;
		Ok(list.items)
	}

	#[instrument(skip(self))]
	async fn delete_service(&self, name: &str) -> Result<(), CloudRunError> {
		let response = self.send(self.http.delete(self.service_url(name))).await?;
		match response.status() {
			s if s.is_success() => Ok(()),
			StatusCode::NOT_FOUND => Err(CloudRunError::ServiceNotFound {
				name: name.to_string(),
			}),
			_ => Err(api_error(response).await),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use serde_json::json;
	use stratus_lifecycle::{Credential, StaticTokenSource};
	use wiremock::matchers::{header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const SERVICES: &str = "/apis/serving.knative.dev/v1/namespaces/proj/services";

	fn client(server: &MockServer) -> RunApiClient {
		let credential = Credential::new("admin-token".into(), Utc::now() + chrono::Duration::hours(1));
		let cache = CredentialCache::new(Arc::new(StaticTokenSource::new(credential)));
		RunApiClient::new(Client::new(), server.uri(), "proj", Arc::new(cache))
	}

	#[test]
	fn regional_endpoint_format() {
		assert_eq!(regional_endpoint("us-east1"), "https://us-east1-run.googleapis.com");
	}

	#[tokio::test]
	async fn get_service_sends_admin_bearer() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(format!("{SERVICES}/svc")))
			.and(header("authorization", "Bearer admin-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"metadata": {"name": "svc"},
				"status": {"url": "https://svc.example/", "conditions": []}
			})))
			.mount(&server)
			.await;

		let service = client(&server).get_service("svc").await.unwrap();
		assert_eq!(service.url(), Some("https://svc.example/"));
	}

	#[tokio::test]
	async fn missing_service_maps_to_not_found() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		let err = client(&server).get_service("svc").await.unwrap_err();
		assert!(matches!(err, CloudRunError::ServiceNotFound { .. }));
	}

	#[tokio::test]
	async fn create_conflict_maps_to_already_exists() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(SERVICES))
			.respond_with(ResponseTemplate::new(409).set_body_string("exists"))
			.mount(&server)
			.await;

		let service = Service {
			metadata: crate::types::ObjectMeta {
				name: "svc".to_string(),
				..Default::default()
			},
			..Default::default()
		};
		let err = client(&server).create_service(&service).await.unwrap_err();
		assert!(matches!(err, CloudRunError::ServiceAlreadyExists { .. }));
	}

	#[tokio::test]
	async fn server_errors_carry_status_and_body() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(SERVICES))
			.respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
			.mount(&server)
			.await;

		match client(&server).list_services().await.unwrap_err() {
			CloudRunError::ApiError { status, message } => {
				assert_eq!(status, 403);
				assert_eq!(message, "permission denied");
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn list_returns_items() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(SERVICES))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"items": [{"metadata": {"name": "a"}}, {"metadata": {"name": "b"}}]
			})))
			.mount(&server)
			.await;

		let services = client(&server).list_services().await.unwrap();
		let names: Vec<_> = services.iter().map(Service::name).collect();
		assert_eq!(names, vec!["a", "b"]);
	}
}
