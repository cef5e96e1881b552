// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use stratus_lifecycle::CredentialCache;
use tracing::{debug, instrument};
use url::Url;

use crate::client::VpcApi;
use crate::error::VpcError;
use crate::types::{
	FloatingIp, FloatingIpList, FloatingIpPrototype, Instance, InstanceAction, InstanceList,
	InstancePrototype, NetworkInterface, NetworkInterfaceList, Page, PageLink,
};

/// API generation every request pins.
const GENERATION: &str = "2";

/// Largest page the list endpoints accept.
const PAGE_LIMIT: &str = "100";

/// `start` token carried by a `next` link.
fn start_token(link: &PageLink) -> Option<String> {
	Url::parse(&link.href)
		.ok()?
		.query_pairs()
		.find(|(key, _)| key == "start")
		.map(|(_, value)| value.into_owned())
}

/// [`VpcApi`] over the regional REST endpoint, authenticated with the IAM
/// credential cache.
pub struct VpcHttpClient {
	http: Client,
	endpoint: String,
	api_version: String,
	credentials: Arc<CredentialCache>,
}

impl VpcHttpClient {
	/// `api_version` is the dated API version, e.g. `2020-06-02`.
	pub fn new(
		http: Client,
		endpoint: impl Into<String>,
		api_version: impl Into<String>,
		credentials: Arc<CredentialCache>,
	) -> Self {
		Self {
			http,
			endpoint: endpoint.into().trim_end_matches('/').to_string(),
			api_version: api_version.into(),
			credentials,
		}
	}

	fn url(&self, path: &str) -> String {
		format!("{}/v1/{path}", self.endpoint)
	}

	async fn send(&self, request: RequestBuilder) -> Result<Response, VpcError> {
		let credential = self.credentials.get_token().await?;
		let response = request
			.query(&[("version", self.api_version.as_str()), ("generation", GENERATION)])
			.bearer_auth(credential.token().expose())
			.send()
			.await?;
		Ok(response)
	}

	/// Map a response to `Ok` on success, `NotFound` on 404 and `ApiError`
	/// otherwise.
	async fn check(
		response: Response,
		kind: &'static str,
		id: &str,
	) -> Result<Response, VpcError> {
		match response.status() {
			s if s.is_success() => Ok(response),
			StatusCode::NOT_FOUND => Err(VpcError::NotFound {
				kind,
				id: id.to_string(),
			}),
			_ => Err(api_error(response).await),
		}
	}

	/// Every item of the collection at `path`, following `next` links.
	async fn list_all<P>(
		&self,
		path: &str,
		kind: &'static str,
		filter: &[(&str, &str)],
	) -> Result<Vec<P::Item>, VpcError>
	where
		P: Page + DeserializeOwned,
	{
		let mut items = Vec::new();
		let mut start: Option<String> = None;
		loop {
			let mut request = self
				.http
				.get(self.url(path))
				.query(&[("limit", PAGE_LIMIT)])
				.query(filter);
			if let Some(start) = &start {
				request = request.query(&[("start", start.as_str())]);
			}
			let response = Self::check(self.send(request).await?, kind, "").await?;
			let (page, next) = response.json::<P>().await?.into_parts();
			items.extend(page);

			match next.as_ref().and_then(start_token) {
				Some(token) if start.as_deref() != Some(token.as_str()) => start = Some(token),
				_ => break,
			}
		}
		debug!(kind, count = items.len(), "listed collection");
		Ok(items)
	}
}

async fn api_error(response: Response) -> VpcError {
	let status = response.status().as_u16();
	let message = response.text().await.unwrap_or_default();
	debug!(status, "VPC API error response");
	VpcError::ApiError { status, message }
}

#[async_trait]
impl VpcApi for VpcHttpClient {
	#[instrument(skip(self))]
	async fn list_instances(&self) -> Result<Vec<Instance>, VpcError> {
		self.list_all::<InstanceList>("instances", "instances", &[]).await
	}

	#[instrument(skip(self))]
	async fn find_instance(&self, name: &str) -> Result<Option<Instance>, VpcError> {
		let instances = self
			.list_all::<InstanceList>("instances", "instances", &[("name", name)])
			.await?;
		Ok(instances.into_iter().find(|i| i.name == name))
	}

	#[instrument(skip(self))]
	async fn get_instance(&self, id: &str) -> Result<Instance, VpcError> {
		let response = self
			.send(self.http.get(self.url(&format!("instances/{id}"))))
			.await?;
		let response = Self::check(response, "instance", id).await?;
		Ok(response.json().await?)
	}

	#[instrument(skip(self, prototype), fields(name = %prototype.name))]
	async fn create_instance(&self, prototype: &InstancePrototype) -> Result<Instance, VpcError> {
		let response = self
			.send(self.http.post(self.url("instances")).json(prototype))
			.await?;
		let response = Self::check(response, "instance", &prototype.name).await?;
		Ok(response.json().await?)
	}

	#[instrument(skip(self))]
	async fn delete_instance(&self, id: &str) -> Result<(), VpcError> {
		let response = self
			.send(self.http.delete(self.url(&format!("instances/{id}"))))
			.await?;
		Self::check(response, "instance", id).await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn create_instance_action(&self, id: &str, action: InstanceAction) -> Result<(), VpcError> {
		let response = self
			.send(
				self.http
					.post(self.url(&format!("instances/{id}/actions")))
					.json(&json!({"type": action.as_str()})),
			)
			.await?;
		Self::check(response, "instance", id).await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, VpcError> {
		self.list_all::<FloatingIpList>("floating_ips", "floating_ips", &[])
			.await
	}

	#[instrument(skip(self))]
	async fn find_floating_ip(&self, name: &str) -> Result<Option<FloatingIp>, VpcError> {
		let fips = self
			.list_all::<FloatingIpList>("floating_ips", "floating_ips", &[("name", name)])
			.await?;
		Ok(fips.into_iter().find(|fip| fip.name == name))
	}

	#[instrument(skip(self, prototype), fields(name = %prototype.name))]
	async fn create_floating_ip(
		&self,
		prototype: &FloatingIpPrototype,
	) -> Result<FloatingIp, VpcError> {
		let response = self
			.send(self.http.post(self.url("floating_ips")).json(prototype))
			.await?;
		let response = Self::check(response, "floating_ip", &prototype.name).await?;
		Ok(response.json().await?)
	}

	#[instrument(skip(self))]
	async fn delete_floating_ip(&self, id: &str) -> Result<(), VpcError> {
		let response = self
			.send(self.http.delete(self.url(&format!("floating_ips/{id}"))))
			.await?;
		Self::check(response, "floating_ip", id).await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn add_instance_network_interface_floating_ip(
		&self,
		instance_id: &str,
		interface_id: &str,
		floating_ip_id: &str,
	) -> Result<FloatingIp, VpcError> {
		let path = format!(
			"instances/{instance_id}/network_interfaces/{interface_id}/floating_ips/{floating_ip_id}"
		);
		let response = self.send(self.http.put(self.url(&path))).await?;
		let response = Self::check(response, "network_interface", interface_id).await?;
		Ok(response.json().await?)
	}

	#[instrument(skip(self))]
	async fn list_instance_network_interfaces(
		&self,
		instance_id: &str,
	) -> Result<Vec<NetworkInterface>, VpcError> {
		let response = self
			.send(
				self.http
					.get(self.url(&format!("instances/{instance_id}/network_interfaces"))),
			)
			.await?;
		let response = Self::check(response, "instance", instance_id).await?;
		let list: NetworkInterfaceList = response.json().await?;
		Ok(list.network_interfaces)
	}
}
