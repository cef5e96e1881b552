// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! [`Backend`] over a managed container service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use stratus_common_secret::SecretString;
use stratus_lifecycle::{
	invoke_published, poll_until_ready, Backend, ComputeUnit, ComputeUnitIdentity, Credential,
	CredentialCache, HttpTransport, InvocationRequest, InvocationResult, Invoker, LifecycleError,
	Observation, ResourceNamer, ResultMode, RuntimeMetadata, RuntimeSummary, SessionCache,
	StaticTokenSource, StopPolicy, TeardownReport, TokenSource, UnitRegistry, UnitSlot, UnitSpec,
	UnitStatus,
};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::auth::{AdcTokenSource, MetadataIdentityAuthority};
use crate::client::ServiceApi;
use crate::config::CloudRunConfig;
use crate::error::CloudRunError;
use crate::manifest;
use crate::run_client::{regional_endpoint, RunApiClient};
use crate::types::Service;

pub const PROVIDER: &str = "gcp_cloudrun";

const CONTROL_PLANE_TIMEOUT: Duration = Duration::from_secs(60);

/// Compute units backed by one service each.
pub struct CloudRunBackend {
	config: CloudRunConfig,
	api: Arc<dyn ServiceApi>,
	namer: ResourceNamer,
	version: String,
	registry: UnitRegistry,
	invoker: Invoker,
}

impl CloudRunBackend {
	pub fn new(
		config: CloudRunConfig,
		api: Arc<dyn ServiceApi>,
		invoker: Invoker,
	) -> Result<Self, LifecycleError> {
		Self::with_version(config, api, invoker, env!("CARGO_PKG_VERSION"))
	}

	/// `version` selects the image tag and is embedded in shared unit names.
	pub fn with_version(
		config: CloudRunConfig,
		api: Arc<dyn ServiceApi>,
		invoker: Invoker,
		version: &str,
	) -> Result<Self, LifecycleError> {
		let namer = ResourceNamer::new(config.name_prefix.clone(), version)?;
		Ok(Self {
			config,
			api,
			namer,
			version: version.to_string(),
			registry: UnitRegistry::new(),
			invoker,
		})
	}

	/// Backend talking to the regional control plane.
	///
	/// Control-plane calls use `admin_token` when given, Application Default
	/// Credentials otherwise. Invocations use identity tokens from the
	/// metadata server at `metadata_url`.
	pub fn connect(
		config: CloudRunConfig,
		admin_token: Option<SecretString>,
		metadata_url: &str,
	) -> Result<Self, LifecycleError> {
		let http = stratus_common_http::new_client_with_timeout(CONTROL_PLANE_TIMEOUT)
			.map_err(|e| LifecycleError::control_plane(format!("failed to build HTTP client: {e}")))?;
		let invoke_http = stratus_common_http::new_client()
			.map_err(|e| LifecycleError::control_plane(format!("failed to build HTTP client: {e}")))?;

		let source: Arc<dyn TokenSource> = match admin_token {
			Some(token) => {
				debug!("using pre-issued admin token");
				Arc::new(StaticTokenSource::new(Credential::new(
					token,
					Utc::now() + chrono::Duration::hours(1),
				)))
			}
			None => Arc::new(AdcTokenSource::new()),
		};
		let credentials = Arc::new(CredentialCache::with_margin(source, config.token_margin));

		let base_url = config
			.api_endpoint
			.clone()
			.unwrap_or_else(|| regional_endpoint(&config.region));
		let api = Arc::new(RunApiClient::new(
			http.clone(),
			base_url,
			config.project.clone(),
			credentials,
		));

		let authority = Arc::new(MetadataIdentityAuthority::new(http, metadata_url));
		let invoker = Invoker::new(
			Arc::new(HttpTransport::new(invoke_http)),
			SessionCache::new(authority, config.token_margin),
		);

		Self::new(config, api, invoker)
	}

	pub fn config(&self) -> &CloudRunConfig {
		&self.config
	}

	/// The unit this process last published for `identity`.
	pub async fn unit(
		&self,
		identity: &ComputeUnitIdentity,
	) -> Result<Option<ComputeUnit>, LifecycleError> {
		let name = self.namer.derive_name(identity)?;
		match self.registry.get(&name).await {
			Some(slot) => Ok(slot.current().await),
			None => Ok(None),
		}
	}

	pub fn registry(&self) -> &UnitRegistry {
		&self.registry
	}

	fn key_for(&self, name: &str) -> String {
		format!(
			"{PROVIDER}/{}/{}/{name}",
			self.config.region, self.config.project
		)
	}

	async fn observe(&self, name: &str) -> Result<Observation<Option<Url>>, LifecycleError> {
		let service = self.api.get_service(name).await?;
		let endpoint = service_url(&service)?;
		Ok(Observation::new(manifest::conditions(&service), endpoint))
	}

	/// Existing service for `name`, or a newly submitted one. The flag is true
	/// when the service was not created by this call.
	async fn create_or_adopt(
		&self,
		name: &str,
		identity: &ComputeUnitIdentity,
		spec: &UnitSpec,
	) -> Result<(ComputeUnit, bool), LifecycleError> {
		match self.api.get_service(name).await {
			Ok(service) => {
				let unit = adopt_service(&service)?;
				info!(unit = name, status = %unit.status(), "adopting existing service");
				if unit.status() == UnitStatus::Failed {
					return Err(LifecycleError::provisioning(
						name,
						"existing service reports Ready=False",
					));
				}
				return Ok((unit, true));
			}
			Err(CloudRunError::ServiceNotFound { .. }) => {}
			Err(e) => return Err(e.into()),
		}

		let image = manifest::image_reference(&self.config, &identity.logical_name, &self.version);
		let service = manifest::build_service(&self.config, name, identity, spec, image);

		match self.api.create_service(&service).await {
			Ok(created) => {
				let id = created
					.metadata
					.uid
					.clone()
					.unwrap_or_else(|| name.to_string());
				info!(unit = name, "service submitted");
				Ok((ComputeUnit::provisioning(id, name), false))
			}
			Err(CloudRunError::ServiceAlreadyExists { .. }) => {
				debug!(unit = name, "service created concurrently, waiting for it");
				Ok((ComputeUnit::provisioning(name, name), true))
			}
			Err(CloudRunError::Auth(e)) => Err(e.into()),
			Err(e) => Err(LifecycleError::provisioning(name, e.to_string())),
		}
	}

	/// Invoke the metadata route in document mode and return the document.
	async fn probe_metadata(
		&self,
		unit: &ComputeUnit,
		route: &str,
	) -> Result<Value, LifecycleError> {
		let request = InvocationRequest::new(json!({})).with_route(route);
		let document = self
			.invoker
			.invoke(unit, &request, ResultMode::Document)
			.await
			.map_err(|e| {
				LifecycleError::provisioning(&unit.name, format!("metadata probe failed: {e}"))
			})?
			.into_document()
			.unwrap_or(Value::Null);

		if document.get("preinstalls").is_none() {
			return Err(LifecycleError::provisioning(
				&unit.name,
				format!("metadata probe on {route} returned no preinstalls"),
			));
		}
		Ok(document)
	}

	/// Publish the provider's view of `name` into an empty slot so invocations
	/// from a fresh process reach units created elsewhere.
	async fn resolve_existing(&self, name: &str, slot: &UnitSlot) -> Result<(), LifecycleError> {
		let service = match self.api.get_service(name).await {
			Ok(service) => service,
			Err(CloudRunError::ServiceNotFound { .. }) => {
				return Err(LifecycleError::UnknownUnit {
					name: name.to_string(),
				})
			}
			Err(e) => return Err(e.into()),
		};

		let unit = adopt_service(&service)?;
		if !unit.status().accepts_invocations() {
			return Err(LifecycleError::NotReady {
				name: name.to_string(),
				status: unit.status(),
			});
		}
		debug!(unit = name, "resolved endpoint of existing service");
		slot.publish(&unit).await;
		Ok(())
	}

	/// Suspend or delete the unit published in `slot`.
	async fn stop_in_slot(
		&self,
		name: &str,
		slot: &UnitSlot,
	) -> Result<TeardownReport, LifecycleError> {
		let _guard = slot.begin().await;
		let policy = StopPolicy::from_delete_on_dismantle(self.config.delete_on_dismantle);
		let mut report = TeardownReport::new();

		let mut unit = match slot.current().await {
			Some(unit) => unit,
			None => match self.api.get_service(name).await {
				Ok(service) => adopt_service(&service)?,
				Err(CloudRunError::ServiceNotFound { .. }) => {
					debug!(unit = %name, "nothing to stop");
					return Ok(report);
				}
				Err(e) => return Err(e.into()),
			},
		};

		match (unit.status(), policy) {
			(UnitStatus::Deleted, _) => {
				slot.clear().await;
				return Ok(report);
			}
			(UnitStatus::Suspended, StopPolicy::Suspend) => return Ok(report),
			_ => {}
		}

		unit.transition(UnitStatus::Stopping)?;
		slot.publish(&unit).await;

		match policy {
			StopPolicy::Delete => {
				let deleted = match self.api.delete_service(name).await {
					Ok(()) | Err(CloudRunError::ServiceNotFound { .. }) => Ok(()),
					Err(e) => Err(LifecycleError::from(e)),
				};
				if report.record("delete service", deleted).is_none() {
					unit.transition(UnitStatus::Failed)?;
					slot.publish(&unit).await;
					return Err(report.into_error(name));
				}
				unit.transition(UnitStatus::Deleted)?;
				slot.clear().await;
				info!(unit = %name, "service deleted");
			}
			StopPolicy::Suspend => {
				// Idle services scale to zero; only the local status changes.
				report.record("scale to zero", Ok(()));
				unit.transition(UnitStatus::Suspended)?;
				slot.publish(&unit).await;
				info!(unit = %name, "service suspended");
			}
		}

		if !report.is_clean() {
			warn!(unit = %name, failures = ?report.failures, "teardown finished with failures");
		}
		Ok(report)
	}
}

fn service_url(service: &Service) -> Result<Option<Url>, LifecycleError> {
	service
		.url()
		.map(Url::parse)
		.transpose()
		.map_err(|e| {
			LifecycleError::control_plane(format!(
				"service {} published an invalid url: {e}",
				service.name()
			))
		})
}

fn adopt_service(service: &Service) -> Result<ComputeUnit, LifecycleError> {
	let id = service
		.metadata
		.uid
		.clone()
		.unwrap_or_else(|| service.name().to_string());
	Ok(ComputeUnit::adopt(
		id,
		service.name(),
		manifest::observed_status(service),
		service_url(service)?,
		service.metadata.creation_timestamp,
	))
}

#[async_trait]
impl Backend for CloudRunBackend {
	fn provider(&self) -> &'static str {
		PROVIDER
	}

	#[instrument(skip(self, spec), fields(provider = PROVIDER, identity = %identity))]
	async fn create_runtime(
		&self,
		identity: &ComputeUnitIdentity,
		spec: &UnitSpec,
	) -> Result<RuntimeMetadata, LifecycleError> {
		let name = self.namer.derive_name(identity)?;
		let slot = self.registry.slot(&name).await;
		let _guard = slot.begin().await;

		if let Some(unit) = slot.current().await {
			if let (true, Some(endpoint)) = (unit.status().accepts_invocations(), unit.endpoint()) {
				debug!(unit = %name, "reusing ready unit");
				return Ok(RuntimeMetadata {
					key: self.key_for(&name),
					endpoint: endpoint.clone(),
					status: unit.status(),
					adopted: true,
					details: None,
					name,
				});
			}
		}

		let (mut unit, adopted) = self.create_or_adopt(&name, identity, spec).await?;

		if !unit.status().accepts_invocations() {
			slot.publish(&unit).await;
			let polled = poll_until_ready(&name, &self.config.readiness, || self.observe(&name))
				.await
				.and_then(|endpoint| {
					endpoint.ok_or_else(|| {
						LifecycleError::provisioning(&name, "service became ready without a url")
					})
				});
			match polled {
				Ok(endpoint) => unit.mark_ready(endpoint)?,
				Err(e) => {
					if unit.transition(UnitStatus::Failed).is_ok() {
						slot.publish(&unit).await;
					}
					return Err(e);
				}
			}
			slot.publish(&unit).await;
		}

		let endpoint = unit.endpoint().cloned().ok_or_else(|| LifecycleError::NotReady {
			name: name.clone(),
			status: unit.status(),
		})?;
		info!(unit = %name, endpoint = %endpoint, adopted, "service ready");

		let details = match self.config.metadata_route.as_deref() {
			Some(route) => Some(self.probe_metadata(&unit, route).await?),
			None => None,
		};

		Ok(RuntimeMetadata {
			key: self.key_for(&name),
			endpoint,
			status: unit.status(),
			adopted,
			details,
			name,
		})
	}

	#[instrument(skip(self, request), fields(provider = PROVIDER, identity = %identity))]
	async fn invoke(
		&self,
		identity: &ComputeUnitIdentity,
		request: &InvocationRequest,
		mode: ResultMode,
	) -> Result<InvocationResult, LifecycleError> {
		let name = self.namer.derive_name(identity)?;
		let slot = self.registry.slot(&name).await;
		if slot.current().await.is_none() {
			if let Err(e) = self.resolve_existing(&name, &slot).await {
				drop(slot);
				self.registry.prune(&name).await;
				return Err(e);
			}
		}
		invoke_published(&name, &slot, &self.invoker, request, mode).await
	}

	#[instrument(skip(self), fields(provider = PROVIDER, identity = %identity))]
	async fn stop(&self, identity: &ComputeUnitIdentity) -> Result<TeardownReport, LifecycleError> {
		let name = self.namer.derive_name(identity)?;
		let slot = self.registry.slot(&name).await;
		let stopped = self.stop_in_slot(&name, &slot).await;
		drop(slot);
		self.registry.prune(&name).await;
		stopped
	}

	async fn get_runtime_key(
		&self,
		identity: &ComputeUnitIdentity,
	) -> Result<String, LifecycleError> {
		let name = self.namer.derive_name(identity)?;
		Ok(self.key_for(&name))
	}

	#[instrument(skip(self), fields(provider = PROVIDER))]
	async fn list_runtimes(&self) -> Result<Vec<RuntimeSummary>, LifecycleError> {
		let prefix = format!("{}-", self.namer.prefix());
		let services = self.api.list_services().await?;

		let mut runtimes: Vec<RuntimeSummary> = services
			.iter()
			.filter(|s| s.name().starts_with(&prefix))
			.map(|s| RuntimeSummary {
				name: s.name().to_string(),
				identity: self.namer.parse_name(s.name()).ok(),
				status: manifest::observed_status(s),
				created_at: s.metadata.creation_timestamp,
			})
			.collect();
		runtimes.sort_by(|a, b| a.name.cmp(&b.name));
		debug!(count = runtimes.len(), "listed services");
		Ok(runtimes)
	}
}
