// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! [`Backend`] over VPC virtual server instances with floating IPs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use stratus_common_secret::SecretString;
use stratus_lifecycle::{
	invoke_published, poll_until_ready, Backend, Compensation, ComputeUnit, ComputeUnitIdentity,
	Condition, CredentialCache, HttpTransport, InvocationRequest, InvocationResult,
	InvocationTransport, Invoker, LifecycleError, Observation, ResourceKind, ResourceNamer, ResultMode, RuntimeMetadata,
	RuntimeSummary, SessionCache, StopPolicy, TeardownReport, UnitRegistry, UnitSlot, UnitSpec,
	UnitStatus,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::client::VpcApi;
use crate::config::VpcConfig;
use crate::error::VpcError;
use crate::http_client::VpcHttpClient;
use crate::iam::IamTokenSource;
use crate::prototype;
use crate::types::{Instance, InstanceAction, STATUS_FAILED, STATUS_RUNNING, STATUS_STOPPED};
use crate::unit_token::UnitTokens;

pub const PROVIDER: &str = "ibm_vpc";

const CONTROL_PLANE_TIMEOUT: Duration = Duration::from_secs(60);

/// Unit status for an instance status string.
pub fn unit_status(instance_status: &str) -> UnitStatus {
	match instance_status {
		STATUS_RUNNING => UnitStatus::Ready,
		STATUS_STOPPED | "stopping" | "paused" | "pausing" | "suspended" => UnitStatus::Suspended,
		STATUS_FAILED => UnitStatus::Failed,
		"deleting" => UnitStatus::Stopping,
		_ => UnitStatus::Provisioning,
	}
}

/// `ibm_vpc/{address}/{instance_id}/{runtime}`
pub fn runtime_key(address: &str, instance_id: &str, runtime: &str) -> String {
	format!("{PROVIDER}/{address}/{instance_id}/{}", runtime.trim_matches('/'))
}

/// Compute units backed by one virtual server instance each, reachable
/// through a floating IP.
///
/// Units are keyed by their base name. Call-scoped identities always map to
/// the same base; shared identities get a random base on first create which
/// is remembered for the life of the backend.
///
/// Invocations authenticate with the unit's own token from [`UnitTokens`],
/// never with the account's IAM token.
pub struct VpcBackend {
	config: VpcConfig,
	api: Arc<dyn VpcApi>,
	namer: ResourceNamer,
	registry: UnitRegistry,
	invoker: Invoker,
	tokens: Arc<UnitTokens>,
	bases: Mutex<HashMap<ComputeUnitIdentity, String>>,
}

impl VpcBackend {
	pub fn new(
		config: VpcConfig,
		api: Arc<dyn VpcApi>,
		transport: Arc<dyn InvocationTransport>,
		tokens: Arc<UnitTokens>,
	) -> Result<Self, LifecycleError> {
		let namer = ResourceNamer::new(config.name_prefix.clone(), env!("CARGO_PKG_VERSION"))?;
		let invoker = Invoker::new(
			transport,
			SessionCache::new(tokens.clone(), config.token_margin),
		);
		Ok(Self {
			config,
			api,
			namer,
			registry: UnitRegistry::new(),
			invoker,
			tokens,
			bases: Mutex::new(HashMap::new()),
		})
	}

	/// Backend talking to the regional endpoint with IAM tokens exchanged for
	/// `api_key`. Unit tokens are derived from the same key.
	pub fn connect(config: VpcConfig, api_key: SecretString) -> Result<Self, LifecycleError> {
		let http = stratus_common_http::new_client_with_timeout(CONTROL_PLANE_TIMEOUT)
			.map_err(|e| LifecycleError::control_plane(format!("failed to build HTTP client: {e}")))?;
		let invoke_http = stratus_common_http::new_client()
			.map_err(|e| LifecycleError::control_plane(format!("failed to build HTTP client: {e}")))?;

		let tokens = Arc::new(UnitTokens::new(api_key.clone()));
		let source = Arc::new(IamTokenSource::new(
			http.clone(),
			config.iam_url.clone(),
			api_key,
		));
		let credentials = Arc::new(CredentialCache::with_margin(source, config.token_margin));

		let api = Arc::new(VpcHttpClient::new(
			http,
			config.endpoint.clone(),
			config.api_version.clone(),
			credentials,
		));

		info!(region = config.region(), "VPC backend configured");
		Self::new(config, api, Arc::new(HttpTransport::new(invoke_http)), tokens)
	}

	pub fn config(&self) -> &VpcConfig {
		&self.config
	}

	/// The unit this process last published for `identity`.
	pub async fn unit(
		&self,
		identity: &ComputeUnitIdentity,
	) -> Result<Option<ComputeUnit>, LifecycleError> {
		let Some(base) = self.known_base(identity).await? else {
			return Ok(None);
		};
		match self.registry.get(&base).await {
			Some(slot) => Ok(slot.current().await),
			None => Ok(None),
		}
	}

	pub fn registry(&self) -> &UnitRegistry {
		&self.registry
	}

	pub fn tokens(&self) -> &UnitTokens {
		&self.tokens
	}

	/// Base name for `identity`, allocating one for shared identities.
	async fn allocate_base(&self, identity: &ComputeUnitIdentity) -> Result<String, LifecycleError> {
		if identity.call_scope().is_some() {
			return Ok(self.namer.unit_base(identity)?);
		}
		let mut bases = self.bases.lock().await;
		if let Some(base) = bases.get(identity) {
			return Ok(base.clone());
		}
		let base = self.namer.unit_base(identity)?;
		debug!(identity = %identity, base = %base, "allocated unit base name");
		bases.insert(identity.clone(), base.clone());
		Ok(base)
	}

	async fn known_base(
		&self,
		identity: &ComputeUnitIdentity,
	) -> Result<Option<String>, LifecycleError> {
		if identity.call_scope().is_some() {
			return Ok(Some(self.namer.unit_base(identity)?));
		}
		Ok(self.bases.lock().await.get(identity).cloned())
	}

	async fn forget(&self, identity: &ComputeUnitIdentity) {
		self.bases.lock().await.remove(identity);
	}

	fn endpoint_for(&self, address: &str) -> Result<Url, LifecycleError> {
		Url::parse(&format!("http://{address}:{}/", self.config.port)).map_err(|e| {
			LifecycleError::control_plane(format!("invalid floating ip address {address}: {e}"))
		})
	}

	/// First floating IP bound to any interface of the instance.
	async fn attached_address(&self, instance_id: &str) -> Result<Option<String>, VpcError> {
		let interfaces = self.api.list_instance_network_interfaces(instance_id).await?;
		Ok(interfaces
			.into_iter()
			.flat_map(|nic| nic.floating_ips)
			.map(|fip| fip.address)
			.next())
	}

	async fn observe_status(
		&self,
		instance_id: &str,
		expected: &str,
	) -> Result<Observation<()>, LifecycleError> {
		let instance = self.api.get_instance(instance_id).await?;
		if instance.status == STATUS_FAILED && expected != STATUS_FAILED {
			return Err(LifecycleError::provisioning(
				&instance.name,
				"instance entered the failed state",
			));
		}
		Ok(Observation::new(
			vec![Condition::new("status", instance.status == expected).with_message(&instance.status)],
			(),
		))
	}

	/// Reuse the floating IP named for `base` when it is already bound to the
	/// instance's primary interface; otherwise allocate (if needed) and attach.
	async fn ensure_floating_ip(
		&self,
		instance: &Instance,
		base: &str,
		undo: &mut Compensation,
	) -> Result<String, LifecycleError> {
		let name = self.namer.component_name(base, ResourceKind::Address)?;

		let interface = match instance.primary_interface() {
			Some(nic) => nic.id.clone(),
			None => self
				.api
				.list_instance_network_interfaces(&instance.id)
				.await?
				.into_iter()
				.next()
				.map(|nic| nic.id)
				.ok_or_else(|| {
					LifecycleError::provisioning(&instance.name, "instance has no network interface")
				})?,
		};

		let existing = self.api.find_floating_ip(&name).await?;

		let fip = match existing {
			Some(fip) if fip.is_bound_to(&interface) => {
				debug!(address = %fip.address, interface = %interface, "floating ip already attached");
				return Ok(fip.address);
			}
			Some(fip) => {
				debug!(address = %fip.address, "reusing unattached floating ip");
				fip
			}
			None => {
				let fip = self
					.api
					.create_floating_ip(&prototype::floating_ip_prototype(&self.config, &name))
					.await?;
				info!(name = %name, address = %fip.address, "floating ip allocated");

				let api = self.api.clone();
				let id = fip.id.clone();
				undo.register(format!("release floating ip {}", fip.address), move || async move {
					api.delete_floating_ip(&id).await.map_err(LifecycleError::from)
				});
				fip
			}
		};

		let attached = self
			.api
			.add_instance_network_interface_floating_ip(&instance.id, &interface, &fip.id)
			.await?;
		info!(address = %attached.address, interface = %interface, "floating ip attached");
		Ok(attached.address)
	}

	/// Create or adopt the instance, bind its address and wait for it to run.
	/// Every resource created here registers its undo step in `undo`.
	async fn provision(
		&self,
		identity: &ComputeUnitIdentity,
		base: &str,
		profile: &str,
		slot: &UnitSlot,
		undo: &mut Compensation,
	) -> Result<RuntimeMetadata, LifecycleError> {
		let instance_name = self.namer.component_name(base, ResourceKind::Instance)?;

		let (instance, adopted) = match self.api.find_instance(&instance_name).await? {
			Some(instance) => {
				info!(unit = %instance_name, status = %instance.status, "adopting existing instance");
				(instance, true)
			}
			None => {
				let user_data = self.tokens.user_data(&instance_name)?;
				let prototype = prototype::instance_prototype(
					&self.config,
					&self.namer,
					base,
					profile,
					Some(user_data),
				)?;
				let instance = self.api.create_instance(&prototype).await.map_err(|e| match e {
					VpcError::Auth(e) => LifecycleError::Auth(e),
					other => LifecycleError::provisioning(&instance_name, other.to_string()),
				})?;
				info!(unit = %instance_name, instance_id = %instance.id, "instance created");

				let api = self.api.clone();
				let id = instance.id.clone();
				undo.register(format!("delete instance {id}"), move || async move {
					api.delete_instance(&id).await.map_err(LifecycleError::from)
				});
				(instance, false)
			}
		};

		// Running instances still go through the address and readiness steps.
		let mut unit = ComputeUnit::adopt(
			&instance.id,
			&instance_name,
			UnitStatus::Provisioning,
			None,
			instance.created_at,
		);
		match unit_status(&instance.status) {
			UnitStatus::Provisioning | UnitStatus::Ready => {}
			UnitStatus::Suspended => {
				info!(unit = %instance_name, "starting stopped instance");
				self.api
					.create_instance_action(&instance.id, InstanceAction::Start)
					.await?;
			}
			other => {
				return Err(LifecycleError::provisioning(
					&instance_name,
					format!("existing instance is {other} ({})", instance.status),
				))
			}
		}
		slot.publish(&unit).await;

		let address = self.ensure_floating_ip(&instance, base, undo).await?;
		self.tokens.bind(&address, &instance_name).await;
		unit.set_addresses(vec![address.clone()]);
		slot.publish(&unit).await;

		poll_until_ready(&instance_name, &self.config.readiness, || {
			self.observe_status(&instance.id, STATUS_RUNNING)
		})
		.await?;

		let endpoint = self.endpoint_for(&address)?;
		unit.mark_ready(endpoint.clone())?;
		slot.publish(&unit).await;
		info!(unit = %instance_name, endpoint = %endpoint, adopted, "instance ready");

		Ok(RuntimeMetadata {
			name: instance_name,
			key: runtime_key(&address, &instance.id, &identity.logical_name),
			endpoint,
			status: unit.status(),
			adopted,
			details: Some(json!({
				"instance_id": instance.id,
				"address": address,
			})),
		})
	}

	/// Publish the provider's view of `base` into an empty slot so invocations
	/// from a fresh process reach units created elsewhere.
	async fn resolve_existing(&self, base: &str, slot: &UnitSlot) -> Result<(), LifecycleError> {
		let name = self.namer.component_name(base, ResourceKind::Instance)?;
		let instance = self
			.api
			.find_instance(&name)
			.await?
			.ok_or_else(|| LifecycleError::UnknownUnit { name: name.clone() })?;

		let status = unit_status(&instance.status);
		if status != UnitStatus::Ready {
			return Err(LifecycleError::NotReady { name, status });
		}
		let address = self
			.attached_address(&instance.id)
			.await?
			.ok_or_else(|| LifecycleError::NotReady {
				name: name.clone(),
				status: UnitStatus::Provisioning,
			})?;

		let mut unit = ComputeUnit::adopt(
			&instance.id,
			&name,
			status,
			Some(self.endpoint_for(&address)?),
			instance.created_at,
		);
		self.tokens.bind(&address, &name).await;
		unit.set_addresses(vec![address]);
		debug!(unit = %name, "resolved endpoint of existing instance");
		slot.publish(&unit).await;
		Ok(())
	}

	/// Stop action, then wait for the instance to report `stopped`.
	async fn suspend(&self, instance_id: &str, name: &str) -> Result<(), LifecycleError> {
		self.api
			.create_instance_action(instance_id, InstanceAction::Stop)
			.await?;
		poll_until_ready(name, &self.config.readiness, || {
			self.observe_status(instance_id, STATUS_STOPPED)
		})
		.await
	}

	/// Release every floating IP of the instance, then delete it. Only a
	/// failed delete is fatal.
	async fn dismantle(&self, instance_id: &str, report: &mut TeardownReport) -> bool {
		let interfaces = match self.api.list_instance_network_interfaces(instance_id).await {
			Err(e) if e.is_not_found() => Ok(Vec::new()),
			other => other.map_err(LifecycleError::from),
		};
		if let Some(interfaces) = report.record("list network interfaces", interfaces) {
			for fip in interfaces.iter().flat_map(|nic| nic.floating_ips.iter()) {
				let released = match self.api.delete_floating_ip(&fip.id).await {
					Err(e) if !e.is_not_found() => Err(LifecycleError::from(e)),
					_ => Ok(()),
				};
				if report
					.record(format!("release floating ip {}", fip.address), released)
					.is_some()
				{
					self.tokens.unbind(&fip.address).await;
				}
			}
		}

		let deleted = match self.api.delete_instance(instance_id).await {
			Err(e) if !e.is_not_found() => Err(LifecycleError::from(e)),
			_ => Ok(()),
		};
		report.record("delete instance", deleted).is_some()
	}

	/// Suspend or dismantle the unit published in `slot`.
	async fn stop_in_slot(
		&self,
		identity: &ComputeUnitIdentity,
		base: &str,
		slot: &UnitSlot,
	) -> Result<TeardownReport, LifecycleError> {
		let mut report = TeardownReport::new();
		let _guard = slot.begin().await;
		let policy = StopPolicy::from_delete_on_dismantle(self.config.delete_on_dismantle);
		let name = self.namer.component_name(base, ResourceKind::Instance)?;

		let mut unit = match slot.current().await {
			Some(unit) => unit,
			None => match self.api.find_instance(&name).await? {
				Some(instance) => ComputeUnit::adopt(
					&instance.id,
					&name,
					unit_status(&instance.status),
					None,
					instance.created_at,
				),
				None => {
					debug!(unit = %name, "nothing to stop");
					return Ok(report);
				}
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
				if !self.dismantle(&unit.id, &mut report).await {
					unit.transition(UnitStatus::Failed)?;
					slot.publish(&unit).await;
					return Err(report.into_error(name));
				}
				unit.transition(UnitStatus::Deleted)?;
				slot.clear().await;
				self.forget(identity).await;
				info!(unit = %name, "instance deleted");
			}
			StopPolicy::Suspend => {
				let stopped = self.suspend(&unit.id, &name).await;
				if report.record("stop instance", stopped).is_none() {
					unit.transition(UnitStatus::Failed)?;
					slot.publish(&unit).await;
					return Err(report.into_error(name));
				}
				unit.transition(UnitStatus::Suspended)?;
				slot.publish(&unit).await;
				info!(unit = %name, addresses = ?unit.addresses(), "instance suspended");
			}
		}

		if !report.is_clean() {
			warn!(unit = %name, failures = ?report.failures, "teardown finished with failures");
		}
		Ok(report)
	}
}

#[async_trait]
impl Backend for VpcBackend {
	fn provider(&self) -> &'static str {
		PROVIDER
	}

	#[instrument(skip(self, spec), fields(provider = PROVIDER, identity = %identity))]
	async fn create_runtime(
		&self,
		identity: &ComputeUnitIdentity,
		spec: &UnitSpec,
	) -> Result<RuntimeMetadata, LifecycleError> {
		let profile = prototype::profile_for(&self.config, identity, spec)?;
		let base = self.allocate_base(identity).await?;
		let slot = self.registry.slot(&base).await;
		let _guard = slot.begin().await;

		if let Some(unit) = slot.current().await {
			if let (true, Some(endpoint), Some(address)) = (
				unit.status().accepts_invocations(),
				unit.endpoint(),
				unit.addresses().first(),
			) {
				debug!(unit = %unit.name, "reusing ready unit");
				return Ok(RuntimeMetadata {
					key: runtime_key(address, &unit.id, &identity.logical_name),
					endpoint: endpoint.clone(),
					status: unit.status(),
					adopted: true,
					details: None,
					name: unit.name.clone(),
				});
			}
		}

		let mut undo = Compensation::new(&base);
		let provisioned = self
			.provision(identity, &base, &profile, &slot, &mut undo)
			.await;
		match provisioned {
			Ok(metadata) => {
				undo.commit();
				Ok(metadata)
			}
			Err(e) => {
				let err = undo.abort(e).await;
				if let Some(mut unit) = slot.current().await {
					if unit.transition(UnitStatus::Failed).is_ok() {
						slot.publish(&unit).await;
					}
				}
				Err(err)
			}
		}
	}

	#[instrument(skip(self, request), fields(provider = PROVIDER, identity = %identity))]
	async fn invoke(
		&self,
		identity: &ComputeUnitIdentity,
		request: &InvocationRequest,
		mode: ResultMode,
	) -> Result<InvocationResult, LifecycleError> {
		let base = self
			.known_base(identity)
			.await?
			.ok_or_else(|| LifecycleError::UnknownUnit {
				name: identity.to_string(),
			})?;
		let slot = self.registry.slot(&base).await;
		if slot.current().await.is_none() {
			if let Err(e) = self.resolve_existing(&base, &slot).await {
				drop(slot);
				self.registry.prune(&base).await;
				return Err(e);
			}
		}
		invoke_published(&base, &slot, &self.invoker, request, mode).await
	}

	#[instrument(skip(self), fields(provider = PROVIDER, identity = %identity))]
	async fn stop(&self, identity: &ComputeUnitIdentity) -> Result<TeardownReport, LifecycleError> {
		let Some(base) = self.known_base(identity).await? else {
			debug!("no unit was created for this identity");
			return Ok(TeardownReport::new());
		};
		let slot = self.registry.slot(&base).await;
		let stopped = self.stop_in_slot(identity, &base, &slot).await;
		drop(slot);
		self.registry.prune(&base).await;
		stopped
	}

	async fn get_runtime_key(
		&self,
		identity: &ComputeUnitIdentity,
	) -> Result<String, LifecycleError> {
		let base = self
			.known_base(identity)
			.await?
			.ok_or_else(|| LifecycleError::UnknownUnit {
				name: identity.to_string(),
			})?;

		if let Some(unit) = self.registry.slot(&base).await.current().await {
			if let Some(address) = unit.addresses().first() {
				return Ok(runtime_key(address, &unit.id, &identity.logical_name));
			}
		}

		let name = self.namer.component_name(&base, ResourceKind::Instance)?;
		let instance = self
			.api
			.find_instance(&name)
			.await?
			.ok_or_else(|| LifecycleError::UnknownUnit { name: name.clone() })?;
		let address = self
			.attached_address(&instance.id)
			.await?
			.ok_or_else(|| LifecycleError::NotReady {
				name,
				status: unit_status(&instance.status),
			})?;
		Ok(runtime_key(&address, &instance.id, &identity.logical_name))
	}

	#[instrument(skip(self), fields(provider = PROVIDER))]
	async fn list_runtimes(&self) -> Result<Vec<RuntimeSummary>, LifecycleError> {
		let prefix = format!("{}-", self.namer.prefix());
		let suffix = format!("-{}", ResourceKind::Instance.suffix());
		let instances = self.api.list_instances().await?;
		let bases = self.bases.lock().await;

		let mut runtimes: Vec<RuntimeSummary> = instances
			.iter()
			.filter(|i| i.name.starts_with(&prefix) && i.name.ends_with(&suffix))
			.map(|i| {
				let base = i.name.trim_end_matches(&suffix);
				RuntimeSummary {
					name: i.name.clone(),
					identity: bases
						.iter()
						.find(|(_, b)| b.as_str() == base)
						.map(|(identity, _)| identity.clone()),
					status: unit_status(&i.status),
					created_at: i.created_at,
				}
			})
			.collect();
		runtimes.sort_by(|a, b| a.name.cmp(&b.name));
		debug!(count = runtimes.len(), "listed instances");
		Ok(runtimes)
	}
}
