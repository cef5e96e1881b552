// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};
use stratus_backend_cloudrun::types::{ServiceCondition, ServiceStatus};
use stratus_backend_cloudrun::{CloudRunBackend, CloudRunConfig, CloudRunError, Service, ServiceApi};
use stratus_lifecycle::{
	Backend, ComputeUnitIdentity, Credential, CredentialCache, InvocationRequest,
	InvocationTransport, Invoker, LifecycleError, ReadinessPolicy, ResultMode, SessionCache,
	StaticTokenSource, TransportResponse, UnitSpec, UnitStatus,
};

const URL: &str = "https://svc.example/";

fn status(ready: bool) -> ServiceStatus {
	let state = if ready { "True" } else { "Unknown" };
	ServiceStatus {
		url: ready.then(|| URL.to_string()),
		conditions: ["Ready", "ConfigurationsReady", "RoutesReady"]
			.iter()
			.map(|kind| ServiceCondition {
				type_: kind.to_string(),
				status: state.to_string(),
				reason: None,
				message: None,
			})
			.collect(),
		observed_generation: Some(1),
	}
}

/// In-memory control plane. Successive gets of an existing service walk
/// through `script`; the last entry sticks.
struct MockServiceApi {
	services: Mutex<HashMap<String, Service>>,
	script: Mutex<VecDeque<ServiceStatus>>,
	polls: AtomicUsize,
	creates: AtomicUsize,
	deletes: AtomicUsize,
	fail_delete: bool,
}

impl MockServiceApi {
	fn new(script: Vec<ServiceStatus>) -> Self {
		Self {
			services: Mutex::new(HashMap::new()),
			script: Mutex::new(script.into()),
			polls: AtomicUsize::new(0),
			creates: AtomicUsize::new(0),
			deletes: AtomicUsize::new(0),
			fail_delete: false,
		}
	}

	fn failing_delete(mut self) -> Self {
		self.fail_delete = true;
		self
	}

	fn insert(&self, name: &str, status: ServiceStatus) {
		let mut service = Service::default();
		service.metadata.name = name.to_string();
		service.status = Some(status);
		self.services
			.lock()
			.unwrap()
			.insert(name.to_string(), service);
	}
}

#[async_trait]
impl ServiceApi for MockServiceApi {
	async fn get_service(&self, name: &str) -> Result<Service, CloudRunError> {
		let mut service = self
			.services
			.lock()
			.unwrap()
			.get(name)
			.cloned()
			.ok_or_else(|| CloudRunError::ServiceNotFound {
				name: name.to_string(),
			})?;

		self.polls.fetch_add(1, Ordering::SeqCst);
		let mut script = self.script.lock().unwrap();
		let next = if script.len() > 1 {
			script.pop_front()
		} else {
			script.front().cloned()
		};
		if let Some(status) = next {
			service.status = Some(status);
		}
		Ok(service)
	}

	async fn create_service(&self, service: &Service) -> Result<Service, CloudRunError> {
		let mut services = self.services.lock().unwrap();
		if services.contains_key(service.name()) {
			return Err(CloudRunError::ServiceAlreadyExists {
				name: service.name().to_string(),
			});
		}
		self.creates.fetch_add(1, Ordering::SeqCst);
		let mut created = service.clone();
		created.metadata.uid = Some(format!("uid-{}", service.name()));
		services.insert(service.name().to_string(), created.clone());
		Ok(created)
	}

	async fn list_services(&self) -> Result<Vec<Service>, CloudRunError> {
		Ok(self.services.lock().unwrap().values().cloned().collect())
	}

	async fn delete_service(&self, name: &str) -> Result<(), CloudRunError> {
		self.deletes.fetch_add(1, Ordering::SeqCst);
		if self.fail_delete {
			return Err(CloudRunError::ApiError {
				status: 500,
				message: "backend unavailable".to_string(),
			});
		}
		self.services
			.lock()
			.unwrap()
			.remove(name)
			.map(|_| ())
			.ok_or_else(|| CloudRunError::ServiceNotFound {
				name: name.to_string(),
			})
	}
}

/// Records every POST. The metadata route answers with a document, every
/// other route with an activation id.
#[derive(Default)]
struct RecordingTransport {
	requests: Mutex<Vec<(String, String, Value)>>,
}

#[async_trait]
impl InvocationTransport for RecordingTransport {
	async fn post_json(
		&self,
		url: &str,
		bearer: &str,
		payload: &Value,
	) -> Result<TransportResponse, LifecycleError> {
		self.requests
			.lock()
			.unwrap()
			.push((url.to_string(), bearer.to_string(), payload.clone()));

		let (status, body) = if url.ends_with("/preinstalls") {
			(200, json!({"preinstalls": [["numpy", true]]}))
		} else {
			(202, json!({"activationId": "abc123"}))
		};
		Ok(TransportResponse {
			status,
			body: Bytes::from(body.to_string()),
		})
	}
}

fn identity() -> ComputeUnitIdentity {
	ComputeUnitIdentity::new("py39", 256).for_call("7", "3")
}

fn config(delete_on_dismantle: bool, budget: u32) -> CloudRunConfig {
	let mut config = CloudRunConfig::new("proj", "us-east1");
	config.delete_on_dismantle = delete_on_dismantle;
	config.readiness = ReadinessPolicy::new(budget, Duration::from_millis(5));
	config
}

fn backend(
	config: CloudRunConfig,
	api: Arc<MockServiceApi>,
	transport: Arc<RecordingTransport>,
) -> CloudRunBackend {
	let credential = Credential::new("id-token".into(), Utc::now() + chrono::Duration::hours(1));
	let cache = CredentialCache::new(Arc::new(StaticTokenSource::new(credential)));
	let invoker = Invoker::new(
		transport,
		SessionCache::new(Arc::new(cache), Duration::from_secs(60)),
	);
	CloudRunBackend::with_version(config, api, invoker, "0.4.1").unwrap()
}

#[tokio::test]
async fn create_invoke_and_suspend() {
	let api = Arc::new(MockServiceApi::new(vec![
		status(false),
		status(false),
		status(true),
	]));
	let transport = Arc::new(RecordingTransport::default());
	let backend = backend(config(false, 5), api.clone(), transport.clone());

	let metadata = backend
		.create_runtime(&identity(), &UnitSpec::default())
		.await
		.unwrap();

	assert_eq!(metadata.name, "stratus-7-3-py39-256mb");
	assert_eq!(metadata.endpoint.as_str(), URL);
	assert_eq!(metadata.status, UnitStatus::Ready);
	assert!(!metadata.adopted);
	assert!(metadata.details.unwrap().get("preinstalls").is_some());
	assert_eq!(api.polls.load(Ordering::SeqCst), 3);
	assert_eq!(api.creates.load(Ordering::SeqCst), 1);

	let result = backend
		.invoke(
			&identity(),
			&InvocationRequest::new(json!({"x": 1})).with_route("/"),
			ResultMode::Activation,
		)
		.await
		.unwrap();
	assert_eq!(result.activation_id(), Some("abc123"));

	{
		let requests = transport.requests.lock().unwrap();
		assert_eq!(requests.len(), 2);
		assert_eq!(requests[0].0, "https://svc.example/preinstalls");
		assert_eq!(requests[1].0, URL);
		assert_eq!(requests[1].1, "id-token");
		assert_eq!(requests[1].2, json!({"x": 1}));
	}

	let unit = backend.unit(&identity()).await.unwrap().unwrap();
	assert_eq!(unit.status(), UnitStatus::Running);

	let report = backend.stop(&identity()).await.unwrap();
	assert!(report.is_clean());
	assert_eq!(api.deletes.load(Ordering::SeqCst), 0);

	let unit = backend.unit(&identity()).await.unwrap().unwrap();
	assert_eq!(unit.status(), UnitStatus::Suspended);
}

#[tokio::test]
async fn concurrent_creates_share_one_service() {
	let api = Arc::new(MockServiceApi::new(vec![status(false), status(true)]));
	let backend = Arc::new(backend(
		config(false, 5),
		api.clone(),
		Arc::new(RecordingTransport::default()),
	));

	let a = {
		let backend = backend.clone();
		tokio::spawn(async move { backend.create_runtime(&identity(), &UnitSpec::default()).await })
	};
	let b = {
		let backend = backend.clone();
		tokio::spawn(async move { backend.create_runtime(&identity(), &UnitSpec::default()).await })
	};
	let a = a.await.unwrap().unwrap();
	let b = b.await.unwrap().unwrap();

	assert_eq!(a.name, b.name);
	assert_eq!(a.endpoint, b.endpoint);
	assert_eq!(api.creates.load(Ordering::SeqCst), 1);
	assert_eq!(api.services.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn exhausted_budget_fails_the_unit() {
	let api = Arc::new(MockServiceApi::new(vec![status(false)]));
	let backend = backend(
		config(false, 3),
		api.clone(),
		Arc::new(RecordingTransport::default()),
	);

	let err = backend
		.create_runtime(&identity(), &UnitSpec::default())
		.await
		.unwrap_err();

	match err {
		LifecycleError::ProvisioningTimeout {
			attempts,
			last_status,
			..
		} => {
			assert_eq!(attempts, 3);
			assert!(last_status.contains("Ready=false"));
		}
		other => panic!("unexpected error: {other:?}"),
	}
	assert_eq!(api.polls.load(Ordering::SeqCst), 3);

	let unit = backend.unit(&identity()).await.unwrap().unwrap();
	assert_eq!(unit.status(), UnitStatus::Failed);
	assert!(unit.endpoint().is_none());
}

#[tokio::test]
async fn invoke_while_provisioning_sends_nothing() {
	let api = Arc::new(MockServiceApi::new(vec![status(false)]));
	let transport = Arc::new(RecordingTransport::default());
	let backend = backend(config(false, 3), api.clone(), transport.clone());
	api.insert("stratus-7-3-py39-256mb", status(false));

	let err = backend
		.invoke(
			&identity(),
			&InvocationRequest::new(json!({"x": 1})),
			ResultMode::Activation,
		)
		.await
		.unwrap_err();

	assert!(matches!(
		err,
		LifecycleError::NotReady {
			status: UnitStatus::Provisioning,
			..
		}
	));
	assert!(transport.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invoke_unknown_unit_is_an_error() {
	let api = Arc::new(MockServiceApi::new(vec![]));
	let transport = Arc::new(RecordingTransport::default());
	let backend = backend(config(false, 3), api, transport.clone());

	let err = backend
		.invoke(
			&identity(),
			&InvocationRequest::new(json!({})),
			ResultMode::Activation,
		)
		.await
		.unwrap_err();

	assert!(matches!(err, LifecycleError::UnknownUnit { .. }));
	assert!(transport.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn existing_ready_service_is_adopted() {
	let api = Arc::new(MockServiceApi::new(vec![status(true)]));
	api.insert("stratus-7-3-py39-256mb", status(true));
	let backend = backend(
		config(false, 3),
		api.clone(),
		Arc::new(RecordingTransport::default()),
	);

	let metadata = backend
		.create_runtime(&identity(), &UnitSpec::default())
		.await
		.unwrap();

	assert!(metadata.adopted);
	assert_eq!(metadata.endpoint.as_str(), URL);
	assert_eq!(api.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn delete_on_dismantle_removes_the_service() {
	let api = Arc::new(MockServiceApi::new(vec![status(true)]));
	let backend = backend(
		config(true, 3),
		api.clone(),
		Arc::new(RecordingTransport::default()),
	);
	let metadata = backend
		.create_runtime(&identity(), &UnitSpec::default())
		.await
		.unwrap();

	let report = backend.stop(&identity()).await.unwrap();

	assert_eq!(report.completed, vec!["delete service".to_string()]);
	assert!(api.services.lock().unwrap().is_empty());
	assert!(backend.unit(&identity()).await.unwrap().is_none());
	assert!(!backend.registry().contains(&metadata.name).await);

	// A second stop finds nothing and succeeds.
	let report = backend.stop(&identity()).await.unwrap();
	assert!(report.completed.is_empty());
}

#[tokio::test]
async fn failed_delete_raises_teardown_error() {
	let api = Arc::new(MockServiceApi::new(vec![status(true)]).failing_delete());
	let backend = backend(
		config(true, 3),
		api.clone(),
		Arc::new(RecordingTransport::default()),
	);
	backend
		.create_runtime(&identity(), &UnitSpec::default())
		.await
		.unwrap();

	let err = backend.stop(&identity()).await.unwrap_err();

	match err {
		LifecycleError::Teardown { name, failures } => {
			assert_eq!(name, "stratus-7-3-py39-256mb");
			assert_eq!(failures.len(), 1);
			assert!(failures[0].contains("backend unavailable"));
		}
		other => panic!("unexpected error: {other:?}"),
	}
	let unit = backend.unit(&identity()).await.unwrap().unwrap();
	assert_eq!(unit.status(), UnitStatus::Failed);
}

#[tokio::test]
async fn runtime_key_and_listing() {
	let api = Arc::new(MockServiceApi::new(vec![status(true)]));
	api.insert("stratus--0-4-1--py39--512mb", status(true));
	api.insert("other-service", status(true));
	let backend = backend(
		config(false, 3),
		api,
		Arc::new(RecordingTransport::default()),
	);

	let key = backend.get_runtime_key(&identity()).await.unwrap();
	assert_eq!(key, "gcp_cloudrun/us-east1/proj/stratus-7-3-py39-256mb");

	let runtimes = backend.list_runtimes().await.unwrap();
	assert_eq!(runtimes.len(), 1);
	assert_eq!(runtimes[0].status, UnitStatus::Ready);
	let parsed = runtimes[0].identity.as_ref().unwrap();
	assert_eq!(parsed.logical_name, "py39");
	assert_eq!(parsed.size_class, 512);
}
