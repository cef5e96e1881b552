// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Service manifests and status interpretation.

use std::collections::BTreeMap;

use stratus_lifecycle::{ComputeUnitIdentity, Condition, UnitSpec, UnitStatus};

use crate::config::CloudRunConfig;
use crate::types::{
	Container, ObjectMeta, ResourceRequirements, RevisionSpec, RevisionTemplate, Service,
	ServiceSpec, TrafficTarget, API_VERSION, KIND_SERVICE, MAX_SCALE_ANNOTATION,
};

/// Image reference for a runtime: `{registry}/{project}/{prefix}-{runtime}:{tag}`.
///
/// Development builds use `latest`; releases use the version without dots.
pub fn image_reference(config: &CloudRunConfig, runtime: &str, version: &str) -> String {
	let tag = if version.contains("dev") {
		"latest".to_string()
	} else {
		version.replace('.', "")
	};
	format!(
		"{}/{}/{}-{runtime}:{tag}",
		config.registry, config.project, config.name_prefix
	)
}

pub fn build_service(
	config: &CloudRunConfig,
	name: &str,
	identity: &ComputeUnitIdentity,
	spec: &UnitSpec,
	image: String,
) -> Service {
	let mut annotations = BTreeMap::new();
	annotations.insert(MAX_SCALE_ANNOTATION.to_string(), spec.max_workers.to_string());

	let mut limits = BTreeMap::new();
	limits.insert("memory".to_string(), format!("{}Mi", identity.size_class));
	limits.insert("cpu".to_string(), spec.cpu.clone());

	Service {
		api_version: API_VERSION.to_string(),
		kind: KIND_SERVICE.to_string(),
		metadata: ObjectMeta {
			name: name.to_string(),
			namespace: Some(config.project.clone()),
			labels: label_safe(spec.annotations_for(identity)),
			annotations,
			..Default::default()
		},
		spec: ServiceSpec {
			template: RevisionTemplate {
				metadata: Some(ObjectMeta {
					name: format!("{name}-rev"),
					namespace: Some(config.project.clone()),
					..Default::default()
				}),
				spec: RevisionSpec {
					container_concurrency: Some(spec.concurrency),
					timeout_seconds: Some(spec.timeout_secs),
					service_account_name: config.service_account.clone(),
					containers: vec![Container {
						image,
						resources: ResourceRequirements { limits },
					}],
				},
			},
			traffic: vec![TrafficTarget {
				percent: 100,
				latest_revision: true,
			}],
		},
		status: None,
	}
}

/// Label keys may not contain `/` or `.` on this platform, so
/// `stratus.dev/runtime` becomes `stratus-dev-runtime`.
fn label_safe(labels: BTreeMap<String, String>) -> BTreeMap<String, String> {
	labels
		.into_iter()
		.map(|(k, v)| (k.replace(['/', '.'], "-"), v))
		.collect()
}

/// Readiness conditions of a service. A missing URL counts as an
/// unsatisfied condition so a unit never becomes ready without an endpoint.
pub fn conditions(service: &Service) -> Vec<Condition> {
	let mut conditions: Vec<Condition> = service
		.conditions()
		.iter()
		.map(|c| {
			let condition = Condition::new(&c.type_, c.is_true());
			match (&c.message, &c.reason) {
				(Some(message), _) => condition.with_message(message),
				(None, Some(reason)) => condition.with_message(reason),
				(None, None) => condition,
			}
		})
		.collect();
	if !conditions.is_empty() && service.url().is_none() {
		conditions.push(Condition::new("URL", false).with_message("no url published"));
	}
	conditions
}

/// Status the service is observed in, for adoption and listing.
pub fn observed_status(service: &Service) -> UnitStatus {
	let conditions = conditions(service);
	if !conditions.is_empty() && conditions.iter().all(|c| c.satisfied) {
		UnitStatus::Ready
	} else if service
		.conditions()
		.iter()
		.any(|c| c.type_ == "Ready" && c.status == "False")
	{
		UnitStatus::Failed
	} else {
		UnitStatus::Provisioning
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{ServiceCondition, ServiceStatus};
	use serde_json::json;

	fn config() -> CloudRunConfig {
		let mut config = CloudRunConfig::new("proj", "us-east1");
		config.service_account = Some("runner@proj.iam.gserviceaccount.com".to_string());
		config
	}

	fn service_with(conditions: &[(&str, &str)], url: Option<&str>) -> Service {
		Service {
			status: Some(ServiceStatus {
				url: url.map(str::to_string),
				conditions: conditions
					.iter()
					.map(|(t, s)| ServiceCondition {
						type_: t.to_string(),
						status: s.to_string(),
						reason: None,
						message: None,
					})
					.collect(),
				observed_generation: None,
			}),
			..Default::default()
		}
	}

	#[test]
	fn image_reference_tags() {
		let config = config();
		assert_eq!(
			image_reference(&config, "py39", "0.4.1"),
			"gcr.io/proj/stratus-py39:041"
		);
		assert_eq!(
			image_reference(&config, "py39", "0.5.0-dev"),
			"gcr.io/proj/stratus-py39:latest"
		);
	}

	#[test]
	fn manifest_carries_limits_and_scaling() {
		let identity = ComputeUnitIdentity::new("py39", 256).for_call("7", "3");
		let spec = UnitSpec {
			max_workers: 12,
			concurrency: 2,
			timeout_secs: 300,
			..Default::default()
		};
		let service = build_service(
			&config(),
			"stratus-7-3-py39-256mb",
			&identity,
			&spec,
			"gcr.io/proj/stratus-py39:041".to_string(),
		);
		let json = serde_json::to_value(&service).unwrap();

		assert_eq!(json["apiVersion"], "serving.knative.dev/v1");
		assert_eq!(json["metadata"]["annotations"][MAX_SCALE_ANNOTATION], "12");
		assert_eq!(json["metadata"]["labels"]["stratus-dev-job"], "7");
		assert_eq!(
			json["spec"]["template"]["metadata"]["name"],
			"stratus-7-3-py39-256mb-rev"
		);
		let rev = &json["spec"]["template"]["spec"];
		assert_eq!(rev["containerConcurrency"], 2);
		assert_eq!(rev["timeoutSeconds"], 300);
		assert_eq!(rev["serviceAccountName"], "runner@proj.iam.gserviceaccount.com");
		assert_eq!(
			rev["containers"][0]["resources"]["limits"],
			json!({"cpu": "1", "memory": "256Mi"})
		);
		assert_eq!(
			json["spec"]["traffic"][0],
			json!({"percent": 100, "latestRevision": true})
		);
	}

	#[test]
	fn ready_requires_every_condition_and_url() {
		let url = Some("https://svc.example/");
		let ready = service_with(&[("Ready", "True"), ("RoutesReady", "True")], url);
		assert_eq!(observed_status(&ready), UnitStatus::Ready);

		let partial = service_with(&[("Ready", "True"), ("RoutesReady", "Unknown")], url);
		assert_eq!(observed_status(&partial), UnitStatus::Provisioning);

		let no_url = service_with(&[("Ready", "True")], None);
		assert_eq!(observed_status(&no_url), UnitStatus::Provisioning);
		assert!(conditions(&no_url).iter().any(|c| c.kind == "URL"));

		let failed = service_with(&[("Ready", "False")], None);
		assert_eq!(observed_status(&failed), UnitStatus::Failed);

		assert_eq!(observed_status(&Service::default()), UnitStatus::Provisioning);
	}
}
