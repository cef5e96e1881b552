// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The subset of the `serving.knative.dev/v1` Service resource stratus uses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "serving.knative.dev/v1";
pub const KIND_SERVICE: &str = "Service";
pub const MAX_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/maxScale";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
	#[serde(default)]
	pub api_version: String,
	#[serde(default)]
	pub kind: String,
	pub metadata: ObjectMeta,
	#[serde(default)]
	pub spec: ServiceSpec,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<ServiceStatus>,
}

impl Service {
	pub fn name(&self) -> &str {
		&self.metadata.name
	}

	pub fn conditions(&self) -> &[ServiceCondition] {
		self.status
			.as_ref()
			.map(|s| s.conditions.as_slice())
			.unwrap_or_default()
	}

	pub fn url(&self) -> Option<&str> {
		self.status.as_ref().and_then(|s| s.url.as_deref())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
	#[serde(default)]
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub labels: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub annotations: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
	#[serde(default)]
	pub template: RevisionTemplate,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub traffic: Vec<TrafficTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplate {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<ObjectMeta>,
	#[serde(default)]
	pub spec: RevisionSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSpec {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub container_concurrency: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout_seconds: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub service_account_name: Option<String>,
	#[serde(default)]
	pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
	pub image: String,
	#[serde(default)]
	pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub limits: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTarget {
	pub percent: u32,
	#[serde(default)]
	pub latest_revision: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default)]
	pub conditions: Vec<ServiceCondition>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCondition {
	#[serde(rename = "type")]
	pub type_: String,
	/// `"True"`, `"False"` or `"Unknown"`.
	pub status: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl ServiceCondition {
	pub fn is_true(&self) -> bool {
		self.status == "True"
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceList {
	#[serde(default)]
	pub items: Vec<Service>,
}
