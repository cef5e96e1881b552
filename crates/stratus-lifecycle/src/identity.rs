// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logical identity of a compute unit and the parameters it is created with.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label keys attached to every provisioned resource.
pub const LABEL_RUNTIME: &str = "stratus.dev/runtime";
pub const LABEL_SIZE_CLASS: &str = "stratus.dev/size-class";
pub const LABEL_JOB: &str = "stratus.dev/job";
pub const LABEL_CALL: &str = "stratus.dev/call";
pub const LABEL_MANAGED: &str = "stratus.dev/managed";

/// What a compute unit *is*, independent of where it runs.
///
/// Equal identities always derive equal resource names. Identities carrying
/// both `job_id` and `call_id` are call-scoped; all others are shared by every
/// call that needs the same runtime and size class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputeUnitIdentity {
	/// Runtime (container image) name, already normalized.
	pub logical_name: String,
	/// Memory size class in megabytes.
	pub size_class: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub job_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub call_id: Option<String>,
}

impl ComputeUnitIdentity {
	pub fn new(logical_name: impl Into<String>, size_class: u32) -> Self {
		Self {
			logical_name: logical_name.into(),
			size_class,
			job_id: None,
			call_id: None,
		}
	}

	pub fn for_call(mut self, job_id: impl Into<String>, call_id: impl Into<String>) -> Self {
		self.job_id = Some(job_id.into());
		self.call_id = Some(call_id.into());
		self
	}

	/// `(job_id, call_id)` when both are present.
	pub fn call_scope(&self) -> Option<(&str, &str)> {
		match (self.job_id.as_deref(), self.call_id.as_deref()) {
			(Some(job), Some(call)) => Some((job, call)),
			_ => None,
		}
	}

	/// Labels describing this identity, attached to provider resources.
	pub fn labels(&self) -> BTreeMap<String, String> {
		let mut labels = BTreeMap::new();
		labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
		labels.insert(LABEL_RUNTIME.to_string(), self.logical_name.clone());
		labels.insert(LABEL_SIZE_CLASS.to_string(), self.size_class.to_string());
		if let Some((job, call)) = self.call_scope() {
			labels.insert(LABEL_JOB.to_string(), job.to_string());
			labels.insert(LABEL_CALL.to_string(), call.to_string());
		}
		labels
	}
}

impl fmt::Display for ComputeUnitIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}mb", self.logical_name, self.size_class)?;
		if let Some((job, call)) = self.call_scope() {
			write!(f, " job={job} call={call}")?;
		}
		Ok(())
	}
}

/// Creation parameters that do not participate in naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
	/// CPU limit in provider notation (`"1"`, `"2"`, `"500m"`).
	pub cpu: String,
	/// Concurrent requests a single replica accepts.
	pub concurrency: u32,
	/// Per-request timeout enforced by the provider.
	pub timeout_secs: u64,
	/// Upper bound on replicas the provider may scale to.
	pub max_workers: u32,
	/// Extra annotations merged over the identity labels.
	#[serde(default)]
	pub annotations: BTreeMap<String, String>,
}

impl Default for UnitSpec {
	fn default() -> Self {
		Self {
			cpu: "1".to_string(),
			concurrency: 1,
			timeout_secs: 600,
			max_workers: 100,
			annotations: BTreeMap::new(),
		}
	}
}

impl UnitSpec {
	/// Identity labels with these annotations layered on top.
	pub fn annotations_for(&self, identity: &ComputeUnitIdentity) -> BTreeMap<String, String> {
		let mut merged = identity.labels();
		merged.extend(self.annotations.clone());
		merged
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn call_scope_requires_both_ids() {
		let mut id = ComputeUnitIdentity::new("py39", 256);
		assert!(id.call_scope().is_none());

		id.job_id = Some("7".to_string());
		assert!(id.call_scope().is_none());

		let id = id.for_call("7", "3");
		assert_eq!(id.call_scope(), Some(("7", "3")));
	}

	#[test]
	fn display_includes_call_scope() {
		let id = ComputeUnitIdentity::new("py39", 256).for_call("7", "3");
		assert_eq!(id.to_string(), "py39/256mb job=7 call=3");
		assert_eq!(ComputeUnitIdentity::new("py39", 256).to_string(), "py39/256mb");
	}

	#[test]
	fn spec_annotations_override_labels() {
		let id = ComputeUnitIdentity::new("py39", 256).for_call("7", "3");
		let mut spec = UnitSpec::default();
		spec.annotations
			.insert(LABEL_RUNTIME.to_string(), "override".to_string());
		spec.annotations
			.insert("team".to_string(), "data".to_string());

		let merged = spec.annotations_for(&id);
		assert_eq!(merged[LABEL_RUNTIME], "override");
		assert_eq!(merged[LABEL_JOB], "7");
		assert_eq!(merged["team"], "data");
	}

	#[test]
	fn identity_serializes_without_empty_scope() {
		let json = serde_json::to_value(ComputeUnitIdentity::new("py39", 512)).unwrap();
		assert_eq!(json, serde_json::json!({"logical_name": "py39", "size_class": 512}));
	}
}
