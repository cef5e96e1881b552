// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cloud Run configuration section.

use serde::{Deserialize, Serialize};
use stratus_common_secret::SecretString;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CloudRunConfigLayer {
	pub project: Option<String>,
	pub region: Option<String>,
	pub service_account: Option<String>,
	pub registry: Option<String>,
	pub api_endpoint: Option<String>,
	/// Empty string disables the metadata probe.
	pub metadata_route: Option<String>,
	pub metadata_url: Option<String>,
	/// Pre-issued admin token; application default credentials when unset.
	pub access_token: Option<SecretString>,
	pub runtime_cpu: Option<String>,
	pub container_concurrency: Option<u32>,
	pub workers: Option<u32>,
	pub timeout_secs: Option<u64>,
}

impl CloudRunConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.project.is_some() {
			self.project = other.project;
		}
		if other.region.is_some() {
			self.region = other.region;
		}
		if other.service_account.is_some() {
			self.service_account = other.service_account;
		}
		if other.registry.is_some() {
			self.registry = other.registry;
		}
		if other.api_endpoint.is_some() {
			self.api_endpoint = other.api_endpoint;
		}
		if other.metadata_route.is_some() {
			self.metadata_route = other.metadata_route;
		}
		if other.metadata_url.is_some() {
			self.metadata_url = other.metadata_url;
		}
		if other.access_token.is_some() {
			self.access_token = other.access_token;
		}
		if other.runtime_cpu.is_some() {
			self.runtime_cpu = other.runtime_cpu;
		}
		if other.container_concurrency.is_some() {
			self.container_concurrency = other.container_concurrency;
		}
		if other.workers.is_some() {
			self.workers = other.workers;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	/// `None` unless both project and region are set.
	pub fn finalize(self) -> Option<CloudRunConfig> {
		let project = self.project?;
		let region = self.region?;
		Some(CloudRunConfig {
			project,
			region,
			service_account: self.service_account,
			registry: self.registry,
			api_endpoint: self.api_endpoint,
			metadata_route: self.metadata_route,
			metadata_url: self.metadata_url,
			access_token: self.access_token,
			runtime_cpu: self.runtime_cpu,
			container_concurrency: self.container_concurrency,
			workers: self.workers,
			timeout_secs: self.timeout_secs,
		})
	}
}

/// Cloud Run settings. Unset optional fields keep the backend's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudRunConfig {
	pub project: String,
	pub region: String,
	pub service_account: Option<String>,
	pub registry: Option<String>,
	pub api_endpoint: Option<String>,
	pub metadata_route: Option<String>,
	pub metadata_url: Option<String>,
	pub access_token: Option<SecretString>,
	pub runtime_cpu: Option<String>,
	pub container_concurrency: Option<u32>,
	pub workers: Option<u32>,
	pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_finalize_requires_project_and_region() {
		let layer = CloudRunConfigLayer {
			project: Some("proj".to_string()),
			..Default::default()
		};
		assert!(layer.finalize().is_none());

		let layer = CloudRunConfigLayer {
			project: Some("proj".to_string()),
			region: Some("us-east1".to_string()),
			workers: Some(8),
			..Default::default()
		};
		let config = layer.finalize().unwrap();
		assert_eq!(config.region, "us-east1");
		assert_eq!(config.workers, Some(8));
		assert!(config.registry.is_none());
	}

	#[test]
	fn test_access_token_is_redacted() {
		let layer: CloudRunConfigLayer = toml::from_str(
			r#"
project = "proj"
region = "us-east1"
access_token = "ya29.super-secret"
"#,
		)
		.unwrap();
		let config = layer.finalize().unwrap();
		let debug = format!("{config:?}");
		assert!(!debug.contains("super-secret"));
		assert_eq!(
			config.access_token.unwrap().expose(),
			"ya29.super-secret"
		);
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = CloudRunConfigLayer {
			project: Some("proj".to_string()),
			region: Some("us-east1".to_string()),
			..Default::default()
		};
		base.merge(CloudRunConfigLayer {
			region: Some("europe-west1".to_string()),
			..Default::default()
		});
		assert_eq!(base.project.as_deref(), Some("proj"));
		assert_eq!(base.region.as_deref(), Some("europe-west1"));
	}
}
