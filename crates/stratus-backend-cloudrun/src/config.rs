// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backend configuration.

use std::time::Duration;

use stratus_lifecycle::{
	naming::DEFAULT_PREFIX, ReadinessPolicy, UnitSpec, DEFAULT_REFRESH_MARGIN,
};

pub const DEFAULT_METADATA_ROUTE: &str = "/preinstalls";

/// Configuration for [`CloudRunBackend`](crate::CloudRunBackend).
#[derive(Debug, Clone)]
pub struct CloudRunConfig {
	pub project: String,
	pub region: String,
	/// Service account the revisions run as.
	pub service_account: Option<String>,
	/// Container registry host, e.g. `gcr.io`.
	pub registry: String,
	/// Control-plane base URL; the regional endpoint when `None`.
	pub api_endpoint: Option<String>,
	/// Route probed in document mode after readiness; `None` skips the probe.
	pub metadata_route: Option<String>,
	pub delete_on_dismantle: bool,
	pub readiness: ReadinessPolicy,
	pub token_margin: Duration,
	pub name_prefix: String,
	/// Defaults applied when a caller does not supply a [`UnitSpec`].
	pub runtime_cpu: String,
	pub container_concurrency: u32,
	pub workers: u32,
	pub timeout_secs: u64,
}

impl CloudRunConfig {
	pub fn new(project: impl Into<String>, region: impl Into<String>) -> Self {
		Self {
			project: project.into(),
			region: region.into(),
			service_account: None,
			registry: "gcr.io".to_string(),
			api_endpoint: None,
			metadata_route: Some(DEFAULT_METADATA_ROUTE.to_string()),
			delete_on_dismantle: false,
			readiness: ReadinessPolicy::default(),
			token_margin: DEFAULT_REFRESH_MARGIN,
			name_prefix: DEFAULT_PREFIX.to_string(),
			runtime_cpu: "1".to_string(),
			container_concurrency: 1,
			workers: 100,
			timeout_secs: 600,
		}
	}

	/// [`UnitSpec`] built from the configured defaults.
	pub fn default_spec(&self) -> UnitSpec {
		UnitSpec {
			cpu: self.runtime_cpu.clone(),
			concurrency: self.container_concurrency,
			timeout_secs: self.timeout_secs,
			max_workers: self.workers,
			..Default::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_spec_mirrors_config() {
		let mut config = CloudRunConfig::new("proj", "us-east1");
		config.workers = 7;
		config.container_concurrency = 4;
		let spec = config.default_spec();
		assert_eq!(spec.max_workers, 7);
		assert_eq!(spec.concurrency, 4);
		assert_eq!(spec.cpu, "1");
	}
}
