// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle configuration section.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stratus_lifecycle::{
	naming::DEFAULT_PREFIX, ReadinessPolicy, DEFAULT_BACKOFF_SCALE, DEFAULT_READINESS_BUDGET,
	DEFAULT_REFRESH_MARGIN,
};

/// Provider that compute units are created on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
	#[default]
	#[serde(rename = "cloudrun")]
	CloudRun,
	#[serde(rename = "vpc")]
	Vpc,
}

impl BackendKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			BackendKind::CloudRun => "cloudrun",
			BackendKind::Vpc => "vpc",
		}
	}
}

impl fmt::Display for BackendKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BackendKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"cloudrun" | "cloud_run" | "gcp_cloudrun" => Ok(BackendKind::CloudRun),
			"vpc" | "ibm_vpc" => Ok(BackendKind::Vpc),
			other => Err(format!("unknown backend '{other}' (expected cloudrun or vpc)")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LifecycleConfigLayer {
	pub backend: Option<BackendKind>,
	pub delete_on_dismantle: Option<bool>,
	pub readiness_budget: Option<u32>,
	pub backoff_scale_ms: Option<u64>,
	pub token_margin_secs: Option<u64>,
	pub name_prefix: Option<String>,
}

impl LifecycleConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.backend.is_some() {
			self.backend = other.backend;
		}
		if other.delete_on_dismantle.is_some() {
			self.delete_on_dismantle = other.delete_on_dismantle;
		}
		if other.readiness_budget.is_some() {
			self.readiness_budget = other.readiness_budget;
		}
		if other.backoff_scale_ms.is_some() {
			self.backoff_scale_ms = other.backoff_scale_ms;
		}
		if other.token_margin_secs.is_some() {
			self.token_margin_secs = other.token_margin_secs;
		}
		if other.name_prefix.is_some() {
			self.name_prefix = other.name_prefix;
		}
	}

	pub fn finalize(self) -> LifecycleConfig {
		let defaults = LifecycleConfig::default();
		LifecycleConfig {
			backend: self.backend.unwrap_or(defaults.backend),
			delete_on_dismantle: self.delete_on_dismantle,
			readiness_budget: self.readiness_budget.unwrap_or(defaults.readiness_budget),
			backoff_scale: self
				.backoff_scale_ms
				.map(Duration::from_millis)
				.unwrap_or(defaults.backoff_scale),
			token_margin: self
				.token_margin_secs
				.map(Duration::from_secs)
				.unwrap_or(defaults.token_margin),
			name_prefix: self.name_prefix.unwrap_or(defaults.name_prefix),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
	pub backend: BackendKind,
	/// `None` keeps the selected backend's own default.
	pub delete_on_dismantle: Option<bool>,
	pub readiness_budget: u32,
	pub backoff_scale: Duration,
	pub token_margin: Duration,
	pub name_prefix: String,
}

impl LifecycleConfig {
	pub fn readiness(&self) -> ReadinessPolicy {
		ReadinessPolicy::new(self.readiness_budget, self.backoff_scale)
	}
}

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			backend: BackendKind::default(),
			delete_on_dismantle: None,
			readiness_budget: DEFAULT_READINESS_BUDGET,
			backoff_scale: DEFAULT_BACKOFF_SCALE,
			token_margin: DEFAULT_REFRESH_MARGIN,
			name_prefix: DEFAULT_PREFIX.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = LifecycleConfigLayer::default().finalize();
		assert_eq!(config, LifecycleConfig::default());
		assert_eq!(config.readiness().budget, 15);
		assert_eq!(config.readiness().scale, Duration::from_secs(25));
	}

	#[test]
	fn test_layer_finalize_with_values() {
		let layer = LifecycleConfigLayer {
			backend: Some(BackendKind::Vpc),
			delete_on_dismantle: Some(false),
			readiness_budget: Some(4),
			backoff_scale_ms: Some(500),
			..Default::default()
		};
		let config = layer.finalize();
		assert_eq!(config.backend, BackendKind::Vpc);
		assert_eq!(config.delete_on_dismantle, Some(false));
		assert_eq!(config.readiness().budget, 4);
		assert_eq!(config.backoff_scale, Duration::from_millis(500));
		assert_eq!(config.name_prefix, "stratus");
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = LifecycleConfigLayer {
			backend: Some(BackendKind::Vpc),
			readiness_budget: Some(10),
			..Default::default()
		};
		base.merge(LifecycleConfigLayer {
			readiness_budget: Some(3),
			..Default::default()
		});
		assert_eq!(base.backend, Some(BackendKind::Vpc));
		assert_eq!(base.readiness_budget, Some(3));
	}

	#[test]
	fn test_backend_names() {
		assert_eq!("cloudrun".parse::<BackendKind>(), Ok(BackendKind::CloudRun));
		assert_eq!("IBM_VPC".parse::<BackendKind>(), Ok(BackendKind::Vpc));
		assert!("lambda".parse::<BackendKind>().is_err());
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: LifecycleConfigLayer = toml::from_str(
			r#"
backend = "vpc"
delete_on_dismantle = true
"#,
		)
		.unwrap();
		assert_eq!(layer.backend, Some(BackendKind::Vpc));
		assert_eq!(layer.delete_on_dismantle, Some(true));
		assert!(layer.readiness_budget.is_none());
	}
}
