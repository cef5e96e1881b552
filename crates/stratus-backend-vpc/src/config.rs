// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backend configuration.

use std::time::Duration;

use stratus_lifecycle::{naming::DEFAULT_PREFIX, ReadinessPolicy, DEFAULT_REFRESH_MARGIN};

use crate::iam::DEFAULT_IAM_URL;

pub const DEFAULT_API_VERSION: &str = "2020-06-02";
pub const DEFAULT_PROFILE: &str = "bx2-8x32";
pub const DEFAULT_VOLUME_PROFILE: &str = "10iops-tier";
pub const DEFAULT_BOOT_VOLUME_CAPACITY: u32 = 100;
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration for [`VpcBackend`](crate::VpcBackend).
#[derive(Debug, Clone)]
pub struct VpcConfig {
	/// Regional endpoint, e.g. `https://us-south.iaas.cloud.ibm.com`.
	pub endpoint: String,
	pub api_version: String,
	pub iam_url: String,
	pub vpc_id: String,
	pub subnet_id: String,
	pub security_group_id: String,
	pub image_id: String,
	pub key_id: String,
	pub resource_group_id: String,
	pub zone_name: String,
	pub profile_name: String,
	pub volume_profile: String,
	/// Boot volume size in GB.
	pub boot_volume_capacity: u32,
	/// Port the unit's HTTP server listens on.
	pub port: u16,
	pub delete_on_dismantle: bool,
	/// Polling for `running` after create and for `stopped` after a stop action.
	pub readiness: ReadinessPolicy,
	pub token_margin: Duration,
	pub name_prefix: String,
}

impl VpcConfig {
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			api_version: DEFAULT_API_VERSION.to_string(),
			iam_url: DEFAULT_IAM_URL.to_string(),
			vpc_id: String::new(),
			subnet_id: String::new(),
			security_group_id: String::new(),
			image_id: String::new(),
			key_id: String::new(),
			resource_group_id: String::new(),
			zone_name: String::new(),
			profile_name: DEFAULT_PROFILE.to_string(),
			volume_profile: DEFAULT_VOLUME_PROFILE.to_string(),
			boot_volume_capacity: DEFAULT_BOOT_VOLUME_CAPACITY,
			port: DEFAULT_PORT,
			delete_on_dismantle: true,
			readiness: ReadinessPolicy::default(),
			token_margin: DEFAULT_REFRESH_MARGIN,
			name_prefix: DEFAULT_PREFIX.to_string(),
		}
	}

	/// Region taken from the endpoint host (`https://us-south.iaas...` gives
	/// `us-south`).
	pub fn region(&self) -> &str {
		let host = self
			.endpoint
			.split_once("//")
			.map_or(self.endpoint.as_str(), |(_, rest)| rest);
		host.split(['.', '/']).next().unwrap_or(host)
	}

	/// Names of the identifiers an instance prototype needs that are unset.
	pub fn missing_identifiers(&self) -> Vec<&'static str> {
		[
			("vpc_id", &self.vpc_id),
			("subnet_id", &self.subnet_id),
			("security_group_id", &self.security_group_id),
			("image_id", &self.image_id),
			("key_id", &self.key_id),
			("resource_group_id", &self.resource_group_id),
			("zone_name", &self.zone_name),
		]
		.into_iter()
		.filter(|(_, value)| value.trim().is_empty())
		.map(|(name, _)| name)
		.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn region_from_endpoint() {
		let config = VpcConfig::new("https://us-south.iaas.cloud.ibm.com");
		assert_eq!(config.region(), "us-south");
		let config = VpcConfig::new("eu-de.iaas.cloud.ibm.com");
		assert_eq!(config.region(), "eu-de");
	}

	#[test]
	fn reports_missing_identifiers() {
		let mut config = VpcConfig::new("https://us-south.iaas.cloud.ibm.com");
		assert_eq!(config.missing_identifiers().len(), 7);

		config.vpc_id = "r006-vpc".into();
		config.zone_name = "us-south-3".into();
		let missing = config.missing_identifiers();
		assert!(!missing.contains(&"vpc_id"));
		assert!(missing.contains(&"image_id"));
	}
}
