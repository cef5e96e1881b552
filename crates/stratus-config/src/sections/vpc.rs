// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! VPC configuration section.

use serde::{Deserialize, Serialize};
use stratus_common_secret::SecretString;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VpcConfigLayer {
	pub endpoint: Option<String>,
	pub iam_url: Option<String>,
	pub api_key: Option<SecretString>,
	pub vpc_id: Option<String>,
	pub subnet_id: Option<String>,
	pub security_group_id: Option<String>,
	pub image_id: Option<String>,
	pub key_id: Option<String>,
	pub resource_group_id: Option<String>,
	pub zone_name: Option<String>,
	pub profile_name: Option<String>,
	pub volume_profile: Option<String>,
	pub boot_volume_capacity: Option<u32>,
	pub port: Option<u16>,
}

impl VpcConfigLayer {
	pub fn merge(&mut self, other: Self) {
		macro_rules! take {
			($($field:ident),* $(,)?) => {
				$(
					if other.$field.is_some() {
						self.$field = other.$field;
					}
				)*
			};
		}
		take!(
			endpoint,
			iam_url,
			api_key,
			vpc_id,
			subnet_id,
			security_group_id,
			image_id,
			key_id,
			resource_group_id,
			zone_name,
			profile_name,
			volume_profile,
			boot_volume_capacity,
			port,
		);
	}

	/// `None` unless the regional endpoint is set.
	pub fn finalize(self) -> Option<VpcConfig> {
		Some(VpcConfig {
			endpoint: self.endpoint?,
			iam_url: self.iam_url,
			api_key: self.api_key,
			vpc_id: self.vpc_id.unwrap_or_default(),
			subnet_id: self.subnet_id.unwrap_or_default(),
			security_group_id: self.security_group_id.unwrap_or_default(),
			image_id: self.image_id.unwrap_or_default(),
			key_id: self.key_id.unwrap_or_default(),
			resource_group_id: self.resource_group_id.unwrap_or_default(),
			zone_name: self.zone_name.unwrap_or_default(),
			profile_name: self.profile_name,
			volume_profile: self.volume_profile,
			boot_volume_capacity: self.boot_volume_capacity,
			port: self.port,
		})
	}
}

/// VPC settings. Empty identifiers are reported by the backend when an
/// instance is first created.
#[derive(Debug, Clone, PartialEq)]
pub struct VpcConfig {
	pub endpoint: String,
	pub iam_url: Option<String>,
	pub api_key: Option<SecretString>,
	pub vpc_id: String,
	pub subnet_id: String,
	pub security_group_id: String,
	pub image_id: String,
	pub key_id: String,
	pub resource_group_id: String,
	pub zone_name: String,
	pub profile_name: Option<String>,
	pub volume_profile: Option<String>,
	pub boot_volume_capacity: Option<u32>,
	pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_finalize_requires_endpoint() {
		assert!(VpcConfigLayer::default().finalize().is_none());

		let config = VpcConfigLayer {
			endpoint: Some("https://us-south.iaas.cloud.ibm.com".to_string()),
			zone_name: Some("us-south-3".to_string()),
			..Default::default()
		}
		.finalize()
		.unwrap();
		assert_eq!(config.zone_name, "us-south-3");
		assert!(config.vpc_id.is_empty());
		assert!(config.port.is_none());
	}

	#[test]
	fn test_merge_prefers_overlay() {
		let mut base = VpcConfigLayer {
			endpoint: Some("https://us-south.iaas.cloud.ibm.com".to_string()),
			port: Some(8080),
			..Default::default()
		};
		base.merge(VpcConfigLayer {
			port: Some(9000),
			api_key: Some(SecretString::new("key".to_string())),
			..Default::default()
		});
		assert_eq!(base.port, Some(9000));
		assert!(base.endpoint.is_some());
		assert!(base.api_key.is_some());
	}

	#[test]
	fn test_deserialize_layer() {
		let layer: VpcConfigLayer = toml::from_str(
			r#"
endpoint = "https://eu-de.iaas.cloud.ibm.com"
vpc_id = "r010-vpc"
boot_volume_capacity = 200
"#,
		)
		.unwrap();
		assert_eq!(layer.vpc_id.as_deref(), Some("r010-vpc"));
		assert_eq!(layer.boot_volume_capacity, Some(200));
		assert!(layer.api_key.is_none());
	}
}
