// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use stratus_common_secret::{load_secret_env, SecretString};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::StratusConfigLayer;
use crate::sections::{
	BackendKind, CloudRunConfigLayer, LifecycleConfigLayer, LogFormat, LoggingConfigLayer,
	VpcConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/stratus/stratus.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<StratusConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<StratusConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(StratusConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<StratusConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(StratusConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: StratusConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: STRATUS_<SECTION>_<FIELD>. Secrets also accept `<NAME>_FILE`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<StratusConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(StratusConfigLayer {
			lifecycle: Some(load_lifecycle_from_env()?),
			cloudrun: Some(load_cloudrun_from_env()?),
			vpc: Some(load_vpc_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	env_parse(name, "u16")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	env_parse(name, "u32")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	env_parse(name, "u64")
}

fn env_secret(name: &str) -> Result<Option<SecretString>, ConfigError> {
	load_secret_env(name).map_err(|e| ConfigError::Secret(e.to_string()))
}

fn load_lifecycle_from_env() -> Result<LifecycleConfigLayer, ConfigError> {
	let backend = match env_var("STRATUS_BACKEND") {
		Some(v) => Some(v.parse::<BackendKind>().map_err(|message| {
			ConfigError::InvalidValue {
				key: "STRATUS_BACKEND".to_string(),
				message,
			}
		})?),
		None => None,
	};

	Ok(LifecycleConfigLayer {
		backend,
		delete_on_dismantle: env_bool("STRATUS_LIFECYCLE_DELETE_ON_DISMANTLE"),
		readiness_budget: env_u32("STRATUS_LIFECYCLE_READINESS_BUDGET")?,
		backoff_scale_ms: env_u64("STRATUS_LIFECYCLE_BACKOFF_SCALE_MS")?,
		token_margin_secs: env_u64("STRATUS_LIFECYCLE_TOKEN_MARGIN_SECS")?,
		name_prefix: env_var("STRATUS_LIFECYCLE_NAME_PREFIX"),
	})
}

fn load_cloudrun_from_env() -> Result<CloudRunConfigLayer, ConfigError> {
	Ok(CloudRunConfigLayer {
		project: env_var("STRATUS_CLOUDRUN_PROJECT"),
		region: env_var("STRATUS_CLOUDRUN_REGION"),
		service_account: env_var("STRATUS_CLOUDRUN_SERVICE_ACCOUNT"),
		registry: env_var("STRATUS_CLOUDRUN_REGISTRY"),
		api_endpoint: env_var("STRATUS_CLOUDRUN_API_ENDPOINT"),
		metadata_route: std::env::var("STRATUS_CLOUDRUN_METADATA_ROUTE").ok(),
		metadata_url: env_var("STRATUS_CLOUDRUN_METADATA_URL"),
		access_token: env_secret("STRATUS_CLOUDRUN_ACCESS_TOKEN")?,
		runtime_cpu: env_var("STRATUS_CLOUDRUN_RUNTIME_CPU"),
		container_concurrency: env_u32("STRATUS_CLOUDRUN_CONTAINER_CONCURRENCY")?,
		workers: env_u32("STRATUS_CLOUDRUN_WORKERS")?,
		timeout_secs: env_u64("STRATUS_CLOUDRUN_TIMEOUT_SECS")?,
	})
}

fn load_vpc_from_env() -> Result<VpcConfigLayer, ConfigError> {
	Ok(VpcConfigLayer {
		endpoint: env_var("STRATUS_VPC_ENDPOINT"),
		iam_url: env_var("STRATUS_VPC_IAM_URL"),
		api_key: env_secret("STRATUS_VPC_API_KEY")?,
		vpc_id: env_var("STRATUS_VPC_VPC_ID"),
		subnet_id: env_var("STRATUS_VPC_SUBNET_ID"),
		security_group_id: env_var("STRATUS_VPC_SECURITY_GROUP_ID"),
		image_id: env_var("STRATUS_VPC_IMAGE_ID"),
		key_id: env_var("STRATUS_VPC_KEY_ID"),
		resource_group_id: env_var("STRATUS_VPC_RESOURCE_GROUP_ID"),
		zone_name: env_var("STRATUS_VPC_ZONE_NAME"),
		profile_name: env_var("STRATUS_VPC_PROFILE_NAME"),
		volume_profile: env_var("STRATUS_VPC_VOLUME_PROFILE"),
		boot_volume_capacity: env_u32("STRATUS_VPC_BOOT_VOLUME_CAPACITY")?,
		port: env_u16("STRATUS_VPC_PORT")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("STRATUS_LOG_FORMAT") {
		Some(v) => Some(v.parse::<LogFormat>().map_err(|message| {
			ConfigError::InvalidValue {
				key: "STRATUS_LOG_FORMAT".to_string(),
				message,
			}
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("STRATUS_LOG_LEVEL"),
		format,
	})
}
