// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for stratus.
//!
//! Sources, lowest to highest precedence: built-in defaults, a TOML file
//! (`/etc/stratus/stratus.toml` unless another path is given), and
//! `STRATUS_<SECTION>_<FIELD>` environment variables.
//!
//! ```ignore
//! let config = stratus_config::load_config()?;
//! println!("backend: {}", config.lifecycle.backend);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::StratusConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct StratusConfig {
	pub lifecycle: LifecycleConfig,
	pub cloudrun: Option<CloudRunConfig>,
	pub vpc: Option<VpcConfig>,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<StratusConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path in place of the system
/// one.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<StratusConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<StratusConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = StratusConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer, checking that the selected backend is configured.
pub fn finalize(layer: StratusConfigLayer) -> Result<StratusConfig, ConfigError> {
	let lifecycle = layer.lifecycle.unwrap_or_default().finalize();
	let cloudrun = layer.cloudrun.and_then(|l| l.finalize());
	let vpc = layer.vpc.and_then(|l| l.finalize());
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&lifecycle, cloudrun.as_ref(), vpc.as_ref())?;

	info!(
		backend = %lifecycle.backend,
		delete_on_dismantle = ?lifecycle.delete_on_dismantle,
		readiness_budget = lifecycle.readiness_budget,
		cloudrun_configured = cloudrun.is_some(),
		vpc_configured = vpc.is_some(),
		"Stratus configuration loaded"
	);

	Ok(StratusConfig {
		lifecycle,
		cloudrun,
		vpc,
		logging,
	})
}

fn validate_config(
	lifecycle: &LifecycleConfig,
	cloudrun: Option<&CloudRunConfig>,
	vpc: Option<&VpcConfig>,
) -> Result<(), ConfigError> {
	if lifecycle.readiness_budget == 0 {
		return Err(ConfigError::InvalidValue {
			key: "lifecycle.readiness_budget".to_string(),
			message: "must be at least 1".to_string(),
		});
	}

	match lifecycle.backend {
		BackendKind::CloudRun if cloudrun.is_none() => Err(ConfigError::Validation(
			"backend cloudrun selected but STRATUS_CLOUDRUN_PROJECT and STRATUS_CLOUDRUN_REGION \
			 are not both set"
				.to_string(),
		)),
		BackendKind::Vpc => match vpc {
			None => Err(ConfigError::MissingEnvVar("STRATUS_VPC_ENDPOINT".to_string())),
			Some(vpc) if vpc.api_key.is_none() => {
				Err(ConfigError::MissingEnvVar("STRATUS_VPC_API_KEY".to_string()))
			}
			Some(_) => Ok(()),
		},
		_ => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::io::Write;

	fn cloudrun_layer() -> StratusConfigLayer {
		StratusConfigLayer {
			cloudrun: Some(CloudRunConfigLayer {
				project: Some("proj".to_string()),
				region: Some("us-east1".to_string()),
				..Default::default()
			}),
			..Default::default()
		}
	}

	#[test]
	fn test_cloudrun_requires_project_and_region() {
		let err = finalize(StratusConfigLayer::default()).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));

		let config = finalize(cloudrun_layer()).unwrap();
		assert_eq!(config.lifecycle.backend, BackendKind::CloudRun);
		assert_eq!(config.cloudrun.unwrap().project, "proj");
	}

	#[test]
	fn test_vpc_requires_api_key() {
		let mut layer = StratusConfigLayer {
			lifecycle: Some(LifecycleConfigLayer {
				backend: Some(BackendKind::Vpc),
				..Default::default()
			}),
			vpc: Some(VpcConfigLayer {
				endpoint: Some("https://us-south.iaas.cloud.ibm.com".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer.clone()).unwrap_err();
		assert!(err.to_string().contains("STRATUS_VPC_API_KEY"));

		if let Some(vpc) = layer.vpc.as_mut() {
			vpc.api_key = Some("apikey".into());
		}
		let config = finalize(layer).unwrap();
		assert!(config.vpc.is_some());
	}

	#[test]
	fn test_zero_budget_rejected() {
		let mut layer = cloudrun_layer();
		layer.lifecycle = Some(LifecycleConfigLayer {
			readiness_budget: Some(0),
			..Default::default()
		});
		let err = finalize(layer).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}

	struct FixedSource(Precedence, StratusConfigLayer);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<StratusConfigLayer, ConfigError> {
			Ok(self.1.clone())
		}
	}

	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let file = FixedSource(Precedence::ConfigFile, {
			let mut layer = cloudrun_layer();
			layer.logging = Some(LoggingConfigLayer {
				level: Some("debug".to_string()),
				..Default::default()
			});
			layer
		});
		let env = FixedSource(
			Precedence::Environment,
			StratusConfigLayer {
				logging: Some(LoggingConfigLayer {
					level: Some("warn".to_string()),
					..Default::default()
				}),
				..Default::default()
			},
		);

		let config = load_from(vec![Box::new(env), Box::new(file)]).unwrap();
		assert_eq!(config.logging.level, "warn");
		assert_eq!(config.cloudrun.unwrap().region, "us-east1");
	}

	#[test]
	fn test_file_only_configuration() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[lifecycle]
backend = "cloudrun"
delete_on_dismantle = true
backoff_scale_ms = 1000

[cloudrun]
project = "proj"
region = "us-east1"

[logging]
format = "json"
"#
		)
		.unwrap();

		let config = load_from(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(file.path())),
		])
		.unwrap();
		assert_eq!(config.lifecycle.delete_on_dismantle, Some(true));
		assert_eq!(
			config.lifecycle.backoff_scale,
			std::time::Duration::from_secs(1)
		);
		assert_eq!(config.logging.format, LogFormat::Json);
	}

	proptest! {
		#[test]
		fn merge_prefers_later_budget(first in 1u32..100, second in proptest::option::of(1u32..100)) {
			let mut layer = LifecycleConfigLayer {
				readiness_budget: Some(first),
				..Default::default()
			};
			layer.merge(LifecycleConfigLayer {
				readiness_budget: second,
				..Default::default()
			});
			prop_assert_eq!(layer.readiness_budget, Some(second.unwrap_or(first)));
		}
	}
}
