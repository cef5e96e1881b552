// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backend selection from the resolved configuration.

use anyhow::{anyhow, Context, Result};
use stratus_backend_cloudrun::{CloudRunBackend, CloudRunConfig, DEFAULT_METADATA_URL};
use stratus_backend_vpc::{VpcBackend, VpcConfig};
use stratus_config::{BackendKind, LifecycleConfig, StratusConfig};
use stratus_lifecycle::{Backend, UnitSpec};
use tracing::info;

/// The configured backend and the [`UnitSpec`] new units get unless overridden.
pub struct Selected {
	pub backend: Box<dyn Backend>,
	pub spec: UnitSpec,
}

pub fn cloudrun_config(
	lifecycle: &LifecycleConfig,
	section: &stratus_config::CloudRunConfig,
) -> CloudRunConfig {
	let mut config = CloudRunConfig::new(&section.project, &section.region);
	config.service_account = section.service_account.clone();
	if let Some(registry) = &section.registry {
		config.registry = registry.clone();
	}
	config.api_endpoint = section.api_endpoint.clone();
	if let Some(route) = &section.metadata_route {
		config.metadata_route = (!route.is_empty()).then(|| route.clone());
	}
	if let Some(delete) = lifecycle.delete_on_dismantle {
		config.delete_on_dismantle = delete;
	}
	config.readiness = lifecycle.readiness();
	config.token_margin = lifecycle.token_margin;
	config.name_prefix = lifecycle.name_prefix.clone();
	if let Some(cpu) = &section.runtime_cpu {
		config.runtime_cpu = cpu.clone();
	}
	if let Some(concurrency) = section.container_concurrency {
		config.container_concurrency = concurrency;
	}
	if let Some(workers) = section.workers {
		config.workers = workers;
	}
	if let Some(timeout) = section.timeout_secs {
		config.timeout_secs = timeout;
	}
	config
}

pub fn vpc_config(lifecycle: &LifecycleConfig, section: &stratus_config::VpcConfig) -> VpcConfig {
	let mut config = VpcConfig::new(&section.endpoint);
	if let Some(iam_url) = &section.iam_url {
		config.iam_url = iam_url.clone();
	}
	config.vpc_id = section.vpc_id.clone();
	config.subnet_id = section.subnet_id.clone();
	config.security_group_id = section.security_group_id.clone();
	config.image_id = section.image_id.clone();
	config.key_id = section.key_id.clone();
	config.resource_group_id = section.resource_group_id.clone();
	config.zone_name = section.zone_name.clone();
	if let Some(profile) = &section.profile_name {
		config.profile_name = profile.clone();
	}
	if let Some(profile) = &section.volume_profile {
		config.volume_profile = profile.clone();
	}
	if let Some(capacity) = section.boot_volume_capacity {
		config.boot_volume_capacity = capacity;
	}
	if let Some(port) = section.port {
		config.port = port;
	}
	if let Some(delete) = lifecycle.delete_on_dismantle {
		config.delete_on_dismantle = delete;
	}
	config.readiness = lifecycle.readiness();
	config.token_margin = lifecycle.token_margin;
	config.name_prefix = lifecycle.name_prefix.clone();
	config
}

/// Build the backend `config` selects.
pub fn connect(config: &StratusConfig) -> Result<Selected> {
	match config.lifecycle.backend {
		BackendKind::CloudRun => {
			let section = config
				.cloudrun
				.as_ref()
				.ok_or_else(|| anyhow!("cloudrun backend selected but not configured"))?;
			let cloudrun = cloudrun_config(&config.lifecycle, section);
			let spec = cloudrun.default_spec();
			let metadata_url = section
				.metadata_url
				.as_deref()
				.unwrap_or(DEFAULT_METADATA_URL);
			info!(project = %cloudrun.project, region = %cloudrun.region, "using Cloud Run backend");
			let backend = CloudRunBackend::connect(cloudrun, section.access_token.clone(), metadata_url)
				.context("failed to set up the Cloud Run backend")?;
			Ok(Selected {
				backend: Box::new(backend),
				spec,
			})
		}
		BackendKind::Vpc => {
			let section = config
				.vpc
				.as_ref()
				.ok_or_else(|| anyhow!("vpc backend selected but not configured"))?;
			let api_key = section
				.api_key
				.clone()
				.ok_or_else(|| anyhow!("STRATUS_VPC_API_KEY is not set"))?;
			let vpc = vpc_config(&config.lifecycle, section);
			info!(endpoint = %vpc.endpoint, "using VPC backend");
			let backend =
				VpcBackend::connect(vpc, api_key).context("failed to set up the VPC backend")?;
			Ok(Selected {
				backend: Box::new(backend),
				spec: UnitSpec::default(),
			})
		}
	}
}
