// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request bodies for the resources of one unit.

use stratus_lifecycle::{
	ComputeUnitIdentity, LifecycleError, ResourceKind, ResourceNamer, UnitSpec,
};

use crate::config::VpcConfig;
use crate::types::{
	FloatingIpPrototype, IdRef, InstancePrototype, NameRef, NetworkInterfacePrototype,
	VolumeAttachmentPrototype, VolumePrototype,
};

/// vCPUs and memory (GB) of a `{family}-{vcpu}x{memory}` profile name such
/// as `bx2-8x32`.
pub fn profile_shape(profile: &str) -> Option<(u32, u32)> {
	let (_, shape) = profile.rsplit_once('-')?;
	let (vcpu, memory) = shape.split_once('x')?;
	Some((vcpu.parse().ok()?, memory.parse().ok()?))
}

/// CPU quantity in millicores (`"2"` is 2000, `"500m"` is 500).
fn millicores(cpu: &str) -> Option<u64> {
	let cpu = cpu.trim();
	match cpu.strip_suffix('m') {
		Some(milli) => milli.parse().ok(),
		None => cpu
			.parse::<f64>()
			.ok()
			.filter(|c| c.is_finite() && *c >= 0.0)
			.map(|c| (c * 1000.0).ceil() as u64),
	}
}

/// Profile the unit is created with. The configured profile must cover the
/// identity's size class and the requested CPU; profiles whose name does not
/// encode a shape are used as configured.
pub fn profile_for(
	config: &VpcConfig,
	identity: &ComputeUnitIdentity,
	spec: &UnitSpec,
) -> Result<String, LifecycleError> {
	let profile = &config.profile_name;
	let Some((vcpu, memory_gb)) = profile_shape(profile) else {
		return Ok(profile.clone());
	};

	if u64::from(identity.size_class) > u64::from(memory_gb) * 1024 {
		return Err(LifecycleError::provisioning(
			identity.to_string(),
			format!(
				"size class {} MB exceeds profile {profile} ({memory_gb} GB)",
				identity.size_class
			),
		));
	}

	let requested = millicores(&spec.cpu).ok_or_else(|| {
		LifecycleError::provisioning(identity.to_string(), format!("invalid cpu {:?}", spec.cpu))
	})?;
	if requested > u64::from(vcpu) * 1000 {
		return Err(LifecycleError::provisioning(
			identity.to_string(),
			format!("cpu {} exceeds profile {profile} ({vcpu} vCPU)", spec.cpu),
		));
	}
	Ok(profile.clone())
}

/// Instance prototype for the unit with base name `base`. Every component
/// is named from the same base.
pub fn instance_prototype(
	config: &VpcConfig,
	namer: &ResourceNamer,
	base: &str,
	profile: &str,
	user_data: Option<String>,
) -> Result<InstancePrototype, LifecycleError> {
	let missing = config.missing_identifiers();
	if !missing.is_empty() {
		return Err(LifecycleError::provisioning(
			base,
			format!("missing VPC configuration: {}", missing.join(", ")),
		));
	}

	Ok(InstancePrototype {
		name: namer.component_name(base, ResourceKind::Instance)?,
		keys: vec![IdRef::new(&config.key_id)],
		profile: NameRef::new(profile),
		resource_group: IdRef::new(&config.resource_group_id),
		vpc: IdRef::new(&config.vpc_id),
		image: IdRef::new(&config.image_id),
		zone: NameRef::new(&config.zone_name),
		boot_volume_attachment: VolumeAttachmentPrototype {
			name: namer.component_name(base, ResourceKind::BootVolume)?,
			delete_volume_on_instance_delete: true,
			volume: VolumePrototype {
				name: namer.component_name(base, ResourceKind::Volume)?,
				capacity: config.boot_volume_capacity,
				profile: NameRef::new(&config.volume_profile),
			},
		},
		primary_network_interface: NetworkInterfacePrototype {
			name: "eth0".to_string(),
			subnet: IdRef::new(&config.subnet_id),
			security_groups: vec![IdRef::new(&config.security_group_id)],
		},
		user_data,
	})
}

pub fn floating_ip_prototype(config: &VpcConfig, name: &str) -> FloatingIpPrototype {
	FloatingIpPrototype {
		name: name.to_string(),
		zone: NameRef::new(&config.zone_name),
		resource_group: IdRef::new(&config.resource_group_id),
	}
}
