// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The subset of the VPC infrastructure API resources stratus uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_RUNNING: &str = "running";
pub const STATUS_STOPPED: &str = "stopped";
pub const STATUS_FAILED: &str = "failed";

/// Reference to a resource by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
	pub id: String,
}

impl IdRef {
	pub fn new(id: impl Into<String>) -> Self {
		Self { id: id.into() }
	}
}

/// Reference to a resource by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRef {
	pub name: String,
}

impl NameRef {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
	pub id: String,
	pub name: String,
	/// `pending`, `starting`, `running`, `stopping`, `stopped`, `failed`, ...
	#[serde(default)]
	pub status: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub primary_network_interface: Option<NetworkInterfaceRef>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub network_interfaces: Vec<NetworkInterfaceRef>,
}

impl Instance {
	/// Interface floating IPs are bound to.
	pub fn primary_interface(&self) -> Option<&NetworkInterfaceRef> {
		self.primary_network_interface
			.as_ref()
			.or_else(|| self.network_interfaces.first())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceRef {
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub primary_ipv4_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub primary_ipv4_address: Option<String>,
	#[serde(default)]
	pub floating_ips: Vec<FloatingIpRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingIpRef {
	pub id: String,
	pub address: String,
	#[serde(default)]
	pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatingIp {
	pub id: String,
	pub name: String,
	pub address: String,
	#[serde(default)]
	pub status: String,
	/// The network interface the address is bound to, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target: Option<NetworkInterfaceRef>,
}

impl FloatingIp {
	pub fn is_bound_to(&self, interface_id: &str) -> bool {
		self.target.as_ref().is_some_and(|t| t.id == interface_id)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstancePrototype {
	pub name: String,
	pub keys: Vec<IdRef>,
	pub profile: NameRef,
	pub resource_group: IdRef,
	pub vpc: IdRef,
	pub image: IdRef,
	pub zone: NameRef,
	pub boot_volume_attachment: VolumeAttachmentPrototype,
	pub primary_network_interface: NetworkInterfacePrototype,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeAttachmentPrototype {
	pub name: String,
	pub delete_volume_on_instance_delete: bool,
	pub volume: VolumePrototype,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumePrototype {
	pub name: String,
	pub capacity: u32,
	pub profile: NameRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInterfacePrototype {
	pub name: String,
	pub subnet: IdRef,
	pub security_groups: Vec<IdRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloatingIpPrototype {
	pub name: String,
	pub zone: NameRef,
	pub resource_group: IdRef,
}

/// Power actions on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceAction {
	Start,
	Stop,
	Reboot,
}

impl InstanceAction {
	pub fn as_str(self) -> &'static str {
		match self {
			InstanceAction::Start => "start",
			InstanceAction::Stop => "stop",
			InstanceAction::Reboot => "reboot",
		}
	}

	/// Status the instance settles in once the action completes.
	pub fn expected_status(self) -> &'static str {
		match self {
			InstanceAction::Start | InstanceAction::Reboot => STATUS_RUNNING,
			InstanceAction::Stop => STATUS_STOPPED,
		}
	}
}

/// Link to another page of a collection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageLink {
	pub href: String,
}

/// One page of a paginated collection.
pub trait Page {
	type Item;

	fn into_parts(self) -> (Vec<Self::Item>, Option<PageLink>);
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceList {
	#[serde(default)]
	pub instances: Vec<Instance>,
	#[serde(default)]
	pub next: Option<PageLink>,
}

impl Page for InstanceList {
	type Item = Instance;

	fn into_parts(self) -> (Vec<Instance>, Option<PageLink>) {
		(self.instances, self.next)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FloatingIpList {
	#[serde(default)]
	pub floating_ips: Vec<FloatingIp>,
	#[serde(default)]
	pub next: Option<PageLink>,
}

impl Page for FloatingIpList {
	type Item = FloatingIp;

	fn into_parts(self) -> (Vec<FloatingIp>, Option<PageLink>) {
		(self.floating_ips, self.next)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkInterfaceList {
	#[serde(default)]
	pub network_interfaces: Vec<NetworkInterface>,
}
