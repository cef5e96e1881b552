// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::VpcError;
use crate::types::{
	FloatingIp, FloatingIpPrototype, Instance, InstanceAction, InstancePrototype, NetworkInterface,
};

/// VPC infrastructure operations used to manage virtual server units.
///
/// Implemented over HTTP by [`VpcHttpClient`](crate::VpcHttpClient) and by
/// in-memory doubles in tests. Lookups of missing resources return
/// [`VpcError::NotFound`]. List operations return every page.
#[async_trait]
pub trait VpcApi: Send + Sync {
	async fn list_instances(&self) -> Result<Vec<Instance>, VpcError>;

	/// The instance named `name`, if any.
	async fn find_instance(&self, name: &str) -> Result<Option<Instance>, VpcError> {
		let instances = self.list_instances().await?;
		Ok(instances.into_iter().find(|i| i.name == name))
	}

	async fn get_instance(&self, id: &str) -> Result<Instance, VpcError>;

	async fn create_instance(&self, prototype: &InstancePrototype) -> Result<Instance, VpcError>;

	async fn delete_instance(&self, id: &str) -> Result<(), VpcError>;

	/// Request a power action. Completion is observed by polling the instance.
	async fn create_instance_action(&self, id: &str, action: InstanceAction) -> Result<(), VpcError>;

	async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, VpcError>;

	/// The floating IP named `name`, if any.
	async fn find_floating_ip(&self, name: &str) -> Result<Option<FloatingIp>, VpcError> {
		let fips = self.list_floating_ips().await?;
		Ok(fips.into_iter().find(|fip| fip.name == name))
	}

	async fn create_floating_ip(&self, prototype: &FloatingIpPrototype)
		-> Result<FloatingIp, VpcError>;

	async fn delete_floating_ip(&self, id: &str) -> Result<(), VpcError>;

	/// Bind a floating IP to one of the instance's network interfaces.
	async fn add_instance_network_interface_floating_ip(
		&self,
		instance_id: &str,
		interface_id: &str,
		floating_ip_id: &str,
	) -> Result<FloatingIp, VpcError>;

	async fn list_instance_network_interfaces(
		&self,
		instance_id: &str,
	) -> Result<Vec<NetworkInterface>, VpcError>;
}
