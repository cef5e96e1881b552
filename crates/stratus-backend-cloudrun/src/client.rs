// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::CloudRunError;
use crate::types::Service;

/// Control-plane operations on serving Services.
///
/// Implemented over HTTP by [`RunApiClient`](crate::RunApiClient) and by
/// in-memory doubles in tests.
#[async_trait]
pub trait ServiceApi: Send + Sync {
	/// Fetch a service by name. Missing services are
	/// [`CloudRunError::ServiceNotFound`].
	async fn get_service(&self, name: &str) -> Result<Service, CloudRunError>;

	/// Submit a new service. An existing one with the same name is
	/// [`CloudRunError::ServiceAlreadyExists`].
	async fn create_service(&self, service: &Service) -> Result<Service, CloudRunError>;

	/// Every service in the project and region.
	async fn list_services(&self) -> Result<Vec<Service>, CloudRunError>;

	async fn delete_service(&self, name: &str) -> Result<(), CloudRunError>;
}
