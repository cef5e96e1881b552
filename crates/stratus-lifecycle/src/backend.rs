// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The public lifecycle contract every provider implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::LifecycleError;
use crate::identity::{ComputeUnitIdentity, UnitSpec};
use crate::invoker::{InvocationRequest, InvocationResult, Invoker, ResultMode};
use crate::registry::UnitSlot;
use crate::teardown::TeardownReport;
use crate::unit::UnitStatus;

/// What `create_runtime` hands back to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeMetadata {
	pub name: String,
	/// Opaque cache key; see [`Backend::get_runtime_key`].
	pub key: String,
	pub endpoint: Url,
	pub status: UnitStatus,
	/// True when an existing resource was reused instead of created.
	pub adopted: bool,
	/// Provider-specific metadata (e.g. the runtime's preinstalled modules).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

/// One managed unit as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeSummary {
	pub name: String,
	/// Recovered from the name when it follows the shared naming scheme.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub identity: Option<ComputeUnitIdentity>,
	pub status: UnitStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub created_at: Option<DateTime<Utc>>,
}

/// Provisions, invokes and decommissions compute units for one provider.
#[async_trait]
pub trait Backend: Send + Sync {
	/// Provider name, used as the first segment of runtime keys.
	fn provider(&self) -> &'static str;

	/// Create or adopt the unit for `identity` and wait until it is ready.
	async fn create_runtime(
		&self,
		identity: &ComputeUnitIdentity,
		spec: &UnitSpec,
	) -> Result<RuntimeMetadata, LifecycleError>;

	/// Send work to the unit for `identity`. Never provisions.
	async fn invoke(
		&self,
		identity: &ComputeUnitIdentity,
		request: &InvocationRequest,
		mode: ResultMode,
	) -> Result<InvocationResult, LifecycleError>;

	/// Suspend or delete the unit according to the configured stop policy.
	/// Stopping a unit that does not exist succeeds with an empty report.
	async fn stop(&self, identity: &ComputeUnitIdentity) -> Result<TeardownReport, LifecycleError>;

	/// Opaque key identifying the unit for caching by callers. Never parse it.
	async fn get_runtime_key(&self, identity: &ComputeUnitIdentity)
		-> Result<String, LifecycleError>;

	async fn list_runtimes(&self) -> Result<Vec<RuntimeSummary>, LifecycleError>;
}

/// Invoke the unit published in `slot` and promote it to `Running` once it
/// has accepted work.
pub async fn invoke_published(
	name: &str,
	slot: &UnitSlot,
	invoker: &Invoker,
	request: &InvocationRequest,
	mode: ResultMode,
) -> Result<InvocationResult, LifecycleError> {
	let unit = slot
		.current()
		.await
		.ok_or_else(|| LifecycleError::UnknownUnit {
			name: name.to_string(),
		})?;

	let result = invoker.invoke(&unit, request, mode).await?;
	slot.mark_running().await;
	Ok(result)
}
