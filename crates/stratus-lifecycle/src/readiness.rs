// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded readiness polling.

use std::future::Future;

use tracing::{debug, warn};

use crate::backoff::ReadinessPolicy;
use crate::error::LifecycleError;

/// One condition reported by the provider for a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
	pub kind: String,
	pub satisfied: bool,
	pub message: Option<String>,
}

impl Condition {
	pub fn new(kind: impl Into<String>, satisfied: bool) -> Self {
		Self {
			kind: kind.into(),
			satisfied,
			message: None,
		}
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}
}

/// Result of one poll: the reported conditions plus whatever the caller
/// extracted from the resource (usually its endpoint).
#[derive(Debug, Clone)]
pub struct Observation<T> {
	pub conditions: Vec<Condition>,
	pub value: T,
}

impl<T> Observation<T> {
	pub fn new(conditions: Vec<Condition>, value: T) -> Self {
		Self { conditions, value }
	}

	/// Ready only when at least one condition is reported and all hold.
	pub fn is_ready(&self) -> bool {
		!self.conditions.is_empty() && self.conditions.iter().all(|c| c.satisfied)
	}

	/// `kind=true|false(message)` for every condition, comma separated.
	pub fn summary(&self) -> String {
		if self.conditions.is_empty() {
			return "no conditions reported".to_string();
		}
		self.conditions
			.iter()
			.map(|c| match &c.message {
				Some(message) => format!("{}={}({message})", c.kind, c.satisfied),
				None => format!("{}={}", c.kind, c.satisfied),
			})
			.collect::<Vec<_>>()
			.join(", ")
	}
}

/// Poll `observe` until it reports ready or `policy.budget` polls have been
/// made, sleeping `policy.delay(attempt)` between polls.
///
/// Errors from `observe` end polling immediately. Exhaustion yields
/// [`LifecycleError::ProvisioningTimeout`] with the last observed status.
pub async fn poll_until_ready<T, F, Fut>(
	name: &str,
	policy: &ReadinessPolicy,
	mut observe: F,
) -> Result<T, LifecycleError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<Observation<T>, LifecycleError>>,
{
	let mut last_status = "not polled".to_string();

	for attempt in 0..policy.budget {
		let observation = observe().await?;
		if observation.is_ready() {
			debug!(unit = name, attempt, "resource ready");
			return Ok(observation.value);
		}

		last_status = observation.summary();
		debug!(unit = name, attempt, status = %last_status, "resource not ready");

		if attempt + 1 < policy.budget {
			tokio::time::sleep(policy.delay(attempt)).await;
		}
	}

	warn!(
		unit = name,
		attempts = policy.budget,
		status = %last_status,
		"readiness budget exhausted"
	);
	Err(LifecycleError::ProvisioningTimeout {
		name: name.to_string(),
		attempts: policy.budget,
		last_status,
	})
}
