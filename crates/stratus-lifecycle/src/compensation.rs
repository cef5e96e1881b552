// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Undo log for multi-step provisioning.

use std::future::Future;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::error::LifecycleError;

type UndoFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), LifecycleError>> + Send>;

/// Records one undo action per completed provisioning step.
///
/// [`rollback`](Self::rollback) runs them newest first; every action runs
/// even when an earlier one fails. [`commit`](Self::commit) discards them
/// once the unit is fully provisioned.
pub struct Compensation {
	name: String,
	steps: Vec<(String, UndoFn)>,
}

impl Compensation {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			steps: Vec::new(),
		}
	}

	pub fn register<F, Fut>(&mut self, label: impl Into<String>, undo: F)
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
	{
		let label = label.into();
		debug!(unit = %self.name, step = %label, "registered undo step");
		self.steps.push((label, Box::new(move || Box::pin(undo()))));
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	pub fn commit(mut self) {
		debug!(unit = %self.name, steps = self.steps.len(), "provisioning committed");
		self.steps.clear();
	}

	/// Run every undo step in reverse registration order and return the
	/// failures as `"{label}: {error}"`.
	pub async fn rollback(mut self) -> Vec<String> {
		let steps = std::mem::take(&mut self.steps);
		let mut failures = Vec::new();

		for (label, undo) in steps.into_iter().rev() {
			match undo().await {
				Ok(()) => info!(unit = %self.name, step = %label, "rolled back"),
				Err(e) => {
					warn!(unit = %self.name, step = %label, error = %e, "rollback step failed");
					failures.push(format!("{label}: {e}"));
				}
			}
		}

		failures
	}

	/// Roll back, then turn `error` into the error the caller should see.
	///
	/// Readiness timeouts keep their variant; everything else becomes
	/// [`LifecycleError::Provisioning`] carrying the rollback failures.
	pub async fn abort(self, error: LifecycleError) -> LifecycleError {
		let name = self.name.clone();
		let failures = self.rollback().await;

		match error {
			LifecycleError::ProvisioningTimeout { .. } => {
				if !failures.is_empty() {
					warn!(unit = %name, failures = ?failures, "rollback after timeout incomplete");
				}
				error
			}
			LifecycleError::Provisioning {
				name,
				message,
				mut rollback_failures,
			} => {
				rollback_failures.extend(failures);
				LifecycleError::Provisioning {
					name,
					message,
					rollback_failures,
				}
			}
			other => LifecycleError::Provisioning {
				name,
				message: other.to_string(),
				rollback_failures: failures,
			},
		}
	}
}

impl Drop for Compensation {
	fn drop(&mut self) {
		if !self.steps.is_empty() {
			warn!(
				unit = %self.name,
				steps = self.steps.len(),
				"undo log dropped without commit or rollback"
			);
		}
	}
}
