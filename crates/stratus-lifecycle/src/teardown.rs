// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decommissioning policy and best-effort teardown bookkeeping.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::LifecycleError;

/// What `stop` does to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
	/// Release addresses and delete the unit.
	Delete,
	/// Pause the unit and keep its addresses for reuse.
	Suspend,
}

impl StopPolicy {
	pub fn from_delete_on_dismantle(delete_on_dismantle: bool) -> Self {
		if delete_on_dismantle {
			StopPolicy::Delete
		} else {
			StopPolicy::Suspend
		}
	}
}

/// Outcome of a `stop`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
	/// Steps that completed.
	pub completed: Vec<String>,
	/// Steps that failed, as `"{step}: {error}"`.
	pub failures: Vec<String>,
}

impl TeardownReport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record a best-effort step. Failures are logged and kept; the caller
	/// carries on with the next step.
	pub fn record<T>(
		&mut self,
		step: impl Into<String>,
		result: Result<T, LifecycleError>,
	) -> Option<T> {
		let step = step.into();
		match result {
			Ok(value) => {
				debug!(step = %step, "teardown step completed");
				self.completed.push(step);
				Some(value)
			}
			Err(e) => {
				warn!(step = %step, error = %e, "teardown step failed");
				self.failures.push(format!("{step}: {e}"));
				None
			}
		}
	}

	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}

	/// Turn the report into the error raised when the final delete failed.
	pub fn into_error(self, name: impl Into<String>) -> LifecycleError {
		LifecycleError::Teardown {
			name: name.into(),
			failures: self.failures,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn policy_from_flag() {
		assert_eq!(StopPolicy::from_delete_on_dismantle(true), StopPolicy::Delete);
		assert_eq!(StopPolicy::from_delete_on_dismantle(false), StopPolicy::Suspend);
	}

	#[test]
	fn record_collects_failures_and_continues() {
		let mut report = TeardownReport::new();
		let released = report.record("release 10.0.0.1", Ok::<_, LifecycleError>(()));
		let missing = report.record::<()>(
			"release 10.0.0.2",
			Err(LifecycleError::control_plane("HTTP 409")),
		);
		report.record("delete instance", Ok::<_, LifecycleError>(()));

		assert!(released.is_some());
		assert!(missing.is_none());
		assert_eq!(report.completed, vec!["release 10.0.0.1", "delete instance"]);
		assert_eq!(
			report.failures,
			vec!["release 10.0.0.2: Control plane error: HTTP 409"]
		);
		assert!(!report.is_clean());
	}

	#[test]
	fn into_error_carries_every_failure() {
		let mut report = TeardownReport::new();
		report.record::<()>("a", Err(LifecycleError::control_plane("x")));
		report.record::<()>("b", Err(LifecycleError::control_plane("y")));

		match report.into_error("vm") {
			LifecycleError::Teardown { name, failures } => {
				assert_eq!(name, "vm");
				assert_eq!(failures.len(), 2);
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}
}
