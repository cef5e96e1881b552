// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compute unit state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::error::LifecycleError;

/// Lifecycle status of a compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
	Provisioning,
	Ready,
	Running,
	Stopping,
	Suspended,
	Deleted,
	Failed,
}

impl UnitStatus {
	/// Whether `self -> next` is a legal transition.
	///
	/// ```text
	/// Provisioning -> Ready | Failed | Stopping
	/// Ready        -> Running | Stopping
	/// Running      -> Stopping
	/// Stopping     -> Deleted | Suspended | Failed
	/// Suspended    -> Provisioning | Stopping
	/// Failed       -> Stopping
	/// ```
	pub fn can_transition_to(self, next: UnitStatus) -> bool {
		use UnitStatus::*;
		matches!(
			(self, next),
			(Provisioning, Ready)
				| (Provisioning, Failed)
				| (Provisioning, Stopping)
				| (Ready, Running)
				| (Ready, Stopping)
				| (Running, Stopping)
				| (Stopping, Deleted)
				| (Stopping, Suspended)
				| (Stopping, Failed)
				| (Suspended, Provisioning)
				| (Suspended, Stopping)
				| (Failed, Stopping)
		)
	}

	pub fn accepts_invocations(self) -> bool {
		matches!(self, UnitStatus::Ready | UnitStatus::Running)
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, UnitStatus::Deleted)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			UnitStatus::Provisioning => "provisioning",
			UnitStatus::Ready => "ready",
			UnitStatus::Running => "running",
			UnitStatus::Stopping => "stopping",
			UnitStatus::Suspended => "suspended",
			UnitStatus::Deleted => "deleted",
			UnitStatus::Failed => "failed",
		}
	}
}

impl fmt::Display for UnitStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A provisioned (or provisioning) compute unit.
///
/// `endpoint` is only ever set on entering `Ready` and is cleared when the
/// unit leaves the serving states through a restart or deletion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeUnit {
	pub id: String,
	pub name: String,
	status: UnitStatus,
	endpoint: Option<Url>,
	/// Routable addresses attached to the unit (VM-style units only).
	addresses: Vec<String>,
	pub created_at: DateTime<Utc>,
}

impl ComputeUnit {
	/// A unit whose create call was just accepted.
	pub fn provisioning(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			status: UnitStatus::Provisioning,
			endpoint: None,
			addresses: Vec::new(),
			created_at: Utc::now(),
		}
	}

	/// A unit found already existing at the provider.
	///
	/// Serving states without an endpoint are downgraded to `Provisioning`
	/// so the caller resolves the endpoint through the normal readiness path.
	pub fn adopt(
		id: impl Into<String>,
		name: impl Into<String>,
		observed: UnitStatus,
		endpoint: Option<Url>,
		created_at: Option<DateTime<Utc>>,
	) -> Self {
		let (status, endpoint) = match (observed, endpoint) {
			(s, Some(url)) if s.accepts_invocations() => (s, Some(url)),
			(s, _) if s.accepts_invocations() => (UnitStatus::Provisioning, None),
			(s, _) => (s, None),
		};
		Self {
			id: id.into(),
			name: name.into(),
			status,
			endpoint,
			addresses: Vec::new(),
			created_at: created_at.unwrap_or_else(Utc::now),
		}
	}

	pub fn status(&self) -> UnitStatus {
		self.status
	}

	pub fn endpoint(&self) -> Option<&Url> {
		self.endpoint.as_ref()
	}

	pub fn addresses(&self) -> &[String] {
		&self.addresses
	}

	pub fn set_addresses(&mut self, addresses: Vec<String>) {
		self.addresses = addresses;
	}

	/// Move to `next`, rejecting transitions the state machine forbids.
	pub fn transition(&mut self, next: UnitStatus) -> Result<(), LifecycleError> {
		if next == UnitStatus::Ready {
			return Err(self.invalid(next));
		}
		self.apply(next)
	}

	/// Enter `Ready` with the endpoint the unit serves on.
	pub fn mark_ready(&mut self, endpoint: Url) -> Result<(), LifecycleError> {
		if !self.status.can_transition_to(UnitStatus::Ready) {
			return Err(self.invalid(UnitStatus::Ready));
		}
		self.endpoint = Some(endpoint);
		self.apply(UnitStatus::Ready)
	}

	fn apply(&mut self, next: UnitStatus) -> Result<(), LifecycleError> {
		if !self.status.can_transition_to(next) {
			return Err(self.invalid(next));
		}
		info!(
			unit = %self.name,
			from = %self.status,
			to = %next,
			"compute unit transition"
		);
		if matches!(next, UnitStatus::Provisioning | UnitStatus::Deleted) {
			self.endpoint = None;
		}
		self.status = next;
		Ok(())
	}

	fn invalid(&self, to: UnitStatus) -> LifecycleError {
		LifecycleError::InvalidTransition {
			name: self.name.clone(),
			from: self.status,
			to,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ALL: [UnitStatus; 7] = [
		UnitStatus::Provisioning,
		UnitStatus::Ready,
		UnitStatus::Running,
		UnitStatus::Stopping,
		UnitStatus::Suspended,
		UnitStatus::Deleted,
		UnitStatus::Failed,
	];

	fn endpoint() -> Url {
		Url::parse("https://svc.example/").unwrap()
	}

	#[test]
	fn happy_path() {
		let mut unit = ComputeUnit::provisioning("uid-1", "svc");
		assert!(unit.endpoint().is_none());

		unit.mark_ready(endpoint()).unwrap();
		assert_eq!(unit.status(), UnitStatus::Ready);
		assert_eq!(unit.endpoint(), Some(&endpoint()));

		unit.transition(UnitStatus::Running).unwrap();
		unit.transition(UnitStatus::Stopping).unwrap();
		unit.transition(UnitStatus::Deleted).unwrap();
		assert!(unit.endpoint().is_none());
		assert!(unit.status().is_terminal());
	}

	#[test]
	fn ready_only_via_mark_ready() {
		let mut unit = ComputeUnit::provisioning("uid-1", "svc");
		let err = unit.transition(UnitStatus::Ready).unwrap_err();
		assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
		assert_eq!(unit.status(), UnitStatus::Provisioning);
	}

	#[test]
	fn illegal_transitions_are_rejected() {
		let mut unit = ComputeUnit::provisioning("uid-1", "svc");
		assert!(unit.transition(UnitStatus::Running).is_err());
		assert!(unit.transition(UnitStatus::Deleted).is_err());

		unit.transition(UnitStatus::Failed).unwrap();
		assert!(unit.mark_ready(endpoint()).is_err());
		assert!(unit.endpoint().is_none());
	}

	#[test]
	fn deleted_is_terminal() {
		for next in ALL {
			assert!(!UnitStatus::Deleted.can_transition_to(next));
		}
	}

	#[test]
	fn suspend_and_restart() {
		let mut unit = ComputeUnit::provisioning("uid-1", "vm");
		unit.mark_ready(endpoint()).unwrap();
		unit.transition(UnitStatus::Stopping).unwrap();
		unit.transition(UnitStatus::Suspended).unwrap();
		assert_eq!(unit.endpoint(), Some(&endpoint()));

		unit.transition(UnitStatus::Provisioning).unwrap();
		assert!(unit.endpoint().is_none());
		unit.mark_ready(endpoint()).unwrap();
	}

	#[test]
	fn failed_reachable_only_from_provisioning_or_stopping() {
		for from in ALL {
			let expected = matches!(from, UnitStatus::Provisioning | UnitStatus::Stopping);
			assert_eq!(from.can_transition_to(UnitStatus::Failed), expected, "{from}");
		}
	}

	#[test]
	fn provisioning_unit_can_be_abandoned() {
		let mut unit = ComputeUnit::provisioning("uid-1", "svc");
		unit.transition(UnitStatus::Stopping).unwrap();
		unit.transition(UnitStatus::Deleted).unwrap();
	}

	#[test]
	fn adopt_without_endpoint_downgrades() {
		let unit = ComputeUnit::adopt("uid", "svc", UnitStatus::Ready, None, None);
		assert_eq!(unit.status(), UnitStatus::Provisioning);

		let unit = ComputeUnit::adopt("uid", "svc", UnitStatus::Ready, Some(endpoint()), None);
		assert_eq!(unit.status(), UnitStatus::Ready);
		assert!(unit.endpoint().is_some());

		let unit = ComputeUnit::adopt("uid", "vm", UnitStatus::Suspended, Some(endpoint()), None);
		assert_eq!(unit.status(), UnitStatus::Suspended);
		assert!(unit.endpoint().is_none());
	}

	#[test]
	fn status_serializes_snake_case() {
		let json = serde_json::to_string(&UnitStatus::Provisioning).unwrap();
		assert_eq!(json, "\"provisioning\"");
	}
}
