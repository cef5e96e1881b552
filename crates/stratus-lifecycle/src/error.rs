// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle error types.

use crate::unit::UnitStatus;

/// A derived or supplied name violates the platform naming rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid resource name {name:?}: {reason}")]
pub struct InvalidNameError {
	pub name: String,
	pub reason: String,
}

impl InvalidNameError {
	pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			reason: reason.into(),
		}
	}
}

/// Errors raised while obtaining credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	/// The token source could not be reached
	#[error("Token request to {source_name} failed: {message}")]
	Request {
		source_name: String,
		message: String,
	},

	/// The token source answered with a non-success status
	#[error("Token source {source_name} rejected the request: HTTP {status}: {body}")]
	Rejected {
		source_name: String,
		status: u16,
		body: String,
	},

	/// The token source answered with something that is not a token
	#[error("Invalid token response from {source_name}: {message}")]
	InvalidResponse {
		source_name: String,
		message: String,
	},

	/// No credentials are configured for the requested source
	#[error("No credentials configured: {0}")]
	NotConfigured(String),
}

/// Errors surfaced by the lifecycle manager.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
	#[error(transparent)]
	InvalidName(#[from] InvalidNameError),

	#[error(transparent)]
	Auth(#[from] AuthError),

	/// Readiness polling exhausted its budget
	#[error("Compute unit {name} not ready after {attempts} polls (last status: {last_status})")]
	ProvisioningTimeout {
		name: String,
		attempts: u32,
		last_status: String,
	},

	/// The create call was rejected or partially failed; rollback was attempted
	#[error("Provisioning {name} failed: {message}{}", rollback_suffix(.rollback_failures))]
	Provisioning {
		name: String,
		message: String,
		rollback_failures: Vec<String>,
	},

	/// The unit cannot receive work in its current state
	#[error("Compute unit {name} is not ready (status: {status})")]
	NotReady { name: String, status: UnitStatus },

	/// No unit with this name is known to the process or the provider
	#[error("Compute unit {name} does not exist; create it first")]
	UnknownUnit { name: String },

	/// The unit answered with a non-success status or an undecodable body
	#[error("Invocation failed with HTTP {status}: {body}")]
	Invocation { status: u16, body: String },

	/// The invocation never reached the unit
	#[error("Invocation transport error: {message}")]
	InvocationTransport { message: String },

	/// The final delete failed; carries every sub-step failure
	#[error("Teardown of {name} failed: {}", .failures.join("; "))]
	Teardown { name: String, failures: Vec<String> },

	#[error("Invalid transition for {name}: {from} -> {to}")]
	InvalidTransition {
		name: String,
		from: UnitStatus,
		to: UnitStatus,
	},

	/// Provider control-plane call failed
	#[error("Control plane error: {message}")]
	ControlPlane { message: String },
}

fn rollback_suffix(failures: &[String]) -> String {
	if failures.is_empty() {
		String::new()
	} else {
		format!(" (rollback incomplete: {})", failures.join("; "))
	}
}

impl LifecycleError {
	pub fn control_plane(message: impl Into<String>) -> Self {
		Self::ControlPlane {
			message: message.into(),
		}
	}

	pub fn provisioning(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Provisioning {
			name: name.into(),
			message: message.into(),
			rollback_failures: Vec::new(),
		}
	}
}
