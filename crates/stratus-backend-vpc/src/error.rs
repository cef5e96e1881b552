// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use stratus_lifecycle::{AuthError, LifecycleError};
use thiserror::Error;

/// Errors from the VPC infrastructure API.
#[derive(Error, Debug)]
pub enum VpcError {
	#[error("{kind} not found: {id}")]
	NotFound { kind: &'static str, id: String },

	#[error("VPC API error: HTTP {status}: {message}")]
	ApiError { status: u16, message: String },

	#[error("VPC API request failed: {message}")]
	RequestError { message: String },

	#[error("Invalid VPC API response: {message}")]
	DecodeError { message: String },

	#[error(transparent)]
	Auth(#[from] AuthError),
}

impl VpcError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, VpcError::NotFound { .. })
	}
}

impl From<reqwest::Error> for VpcError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			VpcError::DecodeError {
				message: err.to_string(),
			}
		} else {
			VpcError::RequestError {
				message: err.to_string(),
			}
		}
	}
}

impl From<VpcError> for LifecycleError {
	fn from(err: VpcError) -> Self {
		match err {
			VpcError::Auth(e) => LifecycleError::Auth(e),
			other => LifecycleError::control_plane(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn auth_errors_keep_their_kind() {
		let err: LifecycleError = VpcError::Auth(AuthError::NotConfigured("iam".into())).into();
		assert!(matches!(err, LifecycleError::Auth(_)));

		let err: LifecycleError = VpcError::NotFound {
			kind: "instance",
			id: "0717".into(),
		}
		.into();
		assert_eq!(err.to_string(), "Control plane error: instance not found: 0717");
	}
}
