// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use stratus_lifecycle::{AuthError, LifecycleError};
use thiserror::Error;

/// Errors from the serving control plane.
#[derive(Error, Debug)]
pub enum CloudRunError {
	#[error("Service not found: {name}")]
	ServiceNotFound { name: String },

	#[error("Service already exists: {name}")]
	ServiceAlreadyExists { name: String },

	#[error("Serving API error: HTTP {status}: {message}")]
	ApiError { status: u16, message: String },

	#[error("Serving API request failed: {message}")]
	RequestError { message: String },

	#[error("Invalid serving API response: {message}")]
	DecodeError { message: String },

	#[error(transparent)]
	Auth(#[from] AuthError),
}

impl From<reqwest::Error> for CloudRunError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			CloudRunError::DecodeError {
				message: err.to_string(),
			}
		} else {
			CloudRunError::RequestError {
				message: err.to_string(),
			}
		}
	}
}

impl From<CloudRunError> for LifecycleError {
	fn from(err: CloudRunError) -> Self {
		match err {
			CloudRunError::Auth(e) => LifecycleError::Auth(e),
			other => LifecycleError::control_plane(other.to_string()),
		}
	}
}
