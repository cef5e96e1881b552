// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Managed container service backend for stratus.
//!
//! Each compute unit is one Knative-style service in a project and region.
//! Readiness follows the service's status conditions and its published URL;
//! invocations carry identity tokens whose audience is the target URL.

pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod manifest;
pub mod run_client;
pub mod types;

pub use auth::{AdcTokenSource, MetadataIdentityAuthority, DEFAULT_METADATA_URL};
pub use backend::{CloudRunBackend, PROVIDER};
pub use client::ServiceApi;
pub use config::{CloudRunConfig, DEFAULT_METADATA_ROUTE};
pub use error::CloudRunError;
pub use run_client::{regional_endpoint, RunApiClient};
pub use types::Service;
