// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! VPC virtual server backend for stratus.
//!
//! A compute unit is one instance plus a floating IP bound to its primary
//! interface. Creation is two-phase with compensating undo steps; stopping
//! either releases everything or powers the instance off and keeps its
//! address. Invocations carry a per-unit token rather than the account's
//! IAM token.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod iam;
pub mod prototype;
pub mod types;
pub mod unit_token;

pub use backend::{runtime_key, unit_status, VpcBackend, PROVIDER};
pub use client::VpcApi;
pub use config::VpcConfig;
pub use error::VpcError;
pub use http_client::VpcHttpClient;
pub use iam::{IamTokenSource, DEFAULT_IAM_URL};
pub use unit_token::{UnitTokens, INVOKE_TOKEN_PATH};
