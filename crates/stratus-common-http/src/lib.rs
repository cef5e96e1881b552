// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client construction for stratus.
//!
//! Control-plane clients and the invoker both build their `reqwest::Client`
//! here so every outbound request carries the same User-Agent.

mod client;

pub use client::{builder, new_client, new_client_with_timeout, user_agent};
