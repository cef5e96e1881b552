// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Client builder preloaded with the stratus User-Agent.
///
/// ```ignore
/// let client = stratus_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

pub fn new_client() -> Result<Client, reqwest::Error> {
	builder().build()
}

/// Client whose requests fail after `timeout`. Used for control-plane calls;
/// invocations inherit the caller's timeout instead.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	builder().timeout(timeout).build()
}

/// Format: `stratus/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"stratus/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_names_product_and_platform() {
		let ua = user_agent();
		assert!(ua.starts_with("stratus/"));
		assert!(ua.contains(std::env::consts::OS));
	}

	#[tokio::test]
	async fn clients_build() {
		assert!(new_client().is_ok());
		assert!(new_client_with_timeout(Duration::from_secs(5)).is_ok());
	}
}
