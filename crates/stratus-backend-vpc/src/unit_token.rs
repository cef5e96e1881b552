// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-unit invocation tokens.
//!
//! Each unit gets `hex(HMAC-SHA256(key, instance_name))`, written to the
//! instance through cloud-init user data at create time. Invocations carry
//! that token, so a captured token only reaches the one unit it was derived
//! for. Any process holding the same key derives the same token, so units
//! adopted from another process stay invocable.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use stratus_common_secret::SecretString;
use stratus_lifecycle::{AuthError, Credential, SessionAuthority};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const SOURCE_NAME: &str = "unit-token";

/// Path the worker reads its token from.
pub const INVOKE_TOKEN_PATH: &str = "/etc/stratus/invoke-token";

/// How long an issued credential is treated as fresh before it is derived
/// again. The token itself never changes for a unit.
const CREDENTIAL_LIFETIME_HOURS: i64 = 12;

/// Derives unit tokens and maps unit addresses back to the unit they belong to.
pub struct UnitTokens {
	key: SecretString,
	/// Floating IP address to instance name.
	hosts: RwLock<HashMap<String, String>>,
}

impl UnitTokens {
	pub fn new(key: SecretString) -> Self {
		Self {
			key,
			hosts: RwLock::new(HashMap::new()),
		}
	}

	/// Token for the unit whose instance is named `unit_name`.
	pub fn token_for(&self, unit_name: &str) -> Result<SecretString, AuthError> {
		let mut mac = HmacSha256::new_from_slice(self.key.expose().as_bytes()).map_err(|e| {
			AuthError::InvalidResponse {
				source_name: SOURCE_NAME.to_string(),
				message: e.to_string(),
			}
		})?;
		mac.update(unit_name.as_bytes());
		Ok(SecretString::new(hex::encode(mac.finalize().into_bytes())))
	}

	/// cloud-init user data installing the unit's token.
	pub fn user_data(&self, unit_name: &str) -> Result<String, AuthError> {
		let token = self.token_for(unit_name)?;
		Ok(format!(
			"#cloud-config\nwrite_files:\n  - path: {INVOKE_TOKEN_PATH}\n    permissions: '0600'\n    content: {}\n",
			token.expose()
		))
	}

	/// Route invocations sent to `address` to the token of `unit_name`.
	pub async fn bind(&self, address: &str, unit_name: &str) {
		debug!(address = %address, unit = %unit_name, "bound unit address");
		self.hosts
			.write()
			.await
			.insert(address.to_string(), unit_name.to_string());
	}

	pub async fn unbind(&self, address: &str) {
		self.hosts.write().await.remove(address);
	}
}

#[async_trait]
impl SessionAuthority for UnitTokens {
	async fn credential_for(&self, audience: &str) -> Result<Credential, AuthError> {
		let host = Url::parse(audience)
			.ok()
			.and_then(|url| url.host_str().map(str::to_string))
			.ok_or_else(|| AuthError::NotConfigured(format!("no host in {audience}")))?;
		let unit_name = self
			.hosts
			.read()
			.await
			.get(&host)
			.cloned()
			.ok_or_else(|| AuthError::NotConfigured(format!("no unit is bound to {host}")))?;

		Ok(Credential::new(
			self.token_for(&unit_name)?,
			Utc::now() + chrono::Duration::hours(CREDENTIAL_LIFETIME_HOURS),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tokens(key: &str) -> UnitTokens {
		UnitTokens::new(SecretString::new(key.to_string()))
	}

	#[test]
	fn tokens_are_per_unit_and_stable() {
		let a = tokens("api-key");
		let b = tokens("api-key");

		let first = a.token_for("stratus-7-3-instance").unwrap();
		assert_eq!(first, b.token_for("stratus-7-3-instance").unwrap());
		assert_ne!(first, a.token_for("stratus-7-4-instance").unwrap());
		assert_ne!(first, tokens("other-key").token_for("stratus-7-3-instance").unwrap());
		assert_eq!(first.expose().len(), 64);
		assert!(!first.expose().contains("api-key"));
	}

	#[test]
	fn user_data_writes_the_token() {
		let tokens = tokens("api-key");
		let token = tokens.token_for("stratus-7-3-instance").unwrap();
		let user_data = tokens.user_data("stratus-7-3-instance").unwrap();

		assert!(user_data.starts_with("#cloud-config\n"));
		assert!(user_data.contains(INVOKE_TOKEN_PATH));
		assert!(user_data.contains(token.expose().as_str()));
	}

	#[tokio::test]
	async fn credential_follows_the_bound_unit() {
		let tokens = tokens("api-key");
		tokens.bind("169.61.1.1", "stratus-7-3-instance").await;

		let credential = tokens
			.credential_for("http://169.61.1.1:8080/")
			.await
			.unwrap();
		assert_eq!(
			credential.token(),
			&tokens.token_for("stratus-7-3-instance").unwrap()
		);

		tokens.unbind("169.61.1.1").await;
		let err = tokens
			.credential_for("http://169.61.1.1:8080/")
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::NotConfigured(_)));
	}

	#[tokio::test]
	async fn unknown_address_gets_no_credential() {
		let err = tokens("api-key")
			.credential_for("http://10.0.0.9:8080/")
			.await
			.unwrap_err();
		assert!(err.to_string().contains("10.0.0.9"));
	}
}
