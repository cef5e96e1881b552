// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Admin access tokens and audience-bound identity tokens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use gcp_auth::TokenProvider;
use reqwest::Client;
use serde::Deserialize;
use stratus_common_secret::SecretString;
use stratus_lifecycle::{AuthError, Credential, SessionAuthority, TokenSource};
use tokio::sync::OnceCell;
use tracing::{debug, error};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";

/// Lifetime assumed for ADC access tokens, which are issued for one hour.
const ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(3500);

/// Admin credentials from Application Default Credentials (service account
/// file, workload identity, or the metadata server).
pub struct AdcTokenSource {
	provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl AdcTokenSource {
	pub fn new() -> Self {
		Self {
			provider: OnceCell::new(),
		}
	}
}

impl Default for AdcTokenSource {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl TokenSource for AdcTokenSource {
	fn name(&self) -> &str {
		"gcp-adc"
	}

	async fn fetch(&self) -> Result<Credential, AuthError> {
		let provider = self
			.provider
			.get_or_try_init(|| async {
				debug!("initializing GCP authentication provider");
				gcp_auth::provider().await.map_err(|e| {
					error!(error = %e, "failed to initialize GCP auth");
					AuthError::NotConfigured(format!("GCP application default credentials: {e}"))
				})
			})
			.await?;

		let token = provider
			.token(&[CLOUD_PLATFORM_SCOPE])
			.await
			.map_err(|e| AuthError::Request {
				source_name: self.name().to_string(),
				message: e.to_string(),
			})?;

		let lifetime = chrono::Duration::from_std(ACCESS_TOKEN_LIFETIME)
			.unwrap_or_else(|_| chrono::Duration::minutes(55));
		Ok(Credential::new(
			SecretString::new(token.as_str().to_string()),
			Utc::now() + lifetime,
		))
	}
}

/// Identity tokens from the instance metadata server, one per audience.
///
/// Each invocation target is its own audience, so a session for `/` cannot be
/// reused for `/preinstalls`.
pub struct MetadataIdentityAuthority {
	http: Client,
	metadata_url: String,
}

impl MetadataIdentityAuthority {
	pub fn new(http: Client, metadata_url: impl Into<String>) -> Self {
		Self {
			http,
			metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
		}
	}
}

#[async_trait]
impl SessionAuthority for MetadataIdentityAuthority {
	async fn credential_for(&self, audience: &str) -> Result<Credential, AuthError> {
		let source_name = "gcp-metadata-identity";
		let url = format!(
			"{}/computeMetadata/v1/instance/service-accounts/default/identity",
			self.metadata_url
		);

		debug!(audience, "requesting identity token");
		let response = self
			.http
			.get(url)
			.header("Metadata-Flavor", "Google")
			.query(&[("audience", audience), ("format", "full")])
			.send()
			.await
			.map_err(|e| AuthError::Request {
				source_name: source_name.to_string(),
				message: e.to_string(),
			})?;

		let status = response.status();
		let body = response.text().await.map_err(|e| AuthError::Request {
			source_name: source_name.to_string(),
			message: e.to_string(),
		})?;
		if !status.is_success() {
			return Err(AuthError::Rejected {
				source_name: source_name.to_string(),
				status: status.as_u16(),
				body,
			});
		}

		let token = body.trim().to_string();
		let expires_at = jwt_expiry(&token).ok_or_else(|| AuthError::InvalidResponse {
			source_name: source_name.to_string(),
			message: "identity token has no readable exp claim".to_string(),
		})?;
		Ok(Credential::new(SecretString::new(token), expires_at))
	}
}

#[derive(Deserialize)]
struct Claims {
	exp: i64,
}

/// `exp` claim of a JWT, without verifying the signature.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
	let payload = token.split('.').nth(1)?;
	let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
	let claims: Claims = serde_json::from_slice(&decoded).ok()?;
	DateTime::from_timestamp(claims.exp, 0)
}
