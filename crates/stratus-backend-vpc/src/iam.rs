// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! IAM access tokens exchanged for an API key.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use stratus_common_secret::SecretString;
use stratus_lifecycle::{AuthError, Credential, TokenSource};
use tracing::debug;

pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";
pub const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

const SOURCE_NAME: &str = "iam-apikey";

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	/// Unix seconds.
	expiration: i64,
}

/// Exchanges an API key for a bearer token at `{iam_url}/identity/token`.
pub struct IamTokenSource {
	http: Client,
	iam_url: String,
	api_key: SecretString,
}

impl IamTokenSource {
	pub fn new(http: Client, iam_url: impl Into<String>, api_key: SecretString) -> Self {
		Self {
			http,
			iam_url: iam_url.into().trim_end_matches('/').to_string(),
			api_key,
		}
	}
}

#[async_trait]
impl TokenSource for IamTokenSource {
	fn name(&self) -> &str {
		SOURCE_NAME
	}

	async fn fetch(&self) -> Result<Credential, AuthError> {
		let request_err = |e: reqwest::Error| AuthError::Request {
			source_name: SOURCE_NAME.to_string(),
			message: e.to_string(),
		};

		debug!(url = %self.iam_url, "exchanging API key for IAM token");
		let response = self
			.http
			.post(format!("{}/identity/token", self.iam_url))
			.header("Accept", "application/json")
			.form(&[
				("grant_type", APIKEY_GRANT_TYPE),
				("apikey", self.api_key.expose().as_str()),
			])
			.send()
			.await
			.map_err(request_err)?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(AuthError::Rejected {
				source_name: SOURCE_NAME.to_string(),
				status: status.as_u16(),
				body,
			});
		}

		let token: TokenResponse = response.json().await.map_err(|e| AuthError::InvalidResponse {
			source_name: SOURCE_NAME.to_string(),
			message: e.to_string(),
		})?;
		let expires_at =
			DateTime::from_timestamp(token.expiration, 0).ok_or_else(|| AuthError::InvalidResponse {
				source_name: SOURCE_NAME.to_string(),
				message: format!("expiration {} out of range", token.expiration),
			})?;

		Ok(Credential::new(SecretString::new(token.access_token), expires_at))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use serde_json::json;
	use wiremock::matchers::{body_string_contains, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[tokio::test]
	async fn exchanges_api_key() {
		let server = MockServer::start().await;
		let expiration = Utc::now().timestamp() + 3600;
		Mock::given(method("POST"))
			.and(path("/identity/token"))
			.and(body_string_contains("grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey"))
			.and(body_string_contains("apikey=secret-key"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"access_token": "iam-token",
				"refresh_token": "not-used",
				"token_type": "Bearer",
				"expires_in": 3600,
				"expiration": expiration
			})))
			.expect(1)
			.mount(&server)
			.await;

		let source = IamTokenSource::new(Client::new(), server.uri(), "secret-key".into());
		let credential = source.fetch().await.unwrap();

		assert_eq!(credential.token().expose(), "iam-token");
		assert_eq!(credential.expires_at().timestamp(), expiration);
	}

	#[tokio::test]
	async fn rejected_key_is_reported() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(400).set_body_string("BXNIM0415E: Provided API key could not be found"))
			.mount(&server)
			.await;

		let source = IamTokenSource::new(Client::new(), server.uri(), "bad".into());
		match source.fetch().await.unwrap_err() {
			AuthError::Rejected { status, body, .. } => {
				assert_eq!(status, 400);
				assert!(body.contains("BXNIM0415E"));
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}
}
