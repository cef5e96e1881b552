// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide bearer credential with lazy refresh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stratus_common_secret::SecretString;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// Tokens expiring within this window are refreshed before use.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// A bearer token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
	token: SecretString,
	expires_at: DateTime<Utc>,
}

impl Credential {
	pub fn new(token: SecretString, expires_at: DateTime<Utc>) -> Self {
		Self { token, expires_at }
	}

	pub fn token(&self) -> &SecretString {
		&self.token
	}

	pub fn expires_at(&self) -> DateTime<Utc> {
		self.expires_at
	}

	/// True while the token stays valid for at least `margin` from now.
	pub fn is_valid_for(&self, margin: Duration) -> bool {
		let margin =
			chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::weeks(5200));
		match Utc::now().checked_add_signed(margin) {
			Some(deadline) => self.expires_at > deadline,
			None => false,
		}
	}
}

/// Where fresh credentials come from.
#[async_trait]
pub trait TokenSource: Send + Sync {
	/// Short name used in logs and errors.
	fn name(&self) -> &str;

	async fn fetch(&self) -> Result<Credential, AuthError>;
}

/// Hands out one pre-issued credential.
pub struct StaticTokenSource {
	credential: Credential,
}

impl StaticTokenSource {
	pub fn new(credential: Credential) -> Self {
		Self { credential }
	}
}

#[async_trait]
impl TokenSource for StaticTokenSource {
	fn name(&self) -> &str {
		"static"
	}

	async fn fetch(&self) -> Result<Credential, AuthError> {
		Ok(self.credential.clone())
	}
}

/// Caches one credential and refreshes it from a [`TokenSource`] when it is
/// missing or inside the refresh margin.
///
/// At most one refresh is in flight: callers that arrive during a refresh
/// wait for it and receive the same credential. A failed refresh leaves the
/// previously cached credential in place.
pub struct CredentialCache {
	source: Arc<dyn TokenSource>,
	cached: RwLock<Option<Credential>>,
	margin: Duration,
}

impl CredentialCache {
	pub fn new(source: Arc<dyn TokenSource>) -> Self {
		Self::with_margin(source, DEFAULT_REFRESH_MARGIN)
	}

	pub fn with_margin(source: Arc<dyn TokenSource>, margin: Duration) -> Self {
		Self {
			source,
			cached: RwLock::new(None),
			margin,
		}
	}

	/// Seed the cache with a credential obtained elsewhere, e.g. a pre-issued
	/// token from configuration.
	pub fn with_initial(self, credential: Credential) -> Self {
		Self {
			cached: RwLock::new(Some(credential)),
			..self
		}
	}

	pub fn margin(&self) -> Duration {
		self.margin
	}

	pub async fn get_token(&self) -> Result<Credential, AuthError> {
		{
			let cached = self.cached.read().await;
			if let Some(credential) = cached.as_ref().filter(|c| c.is_valid_for(self.margin)) {
				return Ok(credential.clone());
			}
		}

		let mut cached = self.cached.write().await;

		// Another caller may have refreshed while we waited for the lock.
		if let Some(credential) = cached.as_ref().filter(|c| c.is_valid_for(self.margin)) {
			return Ok(credential.clone());
		}

		debug!(source = self.source.name(), "refreshing credential");
		let fresh = self.source.fetch().await.map_err(|e| {
			warn!(source = self.source.name(), error = %e, "credential refresh failed");
			e
		})?;

		if !fresh.is_valid_for(self.margin) {
			warn!(
				source = self.source.name(),
				expires_at = %fresh.expires_at,
				"refreshed credential expires inside the refresh margin"
			);
		}

		info!(
			source = self.source.name(),
			expires_at = %fresh.expires_at,
			"credential refreshed"
		);
		*cached = Some(fresh.clone());
		Ok(fresh)
	}

	/// Drop the cached credential so the next call refreshes.
	pub async fn invalidate(&self) {
		debug!(source = self.source.name(), "credential invalidated");
		*self.cached.write().await = None;
	}

	pub async fn current(&self) -> Option<Credential> {
		self.cached.read().await.clone()
	}
}
