// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authenticated invocation sessions, one per target route.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::credential::{Credential, CredentialCache};
use crate::error::AuthError;

/// Issues credentials for invocation targets.
///
/// Providers whose tokens are audience-bound (the target URL is baked into
/// the token) implement this directly; providers with one bearer token for
/// everything use the [`CredentialCache`] implementation, which ignores the
/// audience.
#[async_trait]
pub trait SessionAuthority: Send + Sync {
	async fn credential_for(&self, audience: &str) -> Result<Credential, AuthError>;
}

#[async_trait]
impl SessionAuthority for CredentialCache {
	async fn credential_for(&self, _audience: &str) -> Result<Credential, AuthError> {
		self.get_token().await
	}
}

/// `endpoint` joined with `route`, with exactly one `/` between them.
pub fn target_url(endpoint: &Url, route: &str) -> String {
	let base = endpoint.as_str().trim_end_matches('/');
	if route.starts_with('/') {
		format!("{base}{route}")
	} else {
		format!("{base}/{route}")
	}
}

/// A credential bound to one route of one endpoint.
#[derive(Debug, Clone)]
pub struct Session {
	credential: Credential,
	route: String,
	target: String,
}

impl Session {
	pub fn bearer(&self) -> &str {
		self.credential.token().expose()
	}

	pub fn route(&self) -> &str {
		&self.route
	}

	pub fn target(&self) -> &str {
		&self.target
	}

	pub fn credential(&self) -> &Credential {
		&self.credential
	}
}

/// Sessions keyed by target URL. A session is rebuilt when its credential
/// nears expiry; a new route or endpoint gets its own session.
pub struct SessionCache {
	authority: Arc<dyn SessionAuthority>,
	sessions: Mutex<HashMap<String, Session>>,
	margin: Duration,
}

impl SessionCache {
	pub fn new(authority: Arc<dyn SessionAuthority>, margin: Duration) -> Self {
		Self {
			authority,
			sessions: Mutex::new(HashMap::new()),
			margin,
		}
	}

	/// The lock is not held while a credential is fetched, so concurrent
	/// misses for one target may each fetch; the last one is kept.
	pub async fn session_for(&self, endpoint: &Url, route: &str) -> Result<Session, AuthError> {
		let target = target_url(endpoint, route);

		if let Some(session) = self.sessions.lock().await.get(&target) {
			if session.credential.is_valid_for(self.margin) {
				return Ok(session.clone());
			}
			debug!(target = %target, "invoker session credential expiring");
		}

		debug!(target = %target, route = %route, "building invoker session");
		let credential = self.authority.credential_for(&target).await?;
		let session = Session {
			credential,
			route: route.to_string(),
			target: target.clone(),
		};

		let mut sessions = self.sessions.lock().await;
		sessions.retain(|_, s| s.credential.is_valid_for(self.margin));
		sessions.insert(target, session.clone());
		Ok(session)
	}

	pub async fn invalidate(&self) {
		self.sessions.lock().await.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use std::sync::Mutex as StdMutex;

	/// Issues `{audience}#{n}` tokens and remembers every audience asked for.
	struct AudienceAuthority {
		audiences: StdMutex<Vec<String>>,
		lifetime_secs: i64,
	}

	impl AudienceAuthority {
		fn new(lifetime_secs: i64) -> Self {
			Self {
				audiences: StdMutex::new(Vec::new()),
				lifetime_secs,
			}
		}

		fn requests(&self) -> Vec<String> {
			self.audiences.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl SessionAuthority for AudienceAuthority {
		async fn credential_for(&self, audience: &str) -> Result<Credential, AuthError> {
			let mut audiences = self.audiences.lock().unwrap();
			audiences.push(audience.to_string());
			Ok(Credential::new(
				format!("{audience}#{}", audiences.len()).into(),
				Utc::now() + chrono::Duration::seconds(self.lifetime_secs),
			))
		}
	}

	fn endpoint() -> Url {
		Url::parse("https://svc.example/").unwrap()
	}

	#[test]
	fn target_url_joins_with_single_slash() {
		assert_eq!(target_url(&endpoint(), "/"), "https://svc.example/");
		assert_eq!(target_url(&endpoint(), "/preinstalls"), "https://svc.example/preinstalls");
		assert_eq!(target_url(&endpoint(), "run"), "https://svc.example/run");
		let nested = Url::parse("http://10.0.0.5:8080/api/").unwrap();
		assert_eq!(target_url(&nested, "/x"), "http://10.0.0.5:8080/api/x");
	}

	#[tokio::test]
	async fn same_route_reuses_session() {
		let authority = Arc::new(AudienceAuthority::new(3600));
		let cache = SessionCache::new(authority.clone(), Duration::from_secs(60));

		let a = cache.session_for(&endpoint(), "/").await.unwrap();
		let b = cache.session_for(&endpoint(), "/").await.unwrap();

		assert_eq!(a.bearer(), b.bearer());
		assert_eq!(authority.requests().len(), 1);
	}

	#[tokio::test]
	async fn route_change_rebuilds_session() {
		let authority = Arc::new(AudienceAuthority::new(3600));
		let cache = SessionCache::new(authority.clone(), Duration::from_secs(60));

		cache.session_for(&endpoint(), "/").await.unwrap();
		let probe = cache.session_for(&endpoint(), "/preinstalls").await.unwrap();

		assert_eq!(probe.route(), "/preinstalls");
		assert_eq!(
			authority.requests(),
			vec![
				"https://svc.example/".to_string(),
				"https://svc.example/preinstalls".to_string()
			]
		);
	}

	#[tokio::test]
	async fn alternating_routes_keep_their_sessions() {
		let authority = Arc::new(AudienceAuthority::new(3600));
		let cache = SessionCache::new(authority.clone(), Duration::from_secs(60));
		let other = Url::parse("https://other.example/").unwrap();

		for _ in 0..3 {
			cache.session_for(&endpoint(), "/").await.unwrap();
			cache.session_for(&endpoint(), "/preinstalls").await.unwrap();
			cache.session_for(&other, "/").await.unwrap();
		}

		assert_eq!(authority.requests().len(), 3);
	}

	/// Answers only after `release` is notified.
	struct GatedAuthority {
		release: tokio::sync::Notify,
	}

	#[async_trait]
	impl SessionAuthority for GatedAuthority {
		async fn credential_for(&self, audience: &str) -> Result<Credential, AuthError> {
			if audience.ends_with("/slow") {
				self.release.notified().await;
			}
			Ok(Credential::new(
				audience.into(),
				Utc::now() + chrono::Duration::hours(1),
			))
		}
	}

	#[tokio::test]
	async fn pending_fetch_does_not_block_other_targets() {
		let authority = Arc::new(GatedAuthority {
			release: tokio::sync::Notify::new(),
		});
		let cache = Arc::new(SessionCache::new(authority.clone(), Duration::from_secs(60)));

		let slow = {
			let cache = cache.clone();
			tokio::spawn(async move { cache.session_for(&endpoint(), "/slow").await })
		};
		tokio::task::yield_now().await;

		let fast = tokio::time::timeout(
			Duration::from_secs(1),
			cache.session_for(&endpoint(), "/fast"),
		)
		.await
		.expect("fast target waited on the slow fetch")
		.unwrap();
		assert_eq!(fast.bearer(), "https://svc.example/fast");

		authority.release.notify_one();
		let slow = slow.await.unwrap().unwrap();
		assert_eq!(slow.route(), "/slow");
	}

	#[tokio::test]
	async fn expiring_credential_rebuilds_session() {
		let authority = Arc::new(AudienceAuthority::new(30));
		let cache = SessionCache::new(authority.clone(), Duration::from_secs(60));

		cache.session_for(&endpoint(), "/").await.unwrap();
		cache.session_for(&endpoint(), "/").await.unwrap();

		assert_eq!(authority.requests().len(), 2);
	}

	#[tokio::test]
	async fn invalidate_drops_session() {
		let authority = Arc::new(AudienceAuthority::new(3600));
		let cache = SessionCache::new(authority.clone(), Duration::from_secs(60));

		cache.session_for(&endpoint(), "/").await.unwrap();
		cache.invalidate().await;
		cache.session_for(&endpoint(), "/").await.unwrap();

		assert_eq!(authority.requests().len(), 2);
	}
}
