// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for bearer tokens, identity tokens and IAM API keys.
//!
//! Everything stratus authenticates with passes through [`Secret`]:
//!
//! - `Debug`, `Display` and `Serialize` print `[REDACTED]`
//! - the inner value is zeroized on drop
//! - reading the value requires an explicit `.expose()`
//!
//! ```
//! use stratus_common_secret::SecretString;
//!
//! let token = SecretString::new("ya29.a0Af".to_string());
//! assert_eq!(format!("{token}"), "[REDACTED]");
//! assert_eq!(token.expose(), "ya29.a0Af");
//! ```

mod env;

use std::fmt;
use zeroize::Zeroize;

pub use env::{load_secret_env, SecretEnvError};

/// Placeholder printed instead of secret material.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must never reach logs, config dumps or error messages.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Access the wrapped value. Grep for `expose()` to audit secret use.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Clone the inner value out; the wrapper still zeroizes its own copy.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

impl From<String> for Secret<String> {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for Secret<String> {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_and_display_are_redacted() {
		let token = SecretString::new("bearer-abc".to_string());

		assert_eq!(format!("{token}"), REDACTED);
		let debug = format!("{token:?}");
		assert!(debug.contains(REDACTED));
		assert!(!debug.contains("bearer-abc"));
	}

	#[test]
	fn option_of_secret_is_redacted() {
		let key: Option<SecretString> = Some("iam-key".into());
		assert!(!format!("{key:?}").contains("iam-key"));
	}

	#[test]
	fn expose_and_into_inner_return_value() {
		let token = SecretString::from("t0k3n");
		assert_eq!(token.expose(), "t0k3n");
		assert_eq!(token.into_inner(), "t0k3n");
	}

	#[test]
	fn equality_uses_inner_value() {
		assert_eq!(SecretString::from("a"), SecretString::from("a"));
		assert_ne!(SecretString::from("a"), SecretString::from("b"));
	}

	#[cfg(feature = "serde")]
	#[test]
	fn serialize_redacts_and_deserialize_reads_plain_value() {
		let token = SecretString::from("plain-token");
		let json = serde_json::to_string(&token).unwrap();
		assert_eq!(json, format!("\"{REDACTED}\""));

		let parsed: SecretString = serde_json::from_str("\"plain-token\"").unwrap();
		assert_eq!(parsed.expose(), "plain-token");
	}

	proptest! {
		#[test]
		fn display_never_leaks(inner in "[a-zA-Z0-9._-]{3,64}") {
			prop_assume!(!inner.contains("REDACTED"));
			let secret = SecretString::new(inner.clone());
			let displayed = format!("{secret}");
			let debugged = format!("{secret:?}");
			prop_assert!(!displayed.contains(&inner));
			prop_assert!(!debugged.contains(&inner));
		}
	}
}
