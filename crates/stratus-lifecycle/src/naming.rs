// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource naming.
//!
//! Shared units are named `{prefix}--{version}--{runtime}--{mem}mb` and can be
//! parsed back into their identity. Call-scoped units are named
//! `{prefix}-{job}-{call}-{runtime}-{mem}mb` so a retried call finds the
//! resource its first attempt created. VM components (instance, address,
//! volumes) hang off a per-unit base name.

use std::fmt;

use crate::error::InvalidNameError;
use crate::identity::ComputeUnitIdentity;

pub const DEFAULT_PREFIX: &str = "stratus";
pub const MAX_NAME_LENGTH: usize = 63;

const ADJECTIVES: &[&str] = &[
	"amber", "brisk", "calm", "dusty", "eager", "fuzzy", "gentle", "hollow", "icy", "jolly",
	"keen", "lucky", "mellow", "nimble", "quiet", "rapid", "shy", "tidy", "vivid", "witty",
];

const NOUNS: &[&str] = &[
	"badger", "cedar", "delta", "ember", "falcon", "glacier", "harbor", "island", "juniper",
	"kestrel", "lagoon", "meadow", "nebula", "otter", "pebble", "quarry", "river", "summit",
	"tundra", "willow",
];

/// One component of a VM-style compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
	Instance,
	Address,
	BootVolume,
	Volume,
}

impl ResourceKind {
	pub fn suffix(&self) -> &'static str {
		match self {
			ResourceKind::Instance => "instance",
			ResourceKind::Address => "fip",
			ResourceKind::BootVolume => "boot",
			ResourceKind::Volume => "volume",
		}
	}
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.suffix())
	}
}

/// Derives provider resource names from identities.
#[derive(Debug, Clone)]
pub struct ResourceNamer {
	prefix: String,
	version: String,
}

impl ResourceNamer {
	/// `version` is embedded in shared names with `.` replaced by `-`.
	pub fn new(prefix: impl Into<String>, version: &str) -> Result<Self, InvalidNameError> {
		let prefix = prefix.into();
		check_segments(&prefix, "prefix")?;
		if !prefix.starts_with(|c: char| c.is_ascii_lowercase()) {
			return Err(InvalidNameError::new(prefix, "prefix must start with a letter"));
		}
		let version = normalize_runtime_name(&version.replace('.', "-"));
		check_segments(&version, "version")?;
		Ok(Self { prefix, version })
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Name of the unit as a whole (the service, or the registry key of a VM).
	pub fn derive_name(&self, identity: &ComputeUnitIdentity) -> Result<String, InvalidNameError> {
		validate_identity(identity)?;
		let name = match identity.call_scope() {
			Some((job, call)) => format!(
				"{}-{job}-{call}-{}-{}mb",
				self.prefix, identity.logical_name, identity.size_class
			),
			None => format!(
				"{}--{}--{}--{}mb",
				self.prefix, self.version, identity.logical_name, identity.size_class
			),
		};
		validate_name(&name)?;
		Ok(name)
	}

	/// Recover the identity of a shared unit from its name. The embedded
	/// version is not checked, so names written by other releases still parse.
	pub fn parse_name(&self, name: &str) -> Result<ComputeUnitIdentity, InvalidNameError> {
		let invalid = |reason: &str| InvalidNameError::new(name, reason);

		let rest = name
			.strip_prefix(&self.prefix)
			.and_then(|r| r.strip_prefix("--"))
			.ok_or_else(|| invalid("missing prefix"))?;
		let (_version, rest) = rest
			.split_once("--")
			.ok_or_else(|| invalid("missing version segment"))?;
		let (runtime, memory) = rest
			.rsplit_once("--")
			.ok_or_else(|| invalid("missing memory segment"))?;
		let size_class = memory
			.strip_suffix("mb")
			.and_then(|m| m.parse::<u32>().ok())
			.ok_or_else(|| invalid("memory segment is not {n}mb"))?;

		let identity = ComputeUnitIdentity::new(runtime, size_class);
		validate_identity(&identity)?;
		Ok(identity)
	}

	/// Base name shared by every component of one VM-style unit.
	///
	/// Call-scoped identities get `{prefix}-{job}-{call}`. Otherwise a random
	/// `{prefix}-{adjective}-{noun}-{nn}` is returned, which differs between
	/// calls; such units are not retry-safe.
	pub fn unit_base(&self, identity: &ComputeUnitIdentity) -> Result<String, InvalidNameError> {
		validate_identity(identity)?;
		let base = match identity.call_scope() {
			Some((job, call)) => format!("{}-{job}-{call}", self.prefix),
			None => format!(
				"{}-{}-{}-{:02}",
				self.prefix,
				ADJECTIVES[fastrand::usize(..ADJECTIVES.len())],
				NOUNS[fastrand::usize(..NOUNS.len())],
				fastrand::u8(..100)
			),
		};
		validate_name(&base)?;
		Ok(base)
	}

	pub fn component_name(&self, base: &str, kind: ResourceKind) -> Result<String, InvalidNameError> {
		let name = format!("{base}-{}", kind.suffix());
		validate_name(&name)?;
		Ok(name)
	}

	pub fn resource_name(
		&self,
		identity: &ComputeUnitIdentity,
		kind: ResourceKind,
	) -> Result<String, InvalidNameError> {
		let base = self.unit_base(identity)?;
		self.component_name(&base, kind)
	}
}

/// Platform rules: `[a-z0-9-]`, starts with a letter, ends alphanumeric,
/// at most 63 characters.
pub fn validate_name(name: &str) -> Result<(), InvalidNameError> {
	if name.is_empty() {
		return Err(InvalidNameError::new(name, "name is empty"));
	}
	if name.len() > MAX_NAME_LENGTH {
		return Err(InvalidNameError::new(
			name,
			format!("longer than {MAX_NAME_LENGTH} characters"),
		));
	}
	if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
		return Err(InvalidNameError::new(name, "must start with a lowercase letter"));
	}
	if !name.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) {
		return Err(InvalidNameError::new(name, "must end with a letter or digit"));
	}
	if let Some(c) = name
		.chars()
		.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
	{
		return Err(InvalidNameError::new(name, format!("invalid character {c:?}")));
	}
	Ok(())
}

/// Lowercase a runtime or image reference and map separators to `-`.
///
/// `.` is dropped (`py3.9` becomes `py39`), `_ / :` and whitespace become `-`,
/// anything else outside `[a-z0-9-]` is removed, and runs of `-` collapse.
pub fn normalize_runtime_name(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	for c in raw.trim().chars().flat_map(char::to_lowercase) {
		let mapped = match c {
			'a'..='z' | '0'..='9' => Some(c),
			'-' | '_' | '/' | ':' => Some('-'),
			c if c.is_whitespace() => Some('-'),
			_ => None,
		};
		if let Some(c) = mapped {
			if c == '-' && (out.is_empty() || out.ends_with('-')) {
				continue;
			}
			out.push(c);
		}
	}
	while out.ends_with('-') {
		out.pop();
	}
	out
}

fn validate_identity(identity: &ComputeUnitIdentity) -> Result<(), InvalidNameError> {
	check_segments(&identity.logical_name, "runtime name")?;
	if identity.size_class == 0 {
		return Err(InvalidNameError::new(
			&identity.logical_name,
			"size class must be positive",
		));
	}
	for (label, id) in [("job id", &identity.job_id), ("call id", &identity.call_id)] {
		if let Some(id) = id {
			if id.is_empty() || !id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
				return Err(InvalidNameError::new(
					id,
					format!("{label} must be lowercase alphanumeric"),
				));
			}
		}
	}
	Ok(())
}

/// `[a-z0-9]+` segments joined by single dashes.
fn check_segments(value: &str, what: &str) -> Result<(), InvalidNameError> {
	let ok = !value.is_empty()
		&& value.split('-').all(|segment| {
			!segment.is_empty()
				&& segment
					.chars()
					.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
		});
	if ok {
		Ok(())
	} else {
		Err(InvalidNameError::new(
			value,
			format!("{what} must be lowercase alphanumeric segments separated by single dashes"),
		))
	}
}
