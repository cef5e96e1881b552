// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial configuration each source produces.

use serde::{Deserialize, Serialize};

use crate::sections::{CloudRunConfigLayer, LifecycleConfigLayer, LoggingConfigLayer, VpcConfigLayer};

/// One source's view of the configuration. Every field is optional; later
/// layers override earlier ones field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StratusConfigLayer {
	pub lifecycle: Option<LifecycleConfigLayer>,
	pub cloudrun: Option<CloudRunConfigLayer>,
	pub vpc: Option<VpcConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

impl StratusConfigLayer {
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.lifecycle, other.lifecycle, LifecycleConfigLayer::merge);
		merge_section(&mut self.cloudrun, other.cloudrun, CloudRunConfigLayer::merge);
		merge_section(&mut self.vpc, other.vpc, VpcConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(base), Some(other)) => merge(base, other),
		(None, Some(other)) => *base = Some(other),
		(_, None) => {}
	}
}
