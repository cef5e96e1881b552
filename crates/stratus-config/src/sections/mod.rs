// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod cloudrun;
mod lifecycle;
mod logging;
mod vpc;

pub use cloudrun::{CloudRunConfig, CloudRunConfigLayer};
pub use lifecycle::{BackendKind, LifecycleConfig, LifecycleConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use vpc::{VpcConfig, VpcConfigLayer};
