// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Elastic compute unit lifecycle for stratus.
//!
//! This crate holds everything that does not depend on a particular cloud:
//!
//! - Resource naming derived from a unit's identity
//! - A process-wide credential cache and route-bound invocation sessions
//! - The unit state machine and bounded readiness polling
//! - An undo log for multi-step provisioning
//! - The invoker and teardown bookkeeping
//! - The [`Backend`] trait that provider crates implement
//!
//! Provider crates (`stratus-backend-cloudrun`, `stratus-backend-vpc`) wire
//! these pieces to a control-plane client.

pub mod backend;
pub mod backoff;
pub mod compensation;
pub mod credential;
pub mod error;
pub mod identity;
pub mod invoker;
pub mod naming;
pub mod readiness;
pub mod registry;
pub mod session;
pub mod teardown;
pub mod unit;

pub use backend::{invoke_published, Backend, RuntimeMetadata, RuntimeSummary};
pub use backoff::{ReadinessPolicy, DEFAULT_BACKOFF_SCALE, DEFAULT_READINESS_BUDGET};
pub use compensation::Compensation;
pub use credential::{
	Credential, CredentialCache, StaticTokenSource, TokenSource, DEFAULT_REFRESH_MARGIN,
};
pub use error::{AuthError, InvalidNameError, LifecycleError};
pub use identity::{ComputeUnitIdentity, UnitSpec};
pub use invoker::{
	HttpTransport, InvocationRequest, InvocationResult, InvocationTransport, Invoker, ResultMode,
	TransportResponse, DEFAULT_ROUTE,
};
pub use naming::{normalize_runtime_name, validate_name, ResourceKind, ResourceNamer};
pub use readiness::{poll_until_ready, Condition, Observation};
pub use registry::{UnitRegistry, UnitSlot};
pub use session::{target_url, Session, SessionAuthority, SessionCache};
pub use teardown::{StopPolicy, TeardownReport};
pub use unit::{ComputeUnit, UnitStatus};
