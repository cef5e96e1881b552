// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sends work to ready compute units.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::LifecycleError;
use crate::session::SessionCache;
use crate::unit::ComputeUnit;

pub const DEFAULT_ROUTE: &str = "/";

/// One unit of work for a compute unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub executor_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub job_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub call_id: Option<String>,
	#[serde(default = "default_route")]
	pub route: String,
	pub payload: Value,
}

fn default_route() -> String {
	DEFAULT_ROUTE.to_string()
}

impl InvocationRequest {
	pub fn new(payload: Value) -> Self {
		Self {
			executor_id: None,
			job_id: None,
			call_id: None,
			route: default_route(),
			payload,
		}
	}

	pub fn with_route(mut self, route: impl Into<String>) -> Self {
		self.route = route.into();
		self
	}

	pub fn with_call(
		mut self,
		executor_id: impl Into<String>,
		job_id: impl Into<String>,
		call_id: impl Into<String>,
	) -> Self {
		self.executor_id = Some(executor_id.into());
		self.job_id = Some(job_id.into());
		self.call_id = Some(call_id.into());
		self
	}
}

/// How the caller wants the response interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultMode {
	/// Fire-and-forget; only the `activationId` is returned.
	#[default]
	Activation,
	/// Synchronous call; the whole JSON document is returned.
	Document,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InvocationResult {
	Activation(String),
	Document(Value),
}

impl InvocationResult {
	pub fn activation_id(&self) -> Option<&str> {
		match self {
			InvocationResult::Activation(id) => Some(id),
			InvocationResult::Document(_) => None,
		}
	}

	pub fn into_document(self) -> Option<Value> {
		match self {
			InvocationResult::Document(doc) => Some(doc),
			InvocationResult::Activation(_) => None,
		}
	}
}

/// Status and raw body of a unit's answer.
#[derive(Debug, Clone)]
pub struct TransportResponse {
	pub status: u16,
	pub body: Bytes,
}

/// Delivers one authenticated JSON POST.
#[async_trait]
pub trait InvocationTransport: Send + Sync {
	async fn post_json(
		&self,
		url: &str,
		bearer: &str,
		payload: &Value,
	) -> Result<TransportResponse, LifecycleError>;
}

/// [`InvocationTransport`] over reqwest. The client should not carry a
/// request timeout; invocations run under the caller's own deadline.
pub struct HttpTransport {
	client: reqwest::Client,
}

impl HttpTransport {
	pub fn new(client: reqwest::Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl InvocationTransport for HttpTransport {
	async fn post_json(
		&self,
		url: &str,
		bearer: &str,
		payload: &Value,
	) -> Result<TransportResponse, LifecycleError> {
		let transport_err = |e: reqwest::Error| LifecycleError::InvocationTransport {
			message: e.to_string(),
		};

		let response = self
			.client
			.post(url)
			.bearer_auth(bearer)
			.json(payload)
			.send()
			.await
			.map_err(transport_err)?;

		let status = response.status().as_u16();
		let body = response.bytes().await.map_err(transport_err)?;
		Ok(TransportResponse { status, body })
	}
}

/// Routes invocation payloads to ready units. Never retries and never
/// provisions.
pub struct Invoker {
	transport: Arc<dyn InvocationTransport>,
	sessions: SessionCache,
}

impl Invoker {
	pub fn new(transport: Arc<dyn InvocationTransport>, sessions: SessionCache) -> Self {
		Self {
			transport,
			sessions,
		}
	}

	pub fn sessions(&self) -> &SessionCache {
		&self.sessions
	}

	#[instrument(skip_all, fields(unit = %unit.name, route = %request.route))]
	pub async fn invoke(
		&self,
		unit: &ComputeUnit,
		request: &InvocationRequest,
		mode: ResultMode,
	) -> Result<InvocationResult, LifecycleError> {
		let not_ready = || LifecycleError::NotReady {
			name: unit.name.clone(),
			status: unit.status(),
		};
		if !unit.status().accepts_invocations() {
			return Err(not_ready());
		}
		let endpoint = unit.endpoint().ok_or_else(not_ready)?;

		if let (Some(executor), Some(job), Some(call)) = (
			request.executor_id.as_deref(),
			request.job_id.as_deref(),
			request.call_id.as_deref(),
		) {
			info!(executor, job, call, "invoking function");
		} else {
			debug!("invoking unit");
		}

		let session = self.sessions.session_for(endpoint, &request.route).await?;
		let response = self
			.transport
			.post_json(session.target(), session.bearer(), &request.payload)
			.await?;

		interpret(response, mode)
	}
}

/// Map a unit's answer to the result the caller asked for.
pub fn interpret(
	response: TransportResponse,
	mode: ResultMode,
) -> Result<InvocationResult, LifecycleError> {
	let status = response.status;
	let body_text = || String::from_utf8_lossy(&response.body).into_owned();

	if !(200..300).contains(&status) {
		return Err(LifecycleError::Invocation {
			status,
			body: body_text(),
		});
	}

	let document: Value =
		serde_json::from_slice(&response.body).map_err(|e| LifecycleError::Invocation {
			status,
			body: format!("undecodable response ({e}): {}", body_text()),
		})?;

	match mode {
		ResultMode::Document => Ok(InvocationResult::Document(document)),
		ResultMode::Activation => match document.get("activationId").and_then(Value::as_str) {
			Some(id) => {
				debug!(activation_id = id, "invocation accepted");
				Ok(InvocationResult::Activation(id.to_string()))
			}
			None => Err(LifecycleError::Invocation {
				status,
				body: format!("response has no activationId: {document}"),
			}),
		},
	}
}
