// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `stratus` command line front end.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use stratus_lifecycle::{
	normalize_runtime_name, ComputeUnitIdentity, InvocationRequest, ResultMode, DEFAULT_ROUTE,
};

mod backend;
mod logging;

/// Provision, invoke and stop elastic compute units.
#[derive(Parser, Debug)]
#[command(name = "stratus", about = "Elastic compute unit lifecycle manager", version)]
struct Cli {
	/// Config file to use instead of /etc/stratus/stratus.toml
	#[arg(long, global = true, env = "STRATUS_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create or adopt a unit and wait until it is ready
	Create {
		#[command(flatten)]
		unit: UnitArgs,
		/// CPU limit, e.g. "1" or "500m"
		#[arg(long)]
		cpu: Option<String>,
		/// Requests one replica accepts concurrently
		#[arg(long)]
		concurrency: Option<u32>,
		/// Per-request timeout in seconds
		#[arg(long)]
		timeout_secs: Option<u64>,
		/// Upper bound on replicas
		#[arg(long)]
		max_workers: Option<u32>,
	},
	/// Send a JSON payload to a ready unit
	Invoke {
		#[command(flatten)]
		unit: UnitArgs,
		/// Inline JSON payload
		#[arg(long, conflicts_with = "payload_file")]
		payload: Option<String>,
		/// File holding the JSON payload
		#[arg(long)]
		payload_file: Option<PathBuf>,
		#[arg(long, default_value = DEFAULT_ROUTE)]
		route: String,
		/// Wait for and print the whole response document
		#[arg(long)]
		wait: bool,
		#[arg(long)]
		executor: Option<String>,
	},
	/// Suspend or delete a unit according to the stop policy
	Stop {
		#[command(flatten)]
		unit: UnitArgs,
	},
	/// Print the unit's runtime key
	Key {
		#[command(flatten)]
		unit: UnitArgs,
	},
	/// List units managed under the configured prefix
	List,
	/// Show version and build information
	Version,
}

#[derive(Args, Debug, Clone)]
struct UnitArgs {
	/// Runtime the unit serves, e.g. "python3.9-slim". Lowercased, with
	/// characters outside `[a-z0-9-]` dropped or mapped to `-`.
	#[arg(long)]
	runtime: String,
	/// Memory size class in MB
	#[arg(long)]
	memory: u32,
	/// Scope the unit to one job; requires --call
	#[arg(long, requires = "call")]
	job: Option<String>,
	#[arg(long, requires = "job")]
	call: Option<String>,
}

impl UnitArgs {
	fn identity(&self) -> ComputeUnitIdentity {
		let identity = ComputeUnitIdentity::new(normalize_runtime_name(&self.runtime), self.memory);
		match (&self.job, &self.call) {
			(Some(job), Some(call)) => identity.for_call(job, call),
			_ => identity,
		}
	}
}

fn format_version_info() -> String {
	format!(
		"stratus {}\nPlatform: {}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

fn load_payload(inline: Option<&str>, file: Option<&PathBuf>) -> Result<Value> {
	let raw = match (inline, file) {
		(Some(inline), _) => inline.to_string(),
		(None, Some(path)) => std::fs::read_to_string(path)
			.with_context(|| format!("failed to read payload file {}", path.display()))?,
		(None, None) => return Ok(Value::Object(Default::default())),
	};
	serde_json::from_str(&raw).context("payload is not valid JSON")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	if let Command::Version = cli.command {
		println!("{}", format_version_info());
		return Ok(());
	}

	let config = match &cli.config {
		Some(path) => stratus_config::load_config_with_file(path),
		None => stratus_config::load_config(),
	}
	.context("failed to load configuration")?;
	logging::init(&config.logging);

	let selected = backend::connect(&config)?;
	let backend = selected.backend.as_ref();

	match cli.command {
		Command::Create {
			unit,
			cpu,
			concurrency,
			timeout_secs,
			max_workers,
		} => {
			let mut spec = selected.spec.clone();
			if let Some(cpu) = cpu {
				spec.cpu = cpu;
			}
			if let Some(concurrency) = concurrency {
				spec.concurrency = concurrency;
			}
			if let Some(timeout_secs) = timeout_secs {
				spec.timeout_secs = timeout_secs;
			}
			if let Some(max_workers) = max_workers {
				spec.max_workers = max_workers;
			}
			let metadata = backend.create_runtime(&unit.identity(), &spec).await?;
			print_json(&metadata)?;
		}
		Command::Invoke {
			unit,
			payload,
			payload_file,
			route,
			wait,
			executor,
		} => {
			let payload = load_payload(payload.as_deref(), payload_file.as_ref())?;
			let mut request = InvocationRequest::new(payload).with_route(route);
			if let (Some(executor), Some(job), Some(call)) = (executor, &unit.job, &unit.call) {
				request = request.with_call(executor, job, call);
			}
			let mode = if wait {
				ResultMode::Document
			} else {
				ResultMode::Activation
			};
			let result = backend.invoke(&unit.identity(), &request, mode).await?;
			print_json(&result)?;
		}
		Command::Stop { unit } => {
			let report = backend.stop(&unit.identity()).await?;
			print_json(&report)?;
		}
		Command::Key { unit } => {
			println!("{}", backend.get_runtime_key(&unit.identity()).await?);
		}
		Command::List => {
			print_json(&backend.list_runtimes().await?)?;
		}
		Command::Version => {}
	}

	Ok(())
}
