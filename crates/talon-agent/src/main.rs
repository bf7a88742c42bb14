// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Talon edge agent binary.
//!
//! Runs on every fleet node. First run uses `--install` with an enrollment
//! token to bootstrap the config file; afterwards the agent enrolls once and
//! then heartbeats until stopped.

mod agent;
mod client;
mod config;
mod daemon;
mod metrics;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use agent::Agent;
use config::{AgentConfig, DEFAULT_CONFIG_PATH};

/// Talon edge agent - enrolls a node and reports telemetry.
#[derive(Parser, Debug)]
#[command(name = "talon-agent", about = "Talon fleet edge agent", version)]
struct Args {
	/// Path to the agent configuration file
	#[arg(long, default_value = DEFAULT_CONFIG_PATH)]
	config: String,

	/// Log level filter (e.g. debug, info, talon_agent=debug)
	#[arg(long, env = "TALON_AGENT_LOG", default_value = "info")]
	log_level: String,

	/// Write an initial config and enroll (requires --enroll-token and
	/// --gateway-url)
	#[arg(long)]
	install: bool,

	/// One-time enrollment token, install mode only
	#[arg(long, env = "TALON_AGENT_ENROLL_TOKEN")]
	enroll_token: Option<String>,

	/// Fleet gateway base URL, install mode only
	#[arg(long, env = "TALON_AGENT_GATEWAY_URL")]
	gateway_url: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::new(&args.log_level))
		.init();

	let config = if args.install {
		let (Some(url), Some(token)) = (&args.gateway_url, &args.enroll_token) else {
			anyhow::bail!("--install requires --gateway-url and --enroll-token");
		};
		let config = AgentConfig::for_install(url, token);
		config.save(&args.config)?;
		info!(path = %args.config, "initial configuration written");
		config
	} else {
		AgentConfig::load(&args.config)?
	};

	let shutdown = CancellationToken::new();
	let signal_token = shutdown.clone();
	tokio::spawn(async move {
		if let Err(e) = tokio::signal::ctrl_c().await {
			error!(error = %e, "failed to install shutdown handler");
			return;
		}
		info!("shutdown signal received");
		signal_token.cancel();
	});

	let mut agent = Agent::new(config, &args.config);
	agent.run(shutdown).await
}
