// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Agent lifecycle: one-time enrollment, then the heartbeat loop.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use talon_common_core::{HeartbeatRequest, SystemMetrics};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{GatewayClient, GatewayError};
use crate::config::AgentConfig;
use crate::{daemon, metrics};

pub struct Agent {
	config: AgentConfig,
	config_path: PathBuf,
	client: GatewayClient,
	last_sample: Option<(Instant, SystemMetrics)>,
}

impl Agent {
	pub fn new(config: AgentConfig, config_path: impl Into<PathBuf>) -> Self {
		let client = GatewayClient::new(&config.gateway.url, config.gateway.tls_skip_verify);
		Self {
			config,
			config_path: config_path.into(),
			client,
			last_sample: None,
		}
	}

	/// Exchanges the one-time enrollment token for a node credential.
	///
	/// No-op when a credential is already present. Enrollment failure is
	/// fatal: the token may or may not have been consumed server-side, so
	/// the operator must inspect rather than the agent retrying blindly.
	pub async fn ensure_enrolled(&mut self) -> anyhow::Result<()> {
		if self.config.gateway.auth_credential.is_some() {
			return Ok(());
		}

		let token = self
			.config
			.gateway
			.enroll_token
			.clone()
			.context("no auth credential and no enrollment token in config")?;

		info!("starting enrollment");
		let node_info = metrics::collect_node_info();
		let response = self
			.client
			.enroll(&token, &node_info)
			.await
			.context("enrollment failed")?;

		self.config.agent.node_id = Some(response.node_id.0.clone());
		self.config.gateway.auth_credential = Some(response.auth_credential.clone());
		self.config.gateway.enroll_token = None;

		// The token is consumed server-side at this point. Failing to land
		// the credential on disk or the config on the daemon leaves the node
		// unusable, so both are fatal to startup.
		self.config
			.save(&self.config_path)
			.context("failed to persist config after enrollment")?;

		if let Some(document) = &response.daemon_config {
			daemon::apply_config(&self.config.daemon, document)
				.await
				.context("failed to configure hosting daemon")?;
		}

		info!(node_id = %response.node_id, "enrollment complete");
		Ok(())
	}

	/// Runs until the token is cancelled or the credential is rejected.
	///
	/// Cancellation takes effect between heartbeats; an in-flight call
	/// delays shutdown by at most the client's request timeout (30s).
	pub async fn run(&mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
		self.ensure_enrolled().await?;

		let credential = self
			.config
			.gateway
			.auth_credential
			.clone()
			.context("no auth credential available")?;

		let interval = Duration::from_secs(self.config.agent.heartbeat_interval_seconds.max(1));
		let mut ticker = tokio::time::interval(interval);
		info!(interval_secs = interval.as_secs(), "starting heartbeat loop");

		loop {
			tokio::select! {
				_ = shutdown.cancelled() => {
					info!("agent stopping");
					return Ok(());
				}
				_ = ticker.tick() => {
					match self.send_heartbeat(&credential).await {
						Ok(()) => debug!("heartbeat acknowledged"),
						Err(GatewayError::Unauthorized) => {
							return Err(anyhow!(
								"gateway rejected credential, re-enrollment required"
							));
						}
						Err(e) => warn!(error = %e, "heartbeat failed"),
					}
				}
			}
		}
	}

	async fn send_heartbeat(&mut self, credential: &str) -> Result<(), GatewayError> {
		let request = HeartbeatRequest {
			agent_version: env!("CARGO_PKG_VERSION").to_string(),
			daemon_version: daemon_version().await,
			system: self.current_sample(),
		};
		self.client.heartbeat(credential, &request).await?;
		Ok(())
	}

	/// Returns the current metrics snapshot, refreshing it at most once per
	/// `metrics_interval_seconds`. A resent snapshot keeps the same
	/// `sampled_at`, so the server ignores the duplicate sample while still
	/// treating the heartbeat as proof of liveness.
	fn current_sample(&mut self) -> SystemMetrics {
		let interval = Duration::from_secs(self.config.agent.metrics_interval_seconds.max(1));
		match &self.last_sample {
			Some((taken, sample)) if taken.elapsed() < interval => sample.clone(),
			_ => {
				let sample = metrics::collect();
				self.last_sample = Some((Instant::now(), sample.clone()));
				sample
			}
		}
	}
}

/// Version of the locally installed hosting daemon, if present.
async fn daemon_version() -> Option<String> {
	let output = tokio::process::Command::new("wings")
		.arg("--version")
		.output()
		.await
		.ok()?;
	if !output.status.success() {
		return None;
	}
	let raw = String::from_utf8_lossy(&output.stdout);
	// "wings v1.11.0" or bare "1.11.0".
	let version = raw.split_whitespace().last()?.trim_start_matches('v');
	if version.is_empty() {
		None
	} else {
		Some(version.to_string())
	}
}
