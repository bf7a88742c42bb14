// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Heartbeat processor.
//!
//! Authenticates the node credential, records liveness, and appends the
//! telemetry sample. Replaying an identical payload is idempotent: the node
//! row converges to the same state and the sample insert is keyed by
//! `(node_id, sampled_at)`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use talon_common_core::{
	FleetError, FleetResult, HeartbeatRequest, HeartbeatResponse, MetricSample,
};
use talon_server_db::{DbError, MetricStore, NodeStore};

use crate::credential::CredentialIssuer;

/// Processes authenticated heartbeats from enrolled agents.
pub struct HeartbeatProcessor {
	nodes: Arc<dyn NodeStore>,
	metrics: Arc<dyn MetricStore>,
	credentials: Arc<CredentialIssuer>,
}

impl HeartbeatProcessor {
	pub fn new(
		nodes: Arc<dyn NodeStore>,
		metrics: Arc<dyn MetricStore>,
		credentials: Arc<CredentialIssuer>,
	) -> Self {
		Self {
			nodes,
			metrics,
			credentials,
		}
	}

	/// Handles one heartbeat call.
	///
	/// Never moves a node out of `error`; that state is terminal until an
	/// operator resets the node.
	#[instrument(skip_all)]
	pub async fn handle(
		&self,
		credential: &str,
		request: &HeartbeatRequest,
	) -> FleetResult<HeartbeatResponse> {
		let identity = self.credentials.verify(credential)?;

		validate_metrics(request)?;

		self.nodes
			.record_heartbeat(
				&identity.node_id,
				Utc::now(),
				&request.agent_version,
				request.daemon_version.as_deref(),
			)
			.await
			.map_err(|e| match e {
				DbError::NotFound(_) => FleetError::NotFound,
				other => FleetError::Internal(other.to_string()),
			})?;

		let sample = MetricSample {
			node_id: identity.node_id.clone(),
			sampled_at: request.system.sampled_at,
			cpu_usage_pct: request.system.cpu_usage_pct,
			memory_usage_pct: request.system.memory_usage_pct,
			disk_usage_pct: request.system.disk_usage_pct,
			network_rx_bytes: request.system.network_rx_bytes,
			network_tx_bytes: request.system.network_tx_bytes,
			uptime_seconds: request.system.uptime_seconds,
		};
		self.metrics
			.append_sample(&sample)
			.await
			.map_err(|e| FleetError::Internal(e.to_string()))?;

		debug!(
			node_id = %identity.node_id,
			cpu = request.system.cpu_usage_pct,
			"heartbeat recorded"
		);

		Ok(HeartbeatResponse::ok())
	}
}

fn validate_metrics(request: &HeartbeatRequest) -> FleetResult<()> {
	if request.agent_version.is_empty() {
		return Err(FleetError::Validation("agent_version is required".into()));
	}
	for (name, value) in [
		("cpu_usage_pct", request.system.cpu_usage_pct),
		("memory_usage_pct", request.system.memory_usage_pct),
		("disk_usage_pct", request.system.disk_usage_pct),
	] {
		if !value.is_finite() || !(0.0..=100.0).contains(&value) {
			return Err(FleetError::Validation(format!(
				"{name} must be a percentage between 0 and 100"
			)));
		}
	}
	Ok(())
}
