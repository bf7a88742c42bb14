// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Agent ↔ gateway wire protocol bodies.
//!
//! These are the only types that cross the network between the edge agent
//! and the server. Metrics are a fixed struct with explicit fields rather
//! than a free-form map, so a typo in a field name is a compile error, not a
//! silently dropped datapoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Hardware and platform facts the agent reports during enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
	pub hostname: String,
	pub architecture: String,
	pub platform: String,
	pub cpu_cores: u32,
	pub memory_mb: u64,
	pub disk_gb: u64,
	pub public_ip: Option<String>,
	pub private_ip: Option<String>,
}

/// `POST /api/agent/enroll` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollRequest {
	pub token: String,
	pub node_info: NodeInfo,
}

/// `POST /api/agent/enroll` response body.
///
/// `daemon_config` is the configuration document the agent writes for the
/// local hosting daemon; its shape is owned by the external panel, so it is
/// carried opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollResponse {
	pub node_id: NodeId,
	pub auth_credential: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub daemon_config: Option<serde_json::Value>,
}

/// One telemetry snapshot, taken by the agent at `sampled_at`.
///
/// `sampled_at` keys the stored sample: a network-level retry delivering the
/// same snapshot twice is a no-op on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
	pub cpu_usage_pct: f64,
	pub memory_usage_pct: f64,
	pub disk_usage_pct: f64,
	pub network_rx_bytes: u64,
	pub network_tx_bytes: u64,
	pub uptime_seconds: u64,
	pub sampled_at: DateTime<Utc>,
}

/// `POST /api/agent/heartbeat` request body. Authentication travels in the
/// `Authorization: Bearer` header, not the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
	pub agent_version: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub daemon_version: Option<String>,
	pub system: SystemMetrics,
}

/// `POST /api/agent/heartbeat` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
	pub status: String,
}

impl HeartbeatResponse {
	pub fn ok() -> Self {
		Self {
			status: "ok".to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn enroll_request_roundtrips_as_json() {
		let req = EnrollRequest {
			token: "tok".to_string(),
			node_info: NodeInfo {
				hostname: "game-01".to_string(),
				architecture: "x86_64".to_string(),
				platform: "linux".to_string(),
				cpu_cores: 8,
				memory_mb: 32768,
				disk_gb: 500,
				public_ip: Some("203.0.113.7".to_string()),
				private_ip: Some("10.0.0.7".to_string()),
			},
		};
		let json = serde_json::to_string(&req).unwrap();
		let back: EnrollRequest = serde_json::from_str(&json).unwrap();
		assert_eq!(back.token, "tok");
		assert_eq!(back.node_info.cpu_cores, 8);
	}

	#[test]
	fn heartbeat_omits_absent_daemon_version() {
		let req = HeartbeatRequest {
			agent_version: "0.1.0".to_string(),
			daemon_version: None,
			system: SystemMetrics {
				cpu_usage_pct: 12.5,
				memory_usage_pct: 40.0,
				disk_usage_pct: 61.2,
				network_rx_bytes: 1024,
				network_tx_bytes: 2048,
				uptime_seconds: 3600,
				sampled_at: Utc::now(),
			},
		};
		let json = serde_json::to_string(&req).unwrap();
		assert!(!json.contains("daemon_version"));
	}
}
