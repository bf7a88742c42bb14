// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Node data model and lifecycle states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a node, unique across tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
	pub fn generate() -> Self {
		Self(Uuid::new_v4().to_string())
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identifier of the tenant owning a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Node lifecycle state.
///
/// `pending → installing → online ⇄ offline`, plus terminal `error`.
/// Only the online/offline pair toggles; every other transition is
/// one-directional. `error` requires operator intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
	Pending,
	Installing,
	Online,
	Offline,
	Error,
}

impl NodeStatus {
	/// Whether a heartbeat may move this state to `Online`.
	///
	/// `Pending` is excluded: a node must pass through `Installing` (token
	/// consumption) before its first heartbeat can count. `Error` is terminal
	/// until an operator resets the node.
	pub fn heartbeat_may_set_online(self) -> bool {
		matches!(
			self,
			NodeStatus::Installing | NodeStatus::Online | NodeStatus::Offline
		)
	}
}

impl fmt::Display for NodeStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			NodeStatus::Pending => "pending",
			NodeStatus::Installing => "installing",
			NodeStatus::Online => "online",
			NodeStatus::Offline => "offline",
			NodeStatus::Error => "error",
		};
		f.write_str(s)
	}
}

impl FromStr for NodeStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(NodeStatus::Pending),
			"installing" => Ok(NodeStatus::Installing),
			"online" => Ok(NodeStatus::Online),
			"offline" => Ok(NodeStatus::Offline),
			"error" => Ok(NodeStatus::Error),
			other => Err(format!("unknown node status: {other}")),
		}
	}
}

/// One remote host under one tenant.
///
/// `enrollment_token` is non-null only while `status == Pending`; the
/// encrypted daemon secret is a vault blob and never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
	pub id: NodeId,
	pub tenant_id: TenantId,
	pub name: String,
	pub fqdn: Option<String>,
	pub public_ip: Option<String>,
	pub private_ip: Option<String>,
	pub cpu_cores: Option<u32>,
	pub memory_mb: Option<u64>,
	pub disk_gb: Option<u64>,
	pub status: NodeStatus,
	pub enrollment_token: Option<String>,
	pub enrollment_expires_at: Option<DateTime<Utc>>,
	pub auth_credential_id: Option<String>,
	pub encrypted_daemon_secret: Option<String>,
	pub external_resource_id: Option<String>,
	pub last_heartbeat_at: Option<DateTime<Utc>>,
	pub agent_version: Option<String>,
	pub daemon_version: Option<String>,
	pub last_error: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Node {
	/// A freshly created node awaiting enrollment.
	pub fn new_pending(id: NodeId, tenant_id: TenantId, name: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id,
			tenant_id,
			name: name.into(),
			fqdn: None,
			public_ip: None,
			private_ip: None,
			cpu_cores: None,
			memory_mb: None,
			disk_gb: None,
			status: NodeStatus::Pending,
			enrollment_token: None,
			enrollment_expires_at: None,
			auth_credential_id: None,
			encrypted_daemon_secret: None,
			external_resource_id: None,
			last_heartbeat_at: None,
			agent_version: None,
			daemon_version: None,
			last_error: None,
			created_at: now,
			updated_at: now,
		}
	}
}

/// One heartbeat's telemetry snapshot, keyed by `(node_id, sampled_at)`.
///
/// Network counters are monotonically increasing totals; rates are derived by
/// the reader, not stored. Owned by a node through `node_id` only, with no
/// back-pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
	pub node_id: NodeId,
	pub sampled_at: DateTime<Utc>,
	pub cpu_usage_pct: f64,
	pub memory_usage_pct: f64,
	pub disk_usage_pct: f64,
	pub network_rx_bytes: u64,
	pub network_tx_bytes: u64,
	pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_roundtrips_through_text() {
		for status in [
			NodeStatus::Pending,
			NodeStatus::Installing,
			NodeStatus::Online,
			NodeStatus::Offline,
			NodeStatus::Error,
		] {
			let parsed: NodeStatus = status.to_string().parse().unwrap();
			assert_eq!(parsed, status);
		}
	}

	#[test]
	fn unknown_status_is_rejected() {
		assert!("rebooting".parse::<NodeStatus>().is_err());
	}

	#[test]
	fn pending_never_goes_online_from_heartbeat() {
		assert!(!NodeStatus::Pending.heartbeat_may_set_online());
		assert!(!NodeStatus::Error.heartbeat_may_set_online());
		assert!(NodeStatus::Installing.heartbeat_may_set_online());
		assert!(NodeStatus::Offline.heartbeat_may_set_online());
	}

	#[test]
	fn new_pending_node_has_no_token() {
		let node = Node::new_pending(
			NodeId::generate(),
			TenantId("t1".to_string()),
			"game-01",
		);
		assert_eq!(node.status, NodeStatus::Pending);
		assert!(node.enrollment_token.is_none());
		assert!(node.encrypted_daemon_secret.is_none());
	}
}
