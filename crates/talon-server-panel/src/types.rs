// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request/response bodies for the panel management API.
//!
//! Only the fields this control plane actually consumes are modeled; the
//! panel owns the full shapes.

use serde::{Deserialize, Serialize};

/// Input to [`provision_node`](crate::PanelClient::provision_node), derived
/// from the node record and the agent's reported facts.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
	/// Idempotency key for the panel calls; retries reuse it.
	pub node_id: String,
	pub name: String,
	pub fqdn: String,
	pub public_ip: Option<String>,
	pub memory_mb: u64,
	pub disk_gb: u64,
}

/// Result of a successful provisioning run.
///
/// The daemon credential is already vault-encrypted; the plaintext only
/// exists transiently inside the client and is returned to the agent solely
/// inside `daemon_config`.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
	pub external_resource_id: String,
	pub encrypted_daemon_secret: String,
	pub daemon_config: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CreateLocationRequest {
	pub short: String,
	pub long: String,
}

#[derive(Debug, Deserialize)]
pub struct Location {
	pub id: u64,
}

#[derive(Debug, Serialize)]
pub struct CreatePanelNodeRequest {
	pub name: String,
	pub fqdn: String,
	pub location_id: u64,
	pub memory_mb: u64,
	pub disk_mb: u64,
}

#[derive(Debug, Deserialize)]
pub struct PanelNode {
	pub id: u64,
	/// The daemon's authentication token. Plaintext on the wire from the
	/// panel; encrypted before anything else touches it.
	pub daemon_token: String,
	/// Configuration document the local daemon consumes, passed through to
	/// the agent opaquely.
	pub daemon_config: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CreateAllocationRangeRequest {
	pub node_id: u64,
	pub ip: String,
	pub port_start: u16,
	pub port_end: u16,
}

#[derive(Debug, Deserialize)]
pub struct AllocationRange {
	pub id: u64,
}
