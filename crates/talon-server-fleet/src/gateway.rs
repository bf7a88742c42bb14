// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Enrollment gateway.
//!
//! Provisioning runs synchronously inside the enroll call: the agent's one
//! round-trip covers token consumption, panel-side resource creation, and
//! credential issuance. The panel client bounds the latency with per-attempt
//! timeouts and an overall deadline; a permanent failure lands the node in
//! terminal `error` with a stored reason.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tracing::{error, info, instrument, warn};

use talon_common_core::{
	EnrollResponse, FleetError, FleetResult, NodeId, NodeInfo, NodeStatus,
};
use talon_server_db::{ConsumeOutcome, DbError, NodeStore};
use talon_server_panel::{PanelClient, ProvisionRequest};
use talon_server_vault::SecretVault;

use crate::credential::CredentialIssuer;

/// Enrollment token entropy in bytes; hex-encoded on the wire.
const TOKEN_BYTES: usize = 32;

/// Enrollment token validity window.
const TOKEN_TTL_HOURS: i64 = 24;

/// A freshly issued enrollment token, handed to the tenant out of band.
#[derive(Debug, Clone)]
pub struct IssuedEnrollment {
	pub token: String,
	pub expires_at: DateTime<Utc>,
}

/// Issues and consumes one-time enrollment tokens, and mints node
/// credentials.
pub struct EnrollmentGateway {
	nodes: Arc<dyn NodeStore>,
	panel: Arc<PanelClient>,
	vault: Arc<SecretVault>,
	credentials: Arc<CredentialIssuer>,
}

fn db_err(err: DbError) -> FleetError {
	match err {
		DbError::NotFound(_) => FleetError::NotFound,
		other => FleetError::Internal(other.to_string()),
	}
}

impl EnrollmentGateway {
	pub fn new(
		nodes: Arc<dyn NodeStore>,
		panel: Arc<PanelClient>,
		vault: Arc<SecretVault>,
		credentials: Arc<CredentialIssuer>,
	) -> Self {
		Self {
			nodes,
			panel,
			vault,
			credentials,
		}
	}

	/// Generates a one-time enrollment token for a pending node.
	///
	/// Called by an external tenant action. Fails if the node is not
	/// `pending`.
	#[instrument(skip(self), fields(node_id = %node_id))]
	pub async fn issue_enrollment_token(&self, node_id: &NodeId) -> FleetResult<IssuedEnrollment> {
		let node = self
			.nodes
			.get_node(node_id)
			.await
			.map_err(db_err)?
			.ok_or(FleetError::NotFound)?;

		if node.status != NodeStatus::Pending {
			return Err(FleetError::Validation(format!(
				"node is {}, enrollment tokens can only be issued while pending",
				node.status
			)));
		}

		let mut bytes = [0u8; TOKEN_BYTES];
		rand::rngs::OsRng.fill_bytes(&mut bytes);
		let token = hex::encode(bytes);
		let expires_at = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);

		self.nodes
			.set_enrollment_token(node_id, &token, expires_at)
			.await
			.map_err(|e| match e {
				DbError::InvalidData(msg) => FleetError::Validation(msg),
				other => db_err(other),
			})?;

		info!(node_id = %node_id, expires_at = %expires_at, "enrollment token issued");
		Ok(IssuedEnrollment { token, expires_at })
	}

	/// Consumes an enrollment token and brings the node online-side state up:
	/// `pending → installing`, panel provisioning, credential issuance.
	///
	/// Exactly one concurrent caller can win the compare-and-clear; the
	/// loser gets `AlreadyConsumed`. A replay after the winner committed
	/// finds no token and gets `NotFound`.
	#[instrument(skip_all, fields(hostname = %node_info.hostname))]
	pub async fn enroll(&self, token: &str, node_info: &NodeInfo) -> FleetResult<EnrollResponse> {
		// Issued tokens are TOKEN_BYTES of entropy, hex-encoded.
		if token.len() != TOKEN_BYTES * 2 {
			return Err(FleetError::Validation("malformed enrollment token".into()));
		}
		if node_info.hostname.is_empty() {
			return Err(FleetError::Validation("hostname is required".into()));
		}

		let node = self
			.nodes
			.get_node_by_enrollment_token(token)
			.await
			.map_err(db_err)?
			.ok_or(FleetError::NotFound)?;

		match node.enrollment_expires_at {
			Some(expires_at) if expires_at > Utc::now() => {}
			_ => {
				warn!(node_id = %node.id, "enrollment token expired");
				return Err(FleetError::Expired);
			}
		}

		match self
			.nodes
			.consume_enrollment_token(&node.id, token)
			.await
			.map_err(db_err)?
		{
			ConsumeOutcome::Consumed => {}
			ConsumeOutcome::Lost => {
				warn!(node_id = %node.id, "lost enrollment race");
				return Err(FleetError::AlreadyConsumed);
			}
		}

		info!(node_id = %node.id, "enrollment token consumed, provisioning");

		let provision_request = ProvisionRequest {
			node_id: node.id.0.clone(),
			name: node.name.clone(),
			fqdn: node_info.hostname.clone(),
			public_ip: node_info.public_ip.clone(),
			memory_mb: node_info.memory_mb,
			disk_gb: node_info.disk_gb,
		};

		// No lock is held across this call; the panel round-trips are the
		// dominant latency of enrollment.
		let outcome = match self
			.panel
			.provision_node(&self.vault, &provision_request)
			.await
		{
			Ok(outcome) => outcome,
			Err(panel_err) => {
				let reason = panel_err.to_string();
				error!(node_id = %node.id, error = %reason, "provisioning failed");
				if let Err(db) = self.nodes.mark_error(&node.id, &reason).await {
					error!(node_id = %node.id, error = %db, "failed to record error state");
				}
				return Err(panel_err.into());
			}
		};

		let issued = match self.credentials.issue(&node.id, &node.tenant_id) {
			Ok(issued) => issued,
			Err(err) => return self.fail_enrollment(&node.id, err).await,
		};

		if let Err(err) = self
			.nodes
			.record_provisioned(
				&node.id,
				&outcome.external_resource_id,
				&outcome.encrypted_daemon_secret,
				&issued.credential_id,
				node_info,
			)
			.await
			.map_err(db_err)
		{
			return self.fail_enrollment(&node.id, err).await;
		}

		info!(
			node_id = %node.id,
			external_resource_id = %outcome.external_resource_id,
			"node enrolled"
		);

		Ok(EnrollResponse {
			node_id: node.id,
			auth_credential: issued.token,
			daemon_config: Some(outcome.daemon_config),
		})
	}

	/// Panel resources already exist at this point, so the node must not be
	/// left silently in `installing`; the stored reason tells the operator
	/// what to reconcile.
	async fn fail_enrollment<T>(&self, node_id: &NodeId, err: FleetError) -> FleetResult<T> {
		let reason = err.to_string();
		error!(node_id = %node_id, error = %reason, "failed to finalize enrollment");
		if let Err(db) = self.nodes.mark_error(node_id, &reason).await {
			error!(node_id = %node_id, error = %db, "failed to record error state");
		}
		Err(err)
	}

	/// Validates a node credential. See [`CredentialIssuer::verify`].
	pub fn verify_auth_credential(
		&self,
		credential: &str,
	) -> FleetResult<crate::credential::NodeIdentity> {
		self.credentials.verify(credential)
	}
}
