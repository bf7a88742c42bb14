// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The retrying panel client.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument, warn};
use zeroize::Zeroizing;

use talon_common_http::{retry, RetryConfig};
use talon_server_vault::SecretVault;

use crate::error::PanelError;
use crate::types::{
	AllocationRange, CreateAllocationRangeRequest, CreateLocationRequest, CreatePanelNodeRequest,
	Location, PanelNode, ProvisionOutcome, ProvisionRequest,
};

/// Per-attempt timeout applied to every panel request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard ceiling for a whole provisioning run, across all calls and retries.
const DEFAULT_PROVISION_DEADLINE: Duration = Duration::from_secs(60);

/// Port window allocated to a freshly provisioned node.
const DEFAULT_PORT_START: u16 = 25565;
const DEFAULT_PORT_END: u16 = 25664;

/// Idempotency key header; retries of a creation call reuse the same value
/// so the panel can deduplicate.
const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// Panel connection settings.
#[derive(Debug, Clone)]
pub struct PanelConfig {
	pub base_url: String,
	/// Vault blob holding the panel API key; decrypted once at construction.
	pub encrypted_api_key: String,
	pub request_timeout: Duration,
	pub provision_deadline: Duration,
	pub retry: RetryConfig,
}

impl PanelConfig {
	pub fn new(base_url: impl Into<String>, encrypted_api_key: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			encrypted_api_key: encrypted_api_key.into(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			provision_deadline: DEFAULT_PROVISION_DEADLINE,
			retry: RetryConfig::default(),
		}
	}
}

/// Client for the panel's management API.
pub struct PanelClient {
	http: reqwest::Client,
	base_url: String,
	api_key: Zeroizing<String>,
	retry: RetryConfig,
	provision_deadline: Duration,
}

impl PanelClient {
	/// Builds a client, decrypting the API key through the vault.
	pub fn new(config: PanelConfig, vault: &SecretVault) -> Result<Self, PanelError> {
		let api_key = vault.decrypt_string(&config.encrypted_api_key)?;
		let http = talon_common_http::builder()
			.timeout(config.request_timeout)
			.build()
			.map_err(|e| PanelError::InvalidResponse(format!("client build failed: {e}")))?;

		Ok(Self {
			http,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			api_key,
			retry: config.retry,
			provision_deadline: config.provision_deadline,
		})
	}

	/// One POST attempt. Classifies failures: request errors and 5xx are
	/// transient, 4xx is permanent.
	async fn post_once<B: Serialize, R: DeserializeOwned>(
		&self,
		path: &str,
		idempotency_key: &str,
		body: &B,
	) -> Result<R, PanelError> {
		let url = format!("{}{}", self.base_url, path);
		let response = self
			.http
			.post(&url)
			.bearer_auth(self.api_key.as_str())
			.header(IDEMPOTENCY_HEADER, idempotency_key)
			.json(body)
			.send()
			.await
			.map_err(|e| PanelError::Transient(e.to_string()))?;

		let status = response.status();
		if status.is_server_error() {
			return Err(PanelError::Transient(format!("HTTP {status}")));
		}
		if status.is_client_error() {
			let message = response.text().await.unwrap_or_default();
			return Err(PanelError::Permanent {
				status: status.as_u16(),
				message,
			});
		}

		response
			.json::<R>()
			.await
			.map_err(|e| PanelError::InvalidResponse(e.to_string()))
	}

	/// POST with the configured retry policy.
	async fn post<B: Serialize, R: DeserializeOwned>(
		&self,
		label: &str,
		path: &str,
		idempotency_key: &str,
		body: &B,
	) -> Result<R, PanelError> {
		retry(label, &self.retry, || {
			self.post_once(path, idempotency_key, body)
		})
		.await
	}

	pub async fn create_location(
		&self,
		idempotency_key: &str,
		req: &CreateLocationRequest,
	) -> Result<Location, PanelError> {
		self.post(
			"panel.create_location",
			"/api/application/locations",
			idempotency_key,
			req,
		)
		.await
	}

	pub async fn create_panel_node(
		&self,
		idempotency_key: &str,
		req: &CreatePanelNodeRequest,
	) -> Result<PanelNode, PanelError> {
		self.post(
			"panel.create_node",
			"/api/application/nodes",
			idempotency_key,
			req,
		)
		.await
	}

	pub async fn create_allocation_range(
		&self,
		idempotency_key: &str,
		req: &CreateAllocationRangeRequest,
	) -> Result<AllocationRange, PanelError> {
		self.post(
			"panel.create_allocation_range",
			"/api/application/allocations",
			idempotency_key,
			req,
		)
		.await
	}

	/// Provisions the panel-side resources backing one node: location, node
	/// record, allocation range.
	///
	/// Runs under [`PanelConfig::provision_deadline`]; when the ceiling
	/// elapses the run fails terminally even if every individual attempt was
	/// within its own timeout. The daemon token from the panel is encrypted
	/// before this function returns; it is never persisted or logged in
	/// plaintext.
	#[instrument(skip(self, vault, req), fields(node_id = %req.node_id))]
	pub async fn provision_node(
		&self,
		vault: &SecretVault,
		req: &ProvisionRequest,
	) -> Result<ProvisionOutcome, PanelError> {
		tokio::time::timeout(self.provision_deadline, self.provision_inner(vault, req))
			.await
			.map_err(|_| {
				warn!(node_id = %req.node_id, "provisioning deadline exceeded");
				PanelError::DeadlineExceeded
			})?
	}

	async fn provision_inner(
		&self,
		vault: &SecretVault,
		req: &ProvisionRequest,
	) -> Result<ProvisionOutcome, PanelError> {
		let location = self
			.create_location(
				&req.node_id,
				&CreateLocationRequest {
					short: req.name.clone(),
					long: req.fqdn.clone(),
				},
			)
			.await?;

		let panel_node = self
			.create_panel_node(
				&req.node_id,
				&CreatePanelNodeRequest {
					name: req.name.clone(),
					fqdn: req.fqdn.clone(),
					location_id: location.id,
					memory_mb: req.memory_mb,
					disk_mb: req.disk_gb * 1024,
				},
			)
			.await?;

		let encrypted_daemon_secret = vault.encrypt(panel_node.daemon_token.as_bytes())?;

		self.create_allocation_range(
			&req.node_id,
			&CreateAllocationRangeRequest {
				node_id: panel_node.id,
				ip: req.public_ip.clone().unwrap_or_else(|| "0.0.0.0".to_string()),
				port_start: DEFAULT_PORT_START,
				port_end: DEFAULT_PORT_END,
			},
		)
		.await?;

		info!(
			node_id = %req.node_id,
			external_resource_id = panel_node.id,
			"panel resources provisioned"
		);

		Ok(ProvisionOutcome {
			external_resource_id: panel_node.id.to_string(),
			encrypted_daemon_secret,
			daemon_config: panel_node.daemon_config,
		})
	}
}
