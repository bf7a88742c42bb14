// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use talon_common_core::FleetError;
use talon_common_http::RetryableError;
use talon_server_vault::VaultError;

/// Errors from panel API calls.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
	/// Network timeout, connection refused, or HTTP 5xx. Retryable.
	#[error("Transient panel error: {0}")]
	Transient(String),

	/// HTTP 4xx: bad request, auth failure, conflict. Never retried.
	#[error("Panel rejected request: HTTP {status}: {message}")]
	Permanent { status: u16, message: String },

	/// The overall provisioning ceiling elapsed, regardless of how far the
	/// individual attempts got.
	#[error("Provisioning deadline exceeded")]
	DeadlineExceeded,

	#[error("Invalid panel response: {0}")]
	InvalidResponse(String),

	#[error(transparent)]
	Vault(#[from] VaultError),
}

impl RetryableError for PanelError {
	fn is_retryable(&self) -> bool {
		matches!(self, PanelError::Transient(_))
	}
}

impl From<PanelError> for FleetError {
	fn from(err: PanelError) -> Self {
		match err {
			PanelError::Transient(msg) => FleetError::TransientNetwork(msg),
			other => FleetError::PermanentProvisioning(other.to_string()),
		}
	}
}
