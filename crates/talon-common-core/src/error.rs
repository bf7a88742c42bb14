// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for fleet operations.
pub type FleetResult<T> = Result<T, FleetError>;

/// Error taxonomy shared across the gateway, heartbeat processor,
/// orchestration client, and agent.
///
/// Variants map one-to-one onto the retry contract: `TransientNetwork` is the
/// only variant the orchestration client retries; enrollment race outcomes
/// (`NotFound`, `Expired`, `AlreadyConsumed`) are distinguished so the agent
/// can tell a replay of its own request from a lost race.
#[derive(Error, Debug)]
pub enum FleetError {
	#[error("Validation error: {0}")]
	Validation(String),

	#[error("Not found")]
	NotFound,

	#[error("Enrollment token expired")]
	Expired,

	#[error("Enrollment token already consumed")]
	AlreadyConsumed,

	/// Credential rejected. The message is a generic reason only; validation
	/// detail is never echoed back to the caller.
	#[error("Unauthorized: {0}")]
	Unauthorized(String),

	#[error("Transient network error: {0}")]
	TransientNetwork(String),

	#[error("Permanent provisioning error: {0}")]
	PermanentProvisioning(String),

	#[error("Decryption failed")]
	DecryptionFailed,

	#[error("Internal error: {0}")]
	Internal(String),
}

impl FleetError {
	/// Whether the orchestration client may retry the failed call.
	pub fn is_retryable(&self) -> bool {
		matches!(self, FleetError::TransientNetwork(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_transient_errors_are_retryable() {
		assert!(FleetError::TransientNetwork("timeout".into()).is_retryable());
		assert!(!FleetError::PermanentProvisioning("HTTP 400".into()).is_retryable());
		assert!(!FleetError::AlreadyConsumed.is_retryable());
		assert!(!FleetError::Unauthorized("invalid credential".into()).is_retryable());
	}

	#[test]
	fn race_outcomes_are_distinct() {
		// NotFound (replayed request after the winner cleared the token) and
		// AlreadyConsumed (lost a live race) must render differently so the
		// agent can disambiguate.
		assert_ne!(
			FleetError::NotFound.to_string(),
			FleetError::AlreadyConsumed.to_string()
		);
	}
}
