// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP error mapping for the agent API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use talon_common_core::FleetError;
use tracing::error;

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

/// Wrapper turning domain errors into HTTP responses.
#[derive(Debug)]
pub struct ServerError(pub FleetError);

impl From<FleetError> for ServerError {
	fn from(err: FleetError) -> Self {
		Self(err)
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, error) = match &self.0 {
			FleetError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
			FleetError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
			FleetError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
			FleetError::AlreadyConsumed => (StatusCode::CONFLICT, "already_consumed"),
			FleetError::Expired => (StatusCode::GONE, "expired"),
			FleetError::TransientNetwork(_) | FleetError::PermanentProvisioning(_) => {
				(StatusCode::BAD_GATEWAY, "provisioning_failed")
			}
			FleetError::DecryptionFailed | FleetError::Internal(_) => {
				(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
			}
		};

		// Internal detail stays in the logs, not the response body.
		let message = match &self.0 {
			FleetError::DecryptionFailed | FleetError::Internal(_) => {
				error!(error = %self.0, "internal error serving agent request");
				"internal server error".to_string()
			}
			other => other.to_string(),
		};

		(
			status,
			Json(ErrorResponse {
				error: error.to_string(),
				message,
			}),
		)
			.into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn status_for(err: FleetError) -> StatusCode {
		ServerError(err).into_response().status()
	}

	#[test]
	fn domain_errors_map_to_expected_statuses() {
		assert_eq!(
			status_for(FleetError::Validation("bad".into())),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(
			status_for(FleetError::Unauthorized("invalid credential".into())),
			StatusCode::UNAUTHORIZED
		);
		assert_eq!(status_for(FleetError::NotFound), StatusCode::NOT_FOUND);
		assert_eq!(status_for(FleetError::AlreadyConsumed), StatusCode::CONFLICT);
		assert_eq!(status_for(FleetError::Expired), StatusCode::GONE);
		assert_eq!(
			status_for(FleetError::PermanentProvisioning("panel said no".into())),
			StatusCode::BAD_GATEWAY
		);
		assert_eq!(
			status_for(FleetError::Internal("db".into())),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}
}
