// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Agent-facing routes.
//!
//! Endpoints:
//! - `POST /api/agent/enroll` - One-time enrollment token exchange
//! - `POST /api/agent/heartbeat` - Authenticated liveness and telemetry

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use talon_common_core::{EnrollRequest, EnrollResponse, FleetError, HeartbeatRequest, HeartbeatResponse};
use tracing::instrument;

use crate::api::AppState;
use crate::error::ServerError;

/// Pulls the node credential out of `Authorization: Bearer <credential>`.
///
/// Every malformed shape collapses to the same `Unauthorized` detail so the
/// header gives probes nothing to enumerate.
fn bearer_credential(headers: &HeaderMap) -> Result<&str, ServerError> {
	let unauthorized = || ServerError(FleetError::Unauthorized("invalid credential".to_string()));

	let value = headers.get("authorization").ok_or_else(unauthorized)?;
	let value = value.to_str().map_err(|_| unauthorized())?;
	let credential = value.strip_prefix("Bearer ").ok_or_else(unauthorized)?;
	if credential.is_empty() {
		return Err(unauthorized());
	}
	Ok(credential)
}

#[instrument(skip_all, fields(hostname = %payload.node_info.hostname))]
pub async fn enroll(
	State(state): State<AppState>,
	Json(payload): Json<EnrollRequest>,
) -> Result<Json<EnrollResponse>, ServerError> {
	let response = state
		.gateway
		.enroll(&payload.token, &payload.node_info)
		.await?;
	Ok(Json(response))
}

#[instrument(skip_all)]
pub async fn heartbeat(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ServerError> {
	let credential = bearer_credential(&headers)?;
	let response = state.heartbeats.handle(credential, &payload).await?;
	Ok(Json(response))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	fn headers_with(value: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert("authorization", HeaderValue::from_str(value).unwrap());
		headers
	}

	#[test]
	fn bearer_credential_extracts_token() {
		let headers = headers_with("Bearer abc.def.ghi");
		assert_eq!(bearer_credential(&headers).unwrap(), "abc.def.ghi");
	}

	#[test]
	fn missing_header_is_unauthorized() {
		assert!(bearer_credential(&HeaderMap::new()).is_err());
	}

	#[test]
	fn wrong_scheme_is_unauthorized() {
		let headers = headers_with("Basic dXNlcjpwYXNz");
		assert!(bearer_credential(&headers).is_err());
	}

	#[test]
	fn empty_credential_is_unauthorized() {
		let headers = headers_with("Bearer ");
		assert!(bearer_credential(&headers).is_err());
	}
}
