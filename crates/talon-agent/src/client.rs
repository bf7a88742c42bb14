// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP client for the fleet gateway.

use std::time::Duration;

use reqwest::StatusCode;
use talon_common_core::{
	EnrollRequest, EnrollResponse, HeartbeatRequest, HeartbeatResponse, NodeInfo,
};
use thiserror::Error;
use tracing::instrument;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("transport error: {0}")]
	Transport(#[from] reqwest::Error),

	/// Credential rejected. The agent must stop rather than retry.
	#[error("gateway rejected credential")]
	Unauthorized,

	#[error("gateway returned HTTP {status}: {body}")]
	Http { status: StatusCode, body: String },
}

pub struct GatewayClient {
	client: reqwest::Client,
	base_url: String,
}

impl GatewayClient {
	pub fn new(base_url: impl Into<String>, tls_skip_verify: bool) -> Self {
		let client = if tls_skip_verify {
			talon_common_http::new_insecure_client_with_timeout(REQUEST_TIMEOUT)
		} else {
			talon_common_http::new_client_with_timeout(REQUEST_TIMEOUT)
		};
		Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base_url)
	}

	#[instrument(skip_all)]
	pub async fn enroll(
		&self,
		token: &str,
		node_info: &NodeInfo,
	) -> Result<EnrollResponse, GatewayError> {
		let request = EnrollRequest {
			token: token.to_string(),
			node_info: node_info.clone(),
		};
		let response = self
			.client
			.post(self.url("/api/agent/enroll"))
			.json(&request)
			.send()
			.await?;
		Self::decode(response).await
	}

	#[instrument(skip_all)]
	pub async fn heartbeat(
		&self,
		credential: &str,
		request: &HeartbeatRequest,
	) -> Result<HeartbeatResponse, GatewayError> {
		let response = self
			.client
			.post(self.url("/api/agent/heartbeat"))
			.bearer_auth(credential)
			.json(request)
			.send()
			.await?;
		Self::decode(response).await
	}

	async fn decode<T: serde::de::DeserializeOwned>(
		response: reqwest::Response,
	) -> Result<T, GatewayError> {
		let status = response.status();
		if status == StatusCode::UNAUTHORIZED {
			return Err(GatewayError::Unauthorized);
		}
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(GatewayError::Http { status, body });
		}
		Ok(response.json().await?)
	}
}
