// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Liveness endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::AppState;

/// GET /healthz - process liveness plus a database round-trip.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
	match sqlx::query("SELECT 1").execute(&state.pool).await {
		Ok(_) => (
			StatusCode::OK,
			Json(json!({
				"status": "ok",
				"timestamp": chrono::Utc::now().to_rfc3339(),
			})),
		),
		Err(e) => (
			StatusCode::SERVICE_UNAVAILABLE,
			Json(json!({
				"status": "unavailable",
				"message": e.to_string(),
			})),
		),
	}
}
