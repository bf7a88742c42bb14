// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Application state and router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use talon_server_db::{SqliteMetricStore, SqliteNodeStore};
use talon_server_fleet::{CredentialIssuer, EnrollmentGateway, HeartbeatProcessor};
use talon_server_panel::{PanelClient, PanelConfig};
use talon_server_vault::SecretVault;

use crate::config::ServerConfig;
use crate::routes;

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub gateway: Arc<EnrollmentGateway>,
	pub heartbeats: Arc<HeartbeatProcessor>,
}

/// Wires stores, vault, panel client and fleet services into [`AppState`].
pub fn create_app_state(
	pool: SqlitePool,
	config: &ServerConfig,
) -> Result<AppState, Box<dyn std::error::Error>> {
	let vault = Arc::new(SecretVault::from_hex(&config.vault_key_hex)?);

	let mut panel_config = PanelConfig::new(
		config.panel_base_url.clone(),
		config.panel_api_key_encrypted.clone(),
	);
	panel_config.provision_deadline = config.provision_deadline;
	let panel = Arc::new(PanelClient::new(panel_config, &vault)?);

	let credentials = Arc::new(CredentialIssuer::new(config.credential_secret.as_bytes()));

	let nodes = Arc::new(SqliteNodeStore::new(pool.clone()));
	let metrics = Arc::new(SqliteMetricStore::new(pool.clone()));

	let gateway = Arc::new(EnrollmentGateway::new(
		nodes.clone(),
		panel,
		vault,
		credentials.clone(),
	));
	let heartbeats = Arc::new(HeartbeatProcessor::new(nodes, metrics, credentials));

	Ok(AppState {
		pool,
		gateway,
		heartbeats,
	})
}

/// Builds the full application router.
pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/healthz", get(routes::health::healthz))
		.route("/api/agent/enroll", post(routes::agent::enroll))
		.route("/api/agent/heartbeat", post(routes::agent::heartbeat))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
