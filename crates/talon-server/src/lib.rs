// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP server for the Talon fleet gateway.
//!
//! Exposes the agent-facing API (`/api/agent/*`) plus a liveness endpoint,
//! wiring the enrollment gateway and heartbeat processor over SQLite and the
//! external panel client.

pub mod api;
pub mod config;
pub mod error;
pub mod routes;

pub use api::{create_app_state, create_router, AppState};
pub use config::{load_config, ConfigError, ServerConfig};
pub use error::ServerError;
