// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Server configuration, resolved from `TALON_SERVER_*` environment
//! variables with built-in defaults for everything non-secret.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("missing required environment variable: {0}")]
	Missing(&'static str),

	#[error("invalid value for {var}: {reason}")]
	Invalid { var: &'static str, reason: String },
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub host: String,
	pub port: u16,
	pub database_url: String,
	/// Hex-encoded 256-bit vault master key.
	pub vault_key_hex: String,
	/// HMAC secret for node credential signing.
	pub credential_secret: String,
	pub panel_base_url: String,
	/// Panel API key as a vault blob; decrypted only inside the panel client.
	pub panel_api_key_encrypted: String,
	pub provision_deadline: Duration,
}

impl ServerConfig {
	/// Socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

fn required(var: &'static str) -> Result<String, ConfigError> {
	env::var(var).map_err(|_| ConfigError::Missing(var))
}

fn optional(var: &'static str, default: &str) -> String {
	env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Loads configuration from the environment.
///
/// Secrets (`TALON_SERVER_VAULT_KEY`, `TALON_SERVER_CREDENTIAL_SECRET`,
/// `TALON_SERVER_PANEL_API_KEY_ENC`) have no defaults and must be set.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let port_str = optional("TALON_SERVER_PORT", "8443");
	let port: u16 = port_str.parse().map_err(|e| ConfigError::Invalid {
		var: "TALON_SERVER_PORT",
		reason: format!("{e}"),
	})?;

	let deadline_str = optional("TALON_SERVER_PROVISION_DEADLINE_SECS", "60");
	let deadline_secs: u64 = deadline_str.parse().map_err(|e| ConfigError::Invalid {
		var: "TALON_SERVER_PROVISION_DEADLINE_SECS",
		reason: format!("{e}"),
	})?;

	let vault_key_hex = required("TALON_SERVER_VAULT_KEY")?;
	if vault_key_hex.len() != 64 {
		return Err(ConfigError::Invalid {
			var: "TALON_SERVER_VAULT_KEY",
			reason: "expected 64 hex characters (256-bit key)".to_string(),
		});
	}

	let credential_secret = required("TALON_SERVER_CREDENTIAL_SECRET")?;
	if credential_secret.len() < 32 {
		return Err(ConfigError::Invalid {
			var: "TALON_SERVER_CREDENTIAL_SECRET",
			reason: "expected at least 32 bytes".to_string(),
		});
	}

	Ok(ServerConfig {
		host: optional("TALON_SERVER_HOST", "0.0.0.0"),
		port,
		database_url: optional("TALON_SERVER_DATABASE_URL", "sqlite:talon.db"),
		vault_key_hex,
		credential_secret,
		panel_base_url: required("TALON_SERVER_PANEL_URL")?,
		panel_api_key_encrypted: required("TALON_SERVER_PANEL_API_KEY_ENC")?,
		provision_deadline: Duration::from_secs(deadline_secs),
	})
}
