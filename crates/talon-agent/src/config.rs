// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Agent configuration file handling.
//!
//! The config lives at `/etc/talon/agent.toml` by default. Enrollment
//! rewrites it: the one-time token is cleared and the issued credential and
//! node id are persisted in its place. The file is written `0600` since it
//! holds the node credential.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/talon/agent.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config at {path}: {source}")]
	Read {
		path: String,
		source: std::io::Error,
	},

	#[error("failed to write config at {path}: {source}")]
	Write {
		path: String,
		source: std::io::Error,
	},

	#[error("invalid config: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("failed to serialize config: {0}")]
	Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub enroll_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_credential: Option<String>,
	/// Accept the gateway's certificate without verification. Lab use only.
	#[serde(default)]
	pub tls_skip_verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_id: Option<String>,
	#[serde(default = "default_heartbeat_interval")]
	pub heartbeat_interval_seconds: u64,
	/// How often a fresh metrics snapshot is taken. Heartbeats between
	/// snapshots resend the previous sample, which the server records
	/// idempotently.
	#[serde(default = "default_metrics_interval")]
	pub metrics_interval_seconds: u64,
}

fn default_heartbeat_interval() -> u64 {
	30
}

fn default_metrics_interval() -> u64 {
	60
}

impl Default for AgentSettings {
	fn default() -> Self {
		Self {
			node_id: None,
			heartbeat_interval_seconds: default_heartbeat_interval(),
			metrics_interval_seconds: default_metrics_interval(),
		}
	}
}

/// Settings for the locally managed hosting daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
	#[serde(default = "default_daemon_config_path")]
	pub config_path: String,
	#[serde(default = "default_daemon_unit")]
	pub service_name: String,
	#[serde(default = "default_true")]
	pub auto_restart: bool,
}

fn default_daemon_config_path() -> String {
	"/etc/pterodactyl/config.yml".to_string()
}

fn default_daemon_unit() -> String {
	"wings.service".to_string()
}

fn default_true() -> bool {
	true
}

impl Default for DaemonSettings {
	fn default() -> Self {
		Self {
			config_path: default_daemon_config_path(),
			service_name: default_daemon_unit(),
			auto_restart: default_true(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
	pub gateway: GatewayConfig,
	#[serde(default)]
	pub agent: AgentSettings,
	#[serde(default)]
	pub daemon: DaemonSettings,
}

impl AgentConfig {
	/// Minimal config for a first enrollment, as `--install` produces.
	pub fn for_install(gateway_url: impl Into<String>, enroll_token: impl Into<String>) -> Self {
		Self {
			gateway: GatewayConfig {
				url: gateway_url.into(),
				enroll_token: Some(enroll_token.into()),
				auth_credential: None,
				tls_skip_verify: false,
			},
			agent: AgentSettings::default(),
			daemon: DaemonSettings::default(),
		}
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.display().to_string(),
			source,
		})?;
		Ok(toml::from_str(&content)?)
	}

	pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
		let path = path.as_ref();
		let content = toml::to_string_pretty(self)?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
				path: path.display().to_string(),
				source,
			})?;
		}
		fs::write(path, content).map_err(|source| ConfigError::Write {
			path: path.display().to_string(),
			source,
		})?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
				ConfigError::Write {
					path: path.display().to_string(),
					source,
				}
			})?;
		}

		Ok(())
	}
}
