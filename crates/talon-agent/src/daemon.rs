// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Local hosting daemon management.
//!
//! The gateway hands back an opaque configuration document at enrollment;
//! this module writes it to the daemon's config path and bounces the
//! systemd unit. The document is serialized as JSON, which the daemon's
//! YAML config parser accepts.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, instrument, warn};

use crate::config::DaemonSettings;

/// Delay between `systemctl restart` and the `is-active` verification.
const RESTART_SETTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DaemonError {
	#[error("failed to write daemon config at {path}: {source}")]
	WriteConfig {
		path: String,
		source: std::io::Error,
	},

	#[error("failed to serialize daemon config: {0}")]
	Serialize(#[from] serde_json::Error),

	#[error("failed to run systemctl: {0}")]
	Systemctl(std::io::Error),

	#[error("unit {0} did not become active after restart")]
	NotActive(String),
}

/// Writes the daemon config (mode `0600`) and restarts the unit if
/// `auto_restart` is set.
#[instrument(skip(settings, document), fields(path = %settings.config_path))]
pub async fn apply_config(
	settings: &DaemonSettings,
	document: &serde_json::Value,
) -> Result<(), DaemonError> {
	write_config(&settings.config_path, document)?;
	info!("daemon config written");

	if settings.auto_restart {
		restart_unit(&settings.service_name).await?;
	} else {
		warn!(unit = %settings.service_name, "auto_restart disabled, daemon not restarted");
	}
	Ok(())
}

fn write_config(path: &str, document: &serde_json::Value) -> Result<(), DaemonError> {
	let content = serde_json::to_vec_pretty(document)?;
	let path_ref = Path::new(path);

	let io_err = |source: std::io::Error| DaemonError::WriteConfig {
		path: path.to_string(),
		source,
	};

	if let Some(parent) = path_ref.parent() {
		std::fs::create_dir_all(parent).map_err(io_err)?;
	}
	std::fs::write(path_ref, content).map_err(io_err)?;

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		std::fs::set_permissions(path_ref, std::fs::Permissions::from_mode(0o600))
			.map_err(io_err)?;
	}

	Ok(())
}

async fn restart_unit(unit: &str) -> Result<(), DaemonError> {
	info!(unit = %unit, "restarting daemon unit");
	let status = Command::new("systemctl")
		.args(["restart", unit])
		.status()
		.await
		.map_err(DaemonError::Systemctl)?;
	if !status.success() {
		return Err(DaemonError::NotActive(unit.to_string()));
	}

	tokio::time::sleep(RESTART_SETTLE).await;

	let status = Command::new("systemctl")
		.args(["is-active", unit])
		.status()
		.await
		.map_err(DaemonError::Systemctl)?;
	if !status.success() {
		return Err(DaemonError::NotActive(unit.to_string()));
	}

	info!(unit = %unit, "daemon unit active");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use tempfile::tempdir;

	#[test]
	fn config_lands_on_disk_owner_only() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("nested/config.yml");
		let path_str = path.to_str().unwrap();

		write_config(path_str, &json!({"token": "secret", "port": 8080})).unwrap();

		let content = std::fs::read_to_string(&path).unwrap();
		assert!(content.contains("secret"));

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let mode = std::fs::metadata(&path).unwrap().permissions().mode();
			assert_eq!(mode & 0o777, 0o600);
		}
	}
}
