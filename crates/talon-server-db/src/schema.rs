// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Schema creation for the fleet database.

use sqlx::SqlitePool;

use crate::error::Result;

/// Creates all fleet tables if they do not exist. Run once at startup.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS nodes (
			id TEXT PRIMARY KEY,
			tenant_id TEXT NOT NULL,
			name TEXT NOT NULL,
			fqdn TEXT,
			public_ip TEXT,
			private_ip TEXT,
			cpu_cores INTEGER,
			memory_mb INTEGER,
			disk_gb INTEGER,
			status TEXT NOT NULL DEFAULT 'pending',
			enrollment_token TEXT UNIQUE,
			enrollment_expires_at TEXT,
			auth_credential_id TEXT,
			encrypted_daemon_secret TEXT,
			external_resource_id TEXT,
			last_heartbeat_at TEXT,
			agent_version TEXT,
			daemon_version TEXT,
			last_error TEXT,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS metric_samples (
			node_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
			sampled_at TEXT NOT NULL,
			cpu_usage_pct REAL NOT NULL,
			memory_usage_pct REAL NOT NULL,
			disk_usage_pct REAL NOT NULL,
			network_rx_bytes INTEGER NOT NULL,
			network_tx_bytes INTEGER NOT NULL,
			uptime_seconds INTEGER NOT NULL,
			PRIMARY KEY (node_id, sampled_at)
		)
		"#,
	)
	.execute(pool)
	.await?;

	Ok(())
}
