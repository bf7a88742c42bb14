// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Node repository.
//!
//! Enrollment-token consumption is a compare-and-clear: a single conditional
//! UPDATE that fails (zero rows) if the token no longer matches, so exactly
//! one concurrent caller can win. Heartbeat recording keeps
//! `last_heartbeat_at` monotonically non-decreasing and never moves a node
//! out of `error`. Both rules live in the UPDATE itself so concurrent
//! callers cannot regress state.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use talon_common_core::{Node, NodeId, NodeInfo, NodeStatus, TenantId};

use crate::error::{DbError, Result};

/// Outcome of a compare-and-clear token consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
	/// This caller cleared the token and moved the node to `installing`.
	Consumed,
	/// The token no longer matched: a concurrent caller won the race.
	Lost,
}

#[async_trait]
pub trait NodeStore: Send + Sync {
	async fn create_node(&self, node: &Node) -> Result<()>;
	async fn get_node(&self, id: &NodeId) -> Result<Option<Node>>;
	async fn get_node_by_enrollment_token(&self, token: &str) -> Result<Option<Node>>;

	/// Stores a fresh enrollment token on a pending node. Fails with
	/// `InvalidData` if the node is not `pending`.
	async fn set_enrollment_token(
		&self,
		id: &NodeId,
		token: &str,
		expires_at: DateTime<Utc>,
	) -> Result<()>;

	/// Atomically clears the token and transitions `pending → installing`.
	async fn consume_enrollment_token(&self, id: &NodeId, token: &str) -> Result<ConsumeOutcome>;

	/// Persists the provisioning result and node-reported hardware facts.
	async fn record_provisioned(
		&self,
		id: &NodeId,
		external_resource_id: &str,
		encrypted_daemon_secret: &str,
		auth_credential_id: &str,
		info: &NodeInfo,
	) -> Result<()>;

	/// Moves the node to terminal `error` with a stored reason.
	async fn mark_error(&self, id: &NodeId, reason: &str) -> Result<()>;

	/// Records a heartbeat: bumps `last_heartbeat_at` (monotonic), sets
	/// `online` where the lifecycle allows it, stores version strings.
	async fn record_heartbeat(
		&self,
		id: &NodeId,
		now: DateTime<Utc>,
		agent_version: &str,
		daemon_version: Option<&str>,
	) -> Result<()>;
}

/// SQLite implementation of the node store.
#[derive(Clone)]
pub struct SqliteNodeStore {
	pool: SqlitePool,
}

impl SqliteNodeStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

/// Fixed-width RFC 3339 so TEXT comparison orders chronologically.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(s)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::InvalidData(format!("invalid timestamp: {e}")))
}

#[derive(sqlx::FromRow)]
struct NodeRow {
	id: String,
	tenant_id: String,
	name: String,
	fqdn: Option<String>,
	public_ip: Option<String>,
	private_ip: Option<String>,
	cpu_cores: Option<i64>,
	memory_mb: Option<i64>,
	disk_gb: Option<i64>,
	status: String,
	enrollment_token: Option<String>,
	enrollment_expires_at: Option<String>,
	auth_credential_id: Option<String>,
	encrypted_daemon_secret: Option<String>,
	external_resource_id: Option<String>,
	last_heartbeat_at: Option<String>,
	agent_version: Option<String>,
	daemon_version: Option<String>,
	last_error: Option<String>,
	created_at: String,
	updated_at: String,
}

impl TryFrom<NodeRow> for Node {
	type Error = DbError;

	fn try_from(row: NodeRow) -> Result<Self> {
		Ok(Node {
			id: NodeId(row.id),
			tenant_id: TenantId(row.tenant_id),
			name: row.name,
			fqdn: row.fqdn,
			public_ip: row.public_ip,
			private_ip: row.private_ip,
			cpu_cores: row.cpu_cores.map(|v| v as u32),
			memory_mb: row.memory_mb.map(|v| v as u64),
			disk_gb: row.disk_gb.map(|v| v as u64),
			status: row
				.status
				.parse::<NodeStatus>()
				.map_err(DbError::InvalidData)?,
			enrollment_token: row.enrollment_token,
			enrollment_expires_at: row.enrollment_expires_at.as_deref().map(parse_ts).transpose()?,
			auth_credential_id: row.auth_credential_id,
			encrypted_daemon_secret: row.encrypted_daemon_secret,
			external_resource_id: row.external_resource_id,
			last_heartbeat_at: row.last_heartbeat_at.as_deref().map(parse_ts).transpose()?,
			agent_version: row.agent_version,
			daemon_version: row.daemon_version,
			last_error: row.last_error,
			created_at: parse_ts(&row.created_at)?,
			updated_at: parse_ts(&row.updated_at)?,
		})
	}
}

#[async_trait]
impl NodeStore for SqliteNodeStore {
	#[instrument(skip(self, node), fields(node_id = %node.id))]
	async fn create_node(&self, node: &Node) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO nodes (
				id, tenant_id, name, fqdn, public_ip, private_ip,
				cpu_cores, memory_mb, disk_gb, status,
				enrollment_token, enrollment_expires_at,
				auth_credential_id, encrypted_daemon_secret, external_resource_id,
				last_heartbeat_at, agent_version, daemon_version, last_error,
				created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&node.id.0)
		.bind(&node.tenant_id.0)
		.bind(&node.name)
		.bind(&node.fqdn)
		.bind(&node.public_ip)
		.bind(&node.private_ip)
		.bind(node.cpu_cores.map(|v| v as i64))
		.bind(node.memory_mb.map(|v| v as i64))
		.bind(node.disk_gb.map(|v| v as i64))
		.bind(node.status.to_string())
		.bind(&node.enrollment_token)
		.bind(node.enrollment_expires_at.map(fmt_ts))
		.bind(&node.auth_credential_id)
		.bind(&node.encrypted_daemon_secret)
		.bind(&node.external_resource_id)
		.bind(node.last_heartbeat_at.map(fmt_ts))
		.bind(&node.agent_version)
		.bind(&node.daemon_version)
		.bind(&node.last_error)
		.bind(fmt_ts(node.created_at))
		.bind(fmt_ts(node.updated_at))
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	async fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
		let row: Option<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE id = ?")
			.bind(&id.0)
			.fetch_optional(&self.pool)
			.await?;
		row.map(Node::try_from).transpose()
	}

	async fn get_node_by_enrollment_token(&self, token: &str) -> Result<Option<Node>> {
		let row: Option<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE enrollment_token = ?")
			.bind(token)
			.fetch_optional(&self.pool)
			.await?;
		row.map(Node::try_from).transpose()
	}

	#[instrument(skip(self, token), fields(node_id = %id))]
	async fn set_enrollment_token(
		&self,
		id: &NodeId,
		token: &str,
		expires_at: DateTime<Utc>,
	) -> Result<()> {
		let result = sqlx::query(
			r#"
			UPDATE nodes
			SET enrollment_token = ?, enrollment_expires_at = ?, updated_at = ?
			WHERE id = ? AND status = 'pending'
			"#,
		)
		.bind(token)
		.bind(fmt_ts(expires_at))
		.bind(fmt_ts(Utc::now()))
		.bind(&id.0)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::InvalidData(format!(
				"node {id} is not pending, cannot issue enrollment token"
			)));
		}
		Ok(())
	}

	#[instrument(skip(self, token), fields(node_id = %id))]
	async fn consume_enrollment_token(&self, id: &NodeId, token: &str) -> Result<ConsumeOutcome> {
		let result = sqlx::query(
			r#"
			UPDATE nodes
			SET enrollment_token = NULL,
			    enrollment_expires_at = NULL,
			    status = 'installing',
			    updated_at = ?
			WHERE id = ? AND enrollment_token = ? AND status = 'pending'
			"#,
		)
		.bind(fmt_ts(Utc::now()))
		.bind(&id.0)
		.bind(token)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 1 {
			Ok(ConsumeOutcome::Consumed)
		} else {
			Ok(ConsumeOutcome::Lost)
		}
	}

	#[instrument(skip_all, fields(node_id = %id))]
	async fn record_provisioned(
		&self,
		id: &NodeId,
		external_resource_id: &str,
		encrypted_daemon_secret: &str,
		auth_credential_id: &str,
		info: &NodeInfo,
	) -> Result<()> {
		let result = sqlx::query(
			r#"
			UPDATE nodes
			SET external_resource_id = ?,
			    encrypted_daemon_secret = ?,
			    auth_credential_id = ?,
			    fqdn = ?,
			    public_ip = ?,
			    private_ip = ?,
			    cpu_cores = ?,
			    memory_mb = ?,
			    disk_gb = ?,
			    updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(external_resource_id)
		.bind(encrypted_daemon_secret)
		.bind(auth_credential_id)
		.bind(&info.hostname)
		.bind(&info.public_ip)
		.bind(&info.private_ip)
		.bind(info.cpu_cores as i64)
		.bind(info.memory_mb as i64)
		.bind(info.disk_gb as i64)
		.bind(fmt_ts(Utc::now()))
		.bind(&id.0)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("node {id}")));
		}
		Ok(())
	}

	#[instrument(skip(self, reason), fields(node_id = %id))]
	async fn mark_error(&self, id: &NodeId, reason: &str) -> Result<()> {
		let result = sqlx::query(
			r#"
			UPDATE nodes
			SET status = 'error', last_error = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(reason)
		.bind(fmt_ts(Utc::now()))
		.bind(&id.0)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("node {id}")));
		}
		Ok(())
	}

	#[instrument(skip_all, fields(node_id = %id))]
	async fn record_heartbeat(
		&self,
		id: &NodeId,
		now: DateTime<Utc>,
		agent_version: &str,
		daemon_version: Option<&str>,
	) -> Result<()> {
		// last_heartbeat_at never goes backwards; `error` is terminal and
		// `pending` cannot jump straight to `online`.
		let result = sqlx::query(
			r#"
			UPDATE nodes
			SET last_heartbeat_at = CASE
			        WHEN last_heartbeat_at IS NULL OR last_heartbeat_at < ?1 THEN ?1
			        ELSE last_heartbeat_at
			    END,
			    status = CASE
			        WHEN status IN ('installing', 'online', 'offline') THEN 'online'
			        ELSE status
			    END,
			    agent_version = ?2,
			    daemon_version = COALESCE(?3, daemon_version),
			    updated_at = ?1
			WHERE id = ?4
			"#,
		)
		.bind(fmt_ts(now))
		.bind(agent_version)
		.bind(daemon_version)
		.bind(&id.0)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("node {id}")));
		}
		Ok(())
	}
}
