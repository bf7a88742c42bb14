// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! End-to-end enrollment and heartbeat flow over an in-memory database and a
//! mocked panel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use talon_common_core::{
	FleetError, HeartbeatRequest, Node, NodeId, NodeInfo, NodeStatus, SystemMetrics, TenantId,
};
use talon_server_db::testing::{create_fleet_tables, create_test_pool};
use talon_server_db::{
	ConsumeOutcome, DbError, MetricStore, NodeStore, SqliteMetricStore, SqliteNodeStore,
};
use talon_server_fleet::{CredentialIssuer, EnrollmentGateway, HeartbeatProcessor};
use talon_server_panel::{PanelClient, PanelConfig};
use talon_server_vault::{generate_key, SecretVault};
use talon_common_http::RetryConfig;

struct Fixture {
	nodes: Arc<SqliteNodeStore>,
	metrics: Arc<SqliteMetricStore>,
	gateway: EnrollmentGateway,
	processor: HeartbeatProcessor,
	node_id: NodeId,
	panel_client: Arc<PanelClient>,
	vault: Arc<SecretVault>,
	credentials: Arc<CredentialIssuer>,
}

async fn fixture(panel: &MockServer) -> Fixture {
	let pool = create_test_pool().await;
	create_fleet_tables(&pool).await;

	let nodes = Arc::new(SqliteNodeStore::new(pool.clone()));
	let metrics = Arc::new(SqliteMetricStore::new(pool));

	let vault = Arc::new(SecretVault::new(generate_key().as_ref()).unwrap());
	let encrypted_api_key = vault.encrypt(b"panel-api-key").unwrap();
	let mut panel_config = PanelConfig::new(panel.uri(), encrypted_api_key);
	panel_config.retry = RetryConfig {
		max_attempts: 3,
		base_delay: Duration::from_millis(5),
		jitter: 0.0,
	};
	panel_config.provision_deadline = Duration::from_secs(5);
	let panel_client = Arc::new(PanelClient::new(panel_config, &vault).unwrap());

	let credentials = Arc::new(CredentialIssuer::new(b"test-signing-secret-0123456789ab"));

	let node_id = NodeId("n1".to_string());
	let node = Node::new_pending(node_id.clone(), TenantId("t1".to_string()), "game-01");
	nodes.create_node(&node).await.unwrap();

	let gateway = EnrollmentGateway::new(
		nodes.clone(),
		panel_client.clone(),
		vault.clone(),
		credentials.clone(),
	);
	let processor =
		HeartbeatProcessor::new(nodes.clone(), metrics.clone(), credentials.clone());

	Fixture {
		nodes,
		metrics,
		gateway,
		processor,
		node_id,
		panel_client,
		vault,
		credentials,
	}
}

async fn mount_panel_success(server: &MockServer) {
	Mock::given(method("POST"))
		.and(path("/api/application/locations"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9})))
		.mount(server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/application/nodes"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"id": 17,
			"daemon_token": "wings-secret-token",
			"daemon_config": {"token": "wings-secret-token", "port": 8080}
		})))
		.mount(server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/application/allocations"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 41})))
		.mount(server)
		.await;
}

fn node_info() -> NodeInfo {
	NodeInfo {
		hostname: "game-01.example.com".into(),
		architecture: "x86_64".into(),
		platform: "linux".into(),
		cpu_cores: 8,
		memory_mb: 32768,
		disk_gb: 500,
		public_ip: Some("203.0.113.7".into()),
		private_ip: Some("10.0.0.7".into()),
	}
}

fn heartbeat(cpu: f64) -> HeartbeatRequest {
	HeartbeatRequest {
		agent_version: "0.1.0".into(),
		daemon_version: Some("1.11.0".into()),
		system: SystemMetrics {
			cpu_usage_pct: cpu,
			memory_usage_pct: 40.0,
			disk_usage_pct: 61.2,
			network_rx_bytes: 1024,
			network_tx_bytes: 2048,
			uptime_seconds: 3600,
			sampled_at: Utc::now(),
		},
	}
}

#[tokio::test]
async fn enroll_then_first_heartbeat_brings_node_online() {
	let panel = MockServer::start().await;
	mount_panel_success(&panel).await;
	let fx = fixture(&panel).await;

	let issued = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap();
	assert!(issued.token.len() >= 32);

	let response = fx.gateway.enroll(&issued.token, &node_info()).await.unwrap();
	assert_eq!(response.node_id, fx.node_id);
	assert!(response.daemon_config.is_some());

	// The minted credential resolves back to this node.
	let identity = fx
		.gateway
		.verify_auth_credential(&response.auth_credential)
		.unwrap();
	assert_eq!(identity.node_id, fx.node_id);

	// Token consumed, provisioning done, node installing.
	let node = fx.nodes.get_node(&fx.node_id).await.unwrap().unwrap();
	assert_eq!(node.status, NodeStatus::Installing);
	assert!(node.enrollment_token.is_none());
	assert_eq!(node.external_resource_id.as_deref(), Some("17"));
	let secret = node.encrypted_daemon_secret.unwrap();
	assert_ne!(secret, "wings-secret-token");

	// First heartbeat flips installing → online.
	fx.processor
		.handle(&response.auth_credential, &heartbeat(12.5))
		.await
		.unwrap();
	let node = fx.nodes.get_node(&fx.node_id).await.unwrap().unwrap();
	assert_eq!(node.status, NodeStatus::Online);
	assert!(node.last_heartbeat_at.is_some());

	let samples = fx.metrics.list_samples(&fx.node_id, 10).await.unwrap();
	assert_eq!(samples.len(), 1);
	assert_eq!(samples[0].cpu_usage_pct, 12.5);
}

#[tokio::test]
async fn expired_token_leaves_node_pending() {
	let panel = MockServer::start().await;
	mount_panel_success(&panel).await;
	let fx = fixture(&panel).await;

	// Install a token that expired an hour ago, bypassing the gateway.
	let expired_at = Utc::now() - chrono::Duration::hours(1);
	fx.nodes
		.set_enrollment_token(&fx.node_id, &"a".repeat(64), expired_at)
		.await
		.unwrap();

	let err = fx.gateway.enroll(&"a".repeat(64), &node_info()).await.unwrap_err();
	assert!(matches!(err, FleetError::Expired));

	let node = fx.nodes.get_node(&fx.node_id).await.unwrap().unwrap();
	assert_eq!(node.status, NodeStatus::Pending);
	assert!(node.enrollment_token.is_some());
}

#[tokio::test]
async fn unknown_token_is_not_found() {
	let panel = MockServer::start().await;
	let fx = fixture(&panel).await;

	let err = fx.gateway.enroll(&"f".repeat(64), &node_info()).await.unwrap_err();
	assert!(matches!(err, FleetError::NotFound));
}

#[tokio::test]
async fn malformed_token_is_a_validation_error() {
	let panel = MockServer::start().await;
	let fx = fixture(&panel).await;

	let err = fx.gateway.enroll("short", &node_info()).await.unwrap_err();
	assert!(matches!(err, FleetError::Validation(_)));

	// Anything but the exact hex-encoded length is rejected before lookup.
	let err = fx
		.gateway
		.enroll(&"f".repeat(65), &node_info())
		.await
		.unwrap_err();
	assert!(matches!(err, FleetError::Validation(_)));
}

#[tokio::test]
async fn concurrent_enroll_has_one_winner_and_one_already_consumed() {
	let panel = MockServer::start().await;
	mount_panel_success(&panel).await;
	let fx = fixture(&panel).await;

	let issued = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap();

	let info = node_info();
	let (a, b) = tokio::join!(
		fx.gateway.enroll(&issued.token, &info),
		fx.gateway.enroll(&issued.token, &info),
	);

	let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
	assert_eq!(succeeded, 1);
	let lost = [a, b].into_iter().find(|r| r.is_err()).unwrap().unwrap_err();
	assert!(matches!(lost, FleetError::AlreadyConsumed));
}

#[tokio::test]
async fn replayed_enroll_after_consumption_is_not_found() {
	let panel = MockServer::start().await;
	mount_panel_success(&panel).await;
	let fx = fixture(&panel).await;

	let issued = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap();
	fx.gateway.enroll(&issued.token, &node_info()).await.unwrap();

	// A network-level replay of the same request after the winner committed.
	let err = fx.gateway.enroll(&issued.token, &node_info()).await.unwrap_err();
	assert!(matches!(err, FleetError::NotFound));
}

#[tokio::test]
async fn permanent_panel_failure_marks_node_error() {
	let panel = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/application/locations"))
		.respond_with(ResponseTemplate::new(400).set_body_string("invalid location"))
		.expect(1)
		.mount(&panel)
		.await;
	let fx = fixture(&panel).await;

	let issued = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap();
	let err = fx.gateway.enroll(&issued.token, &node_info()).await.unwrap_err();
	assert!(matches!(err, FleetError::PermanentProvisioning(_)));

	let node = fx.nodes.get_node(&fx.node_id).await.unwrap().unwrap();
	assert_eq!(node.status, NodeStatus::Error);
	assert!(node.last_error.is_some());
}

#[tokio::test]
async fn exhausted_transient_failures_mark_node_error() {
	let panel = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/application/locations"))
		.respond_with(ResponseTemplate::new(503))
		.expect(3)
		.mount(&panel)
		.await;
	let fx = fixture(&panel).await;

	let issued = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap();
	let err = fx.gateway.enroll(&issued.token, &node_info()).await.unwrap_err();
	assert!(matches!(err, FleetError::TransientNetwork(_)));

	let node = fx.nodes.get_node(&fx.node_id).await.unwrap().unwrap();
	assert_eq!(node.status, NodeStatus::Error);
}

#[tokio::test]
async fn heartbeat_replay_with_same_timestamp_is_idempotent() {
	let panel = MockServer::start().await;
	mount_panel_success(&panel).await;
	let fx = fixture(&panel).await;

	let issued = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap();
	let response = fx.gateway.enroll(&issued.token, &node_info()).await.unwrap();

	let beat = heartbeat(12.5);
	fx.processor.handle(&response.auth_credential, &beat).await.unwrap();
	let node_after_first = fx.nodes.get_node(&fx.node_id).await.unwrap().unwrap();

	// Same payload again, as a network retry would deliver it.
	fx.processor.handle(&response.auth_credential, &beat).await.unwrap();
	let node_after_second = fx.nodes.get_node(&fx.node_id).await.unwrap().unwrap();

	assert_eq!(node_after_first.status, node_after_second.status);
	assert_eq!(
		node_after_first.agent_version,
		node_after_second.agent_version
	);
	let samples = fx.metrics.list_samples(&fx.node_id, 10).await.unwrap();
	assert_eq!(samples.len(), 1);
}

#[tokio::test]
async fn heartbeat_with_bad_credential_is_unauthorized() {
	let panel = MockServer::start().await;
	let fx = fixture(&panel).await;

	let err = fx
		.processor
		.handle("garbage-credential", &heartbeat(12.5))
		.await
		.unwrap_err();
	assert!(matches!(err, FleetError::Unauthorized(_)));
}

#[tokio::test]
async fn token_cannot_be_issued_twice_after_consumption() {
	let panel = MockServer::start().await;
	mount_panel_success(&panel).await;
	let fx = fixture(&panel).await;

	let issued = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap();
	fx.gateway.enroll(&issued.token, &node_info()).await.unwrap();

	let err = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap_err();
	assert!(matches!(err, FleetError::Validation(_)));
}

/// Delegates to the real store but fails the provisioning write, standing in
/// for a database fault after the panel side already succeeded.
struct FailingProvisionStore {
	inner: Arc<SqliteNodeStore>,
}

#[async_trait]
impl NodeStore for FailingProvisionStore {
	async fn create_node(&self, node: &Node) -> Result<(), DbError> {
		self.inner.create_node(node).await
	}

	async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, DbError> {
		self.inner.get_node(id).await
	}

	async fn get_node_by_enrollment_token(&self, token: &str) -> Result<Option<Node>, DbError> {
		self.inner.get_node_by_enrollment_token(token).await
	}

	async fn set_enrollment_token(
		&self,
		id: &NodeId,
		token: &str,
		expires_at: DateTime<Utc>,
	) -> Result<(), DbError> {
		self.inner.set_enrollment_token(id, token, expires_at).await
	}

	async fn consume_enrollment_token(
		&self,
		id: &NodeId,
		token: &str,
	) -> Result<ConsumeOutcome, DbError> {
		self.inner.consume_enrollment_token(id, token).await
	}

	async fn record_provisioned(
		&self,
		_id: &NodeId,
		_external_resource_id: &str,
		_encrypted_daemon_secret: &str,
		_auth_credential_id: &str,
		_info: &NodeInfo,
	) -> Result<(), DbError> {
		Err(DbError::Internal("disk full".to_string()))
	}

	async fn mark_error(&self, id: &NodeId, reason: &str) -> Result<(), DbError> {
		self.inner.mark_error(id, reason).await
	}

	async fn record_heartbeat(
		&self,
		id: &NodeId,
		now: DateTime<Utc>,
		agent_version: &str,
		daemon_version: Option<&str>,
	) -> Result<(), DbError> {
		self.inner
			.record_heartbeat(id, now, agent_version, daemon_version)
			.await
	}
}

#[tokio::test]
async fn finalize_failure_after_provisioning_marks_node_error() {
	let panel = MockServer::start().await;
	mount_panel_success(&panel).await;
	let fx = fixture(&panel).await;

	let issued = fx
		.gateway
		.issue_enrollment_token(&fx.node_id)
		.await
		.unwrap();

	let gateway = EnrollmentGateway::new(
		Arc::new(FailingProvisionStore {
			inner: fx.nodes.clone(),
		}),
		fx.panel_client.clone(),
		fx.vault.clone(),
		fx.credentials.clone(),
	);

	let err = gateway.enroll(&issued.token, &node_info()).await.unwrap_err();
	assert!(matches!(err, FleetError::Internal(_)));

	// The panel side succeeded, so the node must not sit in installing.
	let node = fx.nodes.get_node(&fx.node_id).await.unwrap().unwrap();
	assert_eq!(node.status, NodeStatus::Error);
	assert!(node.last_error.is_some());
}
