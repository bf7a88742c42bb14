// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Append-only metric sample storage.
//!
//! Samples are keyed by `(node_id, sampled_at)` and inserted with
//! `INSERT OR IGNORE`, so a duplicate delivery of the same snapshot after a
//! network retry is a no-op rather than a second row.

use async_trait::async_trait;
use sqlx::SqlitePool;

use talon_common_core::{MetricSample, NodeId};

use crate::error::Result;
use crate::node::{fmt_ts, parse_ts};

#[async_trait]
pub trait MetricStore: Send + Sync {
	async fn append_sample(&self, sample: &MetricSample) -> Result<()>;
	async fn list_samples(&self, node_id: &NodeId, limit: u32) -> Result<Vec<MetricSample>>;
}

/// SQLite implementation of the metric store.
#[derive(Clone)]
pub struct SqliteMetricStore {
	pool: SqlitePool,
}

impl SqliteMetricStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[derive(sqlx::FromRow)]
struct SampleRow {
	node_id: String,
	sampled_at: String,
	cpu_usage_pct: f64,
	memory_usage_pct: f64,
	disk_usage_pct: f64,
	network_rx_bytes: i64,
	network_tx_bytes: i64,
	uptime_seconds: i64,
}

#[async_trait]
impl MetricStore for SqliteMetricStore {
	async fn append_sample(&self, sample: &MetricSample) -> Result<()> {
		sqlx::query(
			r#"
			INSERT OR IGNORE INTO metric_samples (
				node_id, sampled_at, cpu_usage_pct, memory_usage_pct,
				disk_usage_pct, network_rx_bytes, network_tx_bytes, uptime_seconds
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&sample.node_id.0)
		.bind(fmt_ts(sample.sampled_at))
		.bind(sample.cpu_usage_pct)
		.bind(sample.memory_usage_pct)
		.bind(sample.disk_usage_pct)
		.bind(sample.network_rx_bytes as i64)
		.bind(sample.network_tx_bytes as i64)
		.bind(sample.uptime_seconds as i64)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	async fn list_samples(&self, node_id: &NodeId, limit: u32) -> Result<Vec<MetricSample>> {
		let rows: Vec<SampleRow> = sqlx::query_as(
			r#"
			SELECT * FROM metric_samples
			WHERE node_id = ?
			ORDER BY sampled_at DESC
			LIMIT ?
			"#,
		)
		.bind(&node_id.0)
		.bind(limit as i64)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter()
			.map(|row| {
				Ok(MetricSample {
					node_id: NodeId(row.node_id),
					sampled_at: parse_ts(&row.sampled_at)?,
					cpu_usage_pct: row.cpu_usage_pct,
					memory_usage_pct: row.memory_usage_pct,
					disk_usage_pct: row.disk_usage_pct,
					network_rx_bytes: row.network_rx_bytes as u64,
					network_tx_bytes: row.network_tx_bytes as u64,
					uptime_seconds: row.uptime_seconds as u64,
				})
			})
			.collect()
	}
}
