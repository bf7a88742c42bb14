// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! SQLite persistence for the Talon fleet: node records and metric samples.
//!
//! Concurrency-sensitive updates (enrollment token consumption, heartbeat
//! recording) are expressed as single conditional UPDATE statements so their
//! atomicity comes from the database, not from an external lock manager.

pub mod error;
pub mod metrics;
pub mod node;
pub mod pool;
pub mod schema;
pub mod testing;

pub use error::DbError;
pub use metrics::{MetricStore, SqliteMetricStore};
pub use node::{ConsumeOutcome, NodeStore, SqliteNodeStore};
pub use pool::create_pool;
pub use schema::migrate;
