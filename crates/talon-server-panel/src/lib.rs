// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Orchestration client for the external hosting panel.
//!
//! Wraps the panel's management API (locations, nodes, allocation ranges)
//! behind a retrying HTTP client. Transient failures (network timeout,
//! connection refused, HTTP 5xx) are retried with bounded exponential
//! backoff; HTTP 4xx surfaces immediately as a permanent error. The
//! composite [`PanelClient::provision_node`] call runs under a hard overall
//! deadline, and the daemon credential it obtains is encrypted through the
//! secret vault before it is returned.

pub mod client;
pub mod error;
pub mod types;

pub use client::{PanelClient, PanelConfig};
pub use error::PanelError;
pub use types::{ProvisionOutcome, ProvisionRequest};
