// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared fleet types for Talon.
//!
//! This crate defines the node data model, the agent wire protocol, and the
//! error taxonomy shared by the server components and the edge agent. It has
//! no I/O of its own.

pub mod error;
pub mod node;
pub mod wire;

pub use error::{FleetError, FleetResult};
pub use node::{MetricSample, Node, NodeId, NodeStatus, TenantId};
pub use wire::{
	EnrollRequest, EnrollResponse, HeartbeatRequest, HeartbeatResponse, NodeInfo, SystemMetrics,
};
