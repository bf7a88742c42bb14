// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Fleet business logic: enrollment and heartbeats.
//!
//! The enrollment gateway issues one-time tokens, consumes them atomically,
//! drives panel-side provisioning, and mints the long-lived node credential.
//! The heartbeat processor authenticates that credential and records
//! liveness and telemetry. Both share the node store; neither calls the
//! other at request time.

pub mod credential;
pub mod gateway;
pub mod heartbeat;

pub use credential::{CredentialIssuer, IssuedCredential, NodeIdentity};
pub use gateway::{EnrollmentGateway, IssuedEnrollment};
pub use heartbeat::HeartbeatProcessor;
