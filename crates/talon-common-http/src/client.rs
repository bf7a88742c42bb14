// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Creates a new HTTP client with the standard Talon User-Agent header.
///
/// The User-Agent format is: `talon/{platform}/{version}`
/// Example: `talon/linux-x86_64/0.1.0`
pub fn new_client() -> Client {
	builder().build().expect("failed to build HTTP client")
}

/// Creates a new HTTP client builder with the standard Talon User-Agent
/// header.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = talon_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a custom timeout and the standard
/// User-Agent.
pub fn new_client_with_timeout(timeout: Duration) -> Client {
	builder()
		.timeout(timeout)
		.build()
		.expect("failed to build HTTP client")
}

/// Like [`new_client_with_timeout`] but skips TLS certificate verification.
///
/// Only for gateways fronted by a self-signed certificate in lab setups.
pub fn new_insecure_client_with_timeout(timeout: Duration) -> Client {
	builder()
		.timeout(timeout)
		.danger_accept_invalid_certs(true)
		.build()
		.expect("failed to build HTTP client")
}

/// Returns the standard Talon User-Agent string.
///
/// Format: `talon/{platform}/{version}`
pub fn user_agent() -> String {
	format!(
		"talon/{}-{}/{}",
		std::env::consts::OS,
		std::env::consts::ARCH,
		env!("CARGO_PKG_VERSION")
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		assert!(ua.starts_with("talon/"));
		let parts: Vec<&str> = ua.split('/').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "talon");
		assert_eq!(parts[2], env!("CARGO_PKG_VERSION"));
	}

	#[test]
	fn builder_produces_client() {
		let client = builder().build();
		assert!(client.is_ok());
	}
}
