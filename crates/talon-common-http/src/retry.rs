// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Classifies an error as retryable or permanent.
///
/// Only transient failures (network timeout, connection refused, HTTP 5xx)
/// should report `true`; client errors are surfaced immediately.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

/// Retry policy: bounded attempts with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total number of attempts, including the first.
	pub max_attempts: u32,
	/// Delay before the second attempt; doubles each retry.
	pub base_delay: Duration,
	/// Maximum fraction of the delay added as random jitter (0.0 disables).
	pub jitter: f64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_secs(1),
			jitter: 0.1,
		}
	}
}

impl RetryConfig {
	/// Backoff delay after the given 1-based failed attempt: `base * 2^(n-1)`
	/// plus jitter.
	fn delay_after(&self, attempt: u32) -> Duration {
		let exp = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
		let jitter = exp.mul_f64(self.jitter * fastrand::f64());
		exp + jitter
	}
}

/// Runs `op` until it succeeds, fails permanently, or attempts run out.
///
/// The last error is returned when the budget is exhausted. The operation
/// label only feeds log output.
pub async fn retry<T, E, F, Fut>(label: &str, config: &RetryConfig, mut op: F) -> Result<T, E>
where
	E: RetryableError + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut attempt = 1;
	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(err) if err.is_retryable() && attempt < config.max_attempts => {
				let delay = config.delay_after(attempt);
				warn!(
					operation = label,
					attempt,
					max_attempts = config.max_attempts,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"transient failure, will retry"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(err) => return Err(err),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Debug)]
	struct TestError {
		retryable: bool,
	}

	impl std::fmt::Display for TestError {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "test error (retryable: {})", self.retryable)
		}
	}

	impl RetryableError for TestError {
		fn is_retryable(&self) -> bool {
			self.retryable
		}
	}

	fn fast_config() -> RetryConfig {
		RetryConfig {
			max_attempts: 3,
			base_delay: Duration::from_millis(1),
			jitter: 0.0,
		}
	}

	#[tokio::test]
	async fn succeeds_without_retry() {
		let calls = AtomicU32::new(0);
		let result: Result<u32, TestError> = retry("op", &fast_config(), || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Ok(7) }
		})
		.await;
		assert_eq!(result.unwrap(), 7);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn retries_transient_until_budget_exhausted() {
		let calls = AtomicU32::new(0);
		let result: Result<u32, TestError> = retry("op", &fast_config(), || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err(TestError { retryable: true }) }
		})
		.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn permanent_error_is_not_retried() {
		let calls = AtomicU32::new(0);
		let result: Result<u32, TestError> = retry("op", &fast_config(), || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err(TestError { retryable: false }) }
		})
		.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn recovers_after_transient_failures() {
		let calls = AtomicU32::new(0);
		let result: Result<u32, TestError> = retry("op", &fast_config(), || {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			async move {
				if n < 2 {
					Err(TestError { retryable: true })
				} else {
					Ok(42)
				}
			}
		})
		.await;
		assert_eq!(result.unwrap(), 42);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn backoff_doubles_per_attempt() {
		let config = RetryConfig {
			max_attempts: 4,
			base_delay: Duration::from_secs(1),
			jitter: 0.0,
		};
		assert_eq!(config.delay_after(1), Duration::from_secs(1));
		assert_eq!(config.delay_after(2), Duration::from_secs(2));
		assert_eq!(config.delay_after(3), Duration::from_secs(4));
	}
}
