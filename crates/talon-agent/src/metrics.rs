// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Host telemetry collection.
//!
//! Reads `/proc` directly on Linux; every parser takes the raw text so
//! the arithmetic is testable without a live system. Non-Linux targets
//! report zeroed metrics, which the server accepts but flags nothing on.

use chrono::Utc;
use talon_common_core::{NodeInfo, SystemMetrics};
use tracing::warn;

/// Collects one telemetry snapshot.
pub fn collect() -> SystemMetrics {
	let (network_rx_bytes, network_tx_bytes) = network_totals();
	SystemMetrics {
		cpu_usage_pct: cpu_usage_pct(),
		memory_usage_pct: memory_usage_pct(),
		disk_usage_pct: disk_usage_pct(),
		network_rx_bytes,
		network_tx_bytes,
		uptime_seconds: uptime_seconds(),
		sampled_at: Utc::now(),
	}
}

/// Gathers the hardware facts reported at enrollment.
pub fn collect_node_info() -> NodeInfo {
	NodeInfo {
		hostname: hostname(),
		architecture: std::env::consts::ARCH.to_string(),
		platform: std::env::consts::OS.to_string(),
		cpu_cores: std::thread::available_parallelism()
			.map(|n| n.get() as u32)
			.unwrap_or(1),
		memory_mb: total_memory_mb(),
		disk_gb: total_disk_gb(),
		public_ip: None,
		private_ip: private_ip(),
	}
}

fn hostname() -> String {
	match std::process::Command::new("hostname").output() {
		Ok(output) if output.status.success() => {
			String::from_utf8_lossy(&output.stdout).trim().to_string()
		}
		_ => "unknown".to_string(),
	}
}

/// Local address the kernel would route external traffic through. No
/// packets are sent; connect on UDP only selects a source address.
fn private_ip() -> Option<String> {
	let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
	socket.connect("8.8.8.8:53").ok()?;
	Some(socket.local_addr().ok()?.ip().to_string())
}

#[cfg(target_os = "linux")]
fn total_memory_mb() -> u64 {
	std::fs::read_to_string("/proc/meminfo")
		.ok()
		.and_then(|content| parse_meminfo_total_kb(&content))
		.map(|kb| kb / 1024)
		.unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn total_memory_mb() -> u64 {
	0
}

fn total_disk_gb() -> u64 {
	match std::process::Command::new("df").args(["-Pk", "/"]).output() {
		Ok(output) if output.status.success() => {
			parse_df_total_kb(&String::from_utf8_lossy(&output.stdout)) / (1024 * 1024)
		}
		_ => 0,
	}
}

#[cfg(target_os = "linux")]
fn cpu_usage_pct() -> f64 {
	let cores = std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(1);
	match std::fs::read_to_string("/proc/loadavg") {
		Ok(content) => parse_loadavg_pct(&content, cores),
		Err(e) => {
			warn!(error = %e, "failed to read /proc/loadavg");
			0.0
		}
	}
}

#[cfg(target_os = "linux")]
fn memory_usage_pct() -> f64 {
	match std::fs::read_to_string("/proc/meminfo") {
		Ok(content) => parse_meminfo_pct(&content),
		Err(e) => {
			warn!(error = %e, "failed to read /proc/meminfo");
			0.0
		}
	}
}

#[cfg(target_os = "linux")]
fn network_totals() -> (u64, u64) {
	match std::fs::read_to_string("/proc/net/dev") {
		Ok(content) => parse_net_dev(&content),
		Err(e) => {
			warn!(error = %e, "failed to read /proc/net/dev");
			(0, 0)
		}
	}
}

#[cfg(target_os = "linux")]
fn uptime_seconds() -> u64 {
	match std::fs::read_to_string("/proc/uptime") {
		Ok(content) => parse_uptime_secs(&content),
		Err(e) => {
			warn!(error = %e, "failed to read /proc/uptime");
			0
		}
	}
}

#[cfg(not(target_os = "linux"))]
fn cpu_usage_pct() -> f64 {
	0.0
}

#[cfg(not(target_os = "linux"))]
fn memory_usage_pct() -> f64 {
	0.0
}

#[cfg(not(target_os = "linux"))]
fn network_totals() -> (u64, u64) {
	(0, 0)
}

#[cfg(not(target_os = "linux"))]
fn uptime_seconds() -> u64 {
	0
}

/// Disk usage of the root filesystem via `df -Pk /`.
fn disk_usage_pct() -> f64 {
	match std::process::Command::new("df").args(["-Pk", "/"]).output() {
		Ok(output) if output.status.success() => {
			parse_df_pct(&String::from_utf8_lossy(&output.stdout))
		}
		Ok(output) => {
			warn!(status = %output.status, "df exited nonzero");
			0.0
		}
		Err(e) => {
			warn!(error = %e, "failed to run df");
			0.0
		}
	}
}

/// One-minute load average scaled by core count, clamped to 100.
fn parse_loadavg_pct(content: &str, cores: usize) -> f64 {
	let load: f64 = match content.split_whitespace().next().and_then(|s| s.parse().ok()) {
		Some(v) => v,
		None => return 0.0,
	};
	let pct = load / cores.max(1) as f64 * 100.0;
	pct.clamp(0.0, 100.0)
}

/// Used memory as (MemTotal - MemAvailable) / MemTotal.
fn parse_meminfo_pct(content: &str) -> f64 {
	let mut total_kb: Option<f64> = None;
	let mut available_kb: Option<f64> = None;

	for line in content.lines() {
		let mut parts = line.split_whitespace();
		match parts.next() {
			Some("MemTotal:") => total_kb = parts.next().and_then(|v| v.parse().ok()),
			Some("MemAvailable:") => available_kb = parts.next().and_then(|v| v.parse().ok()),
			_ => {}
		}
	}

	match (total_kb, available_kb) {
		(Some(total), Some(available)) if total > 0.0 => {
			((total - available) / total * 100.0).clamp(0.0, 100.0)
		}
		_ => 0.0,
	}
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_total_kb(content: &str) -> Option<u64> {
	content.lines().find_map(|line| {
		let mut parts = line.split_whitespace();
		match parts.next() {
			Some("MemTotal:") => parts.next().and_then(|v| v.parse().ok()),
			_ => None,
		}
	})
}

/// Total 1K-blocks from POSIX `df -Pk` output for a single filesystem.
fn parse_df_total_kb(output: &str) -> u64 {
	output
		.lines()
		.nth(1)
		.and_then(|line| {
			line.split_whitespace()
				.nth(1)
				.and_then(|f| f.parse::<u64>().ok())
		})
		.unwrap_or(0)
}

/// Cumulative rx/tx byte totals across all interfaces except loopback.
fn parse_net_dev(content: &str) -> (u64, u64) {
	let mut rx = 0u64;
	let mut tx = 0u64;

	for line in content.lines().skip(2) {
		let Some((iface, rest)) = line.split_once(':') else {
			continue;
		};
		if iface.trim() == "lo" {
			continue;
		}
		let fields: Vec<&str> = rest.split_whitespace().collect();
		// Field 0 is rx bytes, field 8 is tx bytes.
		if let (Some(r), Some(t)) = (
			fields.first().and_then(|v| v.parse::<u64>().ok()),
			fields.get(8).and_then(|v| v.parse::<u64>().ok()),
		) {
			rx = rx.saturating_add(r);
			tx = tx.saturating_add(t);
		}
	}

	(rx, tx)
}

fn parse_uptime_secs(content: &str) -> u64 {
	content
		.split_whitespace()
		.next()
		.and_then(|s| s.parse::<f64>().ok())
		.map(|secs| secs as u64)
		.unwrap_or(0)
}

/// Capacity percentage from POSIX `df -Pk` output for a single filesystem.
fn parse_df_pct(output: &str) -> f64 {
	output
		.lines()
		.nth(1)
		.and_then(|line| {
			line.split_whitespace()
				.find(|f| f.ends_with('%'))
				.and_then(|f| f.trim_end_matches('%').parse::<f64>().ok())
		})
		.map(|pct| pct.clamp(0.0, 100.0))
		.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn loadavg_scales_by_cores() {
		let content = "2.00 1.50 1.00 2/345 6789\n";
		assert_eq!(parse_loadavg_pct(content, 4), 50.0);
		assert_eq!(parse_loadavg_pct(content, 1), 100.0);
	}

	#[test]
	fn loadavg_garbage_is_zero() {
		assert_eq!(parse_loadavg_pct("not a number", 4), 0.0);
		assert_eq!(parse_loadavg_pct("", 4), 0.0);
	}

	#[test]
	fn meminfo_uses_available_not_free() {
		let content = "MemTotal:       16384000 kB\n\
			MemFree:         1000000 kB\n\
			MemAvailable:    8192000 kB\n\
			Buffers:          500000 kB\n";
		assert_eq!(parse_meminfo_pct(content), 50.0);
	}

	#[test]
	fn meminfo_missing_fields_is_zero() {
		assert_eq!(parse_meminfo_pct("MemTotal: 1000 kB\n"), 0.0);
	}

	#[test]
	fn net_dev_sums_interfaces_and_skips_loopback() {
		let content = "Inter-|   Receive                                                |  Transmit\n\
			 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n\
			    lo: 9999999    1000    0    0    0     0          0         0  9999999    1000    0    0    0     0       0          0\n\
			  eth0: 1000     100    0    0    0     0          0         0     2000     200    0    0    0     0       0          0\n\
			  eth1:  500      50    0    0    0     0          0         0      700      70    0    0    0     0       0          0\n";
		assert_eq!(parse_net_dev(content), (1500, 2700));
	}

	#[test]
	fn uptime_takes_first_field() {
		assert_eq!(parse_uptime_secs("3600.25 7200.00\n"), 3600);
	}

	#[test]
	fn df_extracts_capacity_percent() {
		let output = "Filesystem     1024-blocks      Used Available Capacity Mounted on\n\
			/dev/sda1        102400000  61440000  40960000      61% /\n";
		assert_eq!(parse_df_pct(output), 61.0);
	}

	#[test]
	fn df_extracts_total_blocks() {
		let output = "Filesystem     1024-blocks      Used Available Capacity Mounted on\n\
			/dev/sda1        102400000  61440000  40960000      61% /\n";
		assert_eq!(parse_df_total_kb(output), 102400000);
	}

	#[test]
	fn meminfo_total_is_parsed() {
		let content = "MemTotal:       16384000 kB\nMemFree: 1 kB\n";
		assert_eq!(parse_meminfo_total_kb(content), Some(16384000));
	}
}
