// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Talon fleet gateway server binary.

use clap::{Parser, Subcommand};
use talon_server::{create_app_state, create_router};
use tracing_subscriber::EnvFilter;

/// Talon server - control plane for the game hosting fleet.
#[derive(Parser, Debug)]
#[command(name = "talon-server", about = "Talon fleet gateway server", version)]
struct Args {
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
	/// Generate a fresh vault master key and print it as hex
	GenerateKey,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	match args.command {
		Some(Command::Version) => {
			println!("talon-server {}", env!("CARGO_PKG_VERSION"));
			return Ok(());
		}
		Some(Command::GenerateKey) => {
			let key = talon_server_vault::generate_key();
			println!("{}", hex::encode(key.as_ref()));
			return Ok(());
		}
		None => {}
	}

	dotenvy::dotenv().ok();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let config = talon_server::load_config()?;

	tracing::info!(
		host = %config.host,
		port = config.port,
		database = %config.database_url,
		panel = %config.panel_base_url,
		"starting talon-server"
	);

	let pool = talon_server_db::create_pool(&config.database_url).await?;
	talon_server_db::migrate(&pool).await?;

	let state = create_app_state(pool, &config)?;
	let router = create_router(state);

	let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
	tracing::info!(addr = %listener.local_addr()?, "listening");

	axum::serve(listener, router)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("shutdown complete");
	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "failed to install shutdown handler");
	}
	tracing::info!("shutdown signal received");
}
