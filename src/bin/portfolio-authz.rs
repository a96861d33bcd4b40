// ABOUTME: Server binary for the portfolio-authz OAuth 2.1 authorization server
// ABOUTME: Loads environment configuration, opens storage, and serves the axum router until ctrl-c
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Portfolio Authz Server Binary
//!
//! Starts the authorization server with discovery, registration, authorize,
//! token, and bearer-protected API routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use portfolio_authz::config::{DatabaseUrl, ServerConfig};
use portfolio_authz::database_plugins::factory::Database;
use portfolio_authz::lifecycle::spawn_purge_task;
use portfolio_authz::logging;
use portfolio_authz::resources::ServerResources;
use portfolio_authz::routes::build_router;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "portfolio-authz")]
#[command(about = "Embedded OAuth 2.1 authorization server for MCP clients")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override `DATABASE_URL`
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(url) = args.database_url.as_deref() {
        config.database = DatabaseUrl::parse_url(url)?;
    }

    logging::init_from_env()?;
    info!("Starting portfolio-authz");
    info!("{}", config.summary());

    let database = Database::from_url(&config.database).await?;
    let purge_interval = config.oauth2_server.purge_interval_secs;
    let bind_addr = format!("{}:{}", config.host, config.http_port);

    let resources = Arc::new(ServerResources::new(database, config)?);
    display_available_endpoints(&resources);

    let purge_task = (purge_interval > 0 && resources.oauth2_server.is_some()).then(|| {
        spawn_purge_task(resources.oauth2_store(), Duration::from_secs(purge_interval))
    });

    let app = build_router(Arc::clone(&resources));
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("Listening on http://{bind_addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    if let Some(task) = purge_task {
        task.shutdown().await;
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn display_available_endpoints(resources: &ServerResources) {
    let Some(server) = resources.oauth2_server.as_ref() else {
        info!("OAuth2 endpoints disabled; serving /health only");
        return;
    };
    let issuer = server.issuer();
    info!("=== Available Endpoints ===");
    info!("   Discovery:     GET  {issuer}/.well-known/oauth-authorization-server");
    info!("   Resource:      GET  {issuer}/.well-known/oauth-protected-resource");
    info!("   Registration:  POST {issuer}/oauth/register");
    info!("   Authorization: GET  {issuer}/oauth/authorize");
    info!("   Token:         POST {issuer}/oauth/token");
    info!("   Identity:      GET  {issuer}/api/me");
}
