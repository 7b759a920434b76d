//! Notification Service - Main Application Entry Point
//!
//! This is a multi-tenant notification dispatch service. Tenants queue
//! notifications over an authenticated HTTP API; a background dispatch
//! engine fans each notification out across its requested channels (email,
//! SMS, push, webhook), enforces unsubscribe policy, renders templated
//! payloads, and records per-channel delivery outcomes.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Cache**: Redis mirror of recent delivery results (best-effort)
//! - **Authentication**: API key with SHA-256 hashing, prefix-indexed lookup
//! - **Dispatch**: fixed worker pool draining a bounded job queue
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool and run migrations
//! 3. Connect the delivery-result cache (optional)
//! 4. Build transport drivers and start the dispatch engine
//! 5. Build HTTP router with routes and middleware
//! 6. Serve until SIGINT, then drain the dispatch engine gracefully

mod cache;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::services::{dispatcher::Dispatcher, transports::Transports};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment
    // variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration; missing DATABASE_URL fails fast here
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Best-effort delivery-result mirror; runs disabled without REDIS_URL
    let cache = cache::Cache::connect(config.redis_url.as_deref()).await;

    // Transport drivers: real providers where configured, simulated otherwise
    let transports = Transports::from_config(&config)?;

    // Start the dispatch engine: worker pool + polling loop
    let dispatcher = Dispatcher::start(pool.clone(), cache, transports, &config);

    // Drain anything already due before the first interval elapses
    if let Err(e) = dispatcher.tick().await {
        tracing::error!("Initial dispatch tick failed: {}", e);
    }

    // Tenant-facing routes behind API-key authentication
    let authenticated_routes = Router::new()
        .route(
            "/api/v1/{tenant}/notifications/send",
            post(handlers::notifications::send_notifications),
        )
        .route(
            "/api/v1/{tenant}/notifications/{id}",
            get(handlers::notifications::get_notification),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            pool.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // Provider callbacks authenticate out-of-band, not with tenant keys
        .route(
            "/api/v1/webhooks/unsubscribe",
            post(handlers::webhooks::unsubscribe),
        )
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share database pool with all handlers via State extraction
        .with_state(pool);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Serve until SIGINT; the dispatch engine keeps polling in the background
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain in-flight dispatch work before exiting
    dispatcher.shutdown().await;

    Ok(())
}

/// Resolve when the process receives SIGINT (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
