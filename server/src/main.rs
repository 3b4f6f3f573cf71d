//! Clubhub Server - Main Entry Point
//!
//! Student organization directory backend.

use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;

use clubhub_server::{api, config, db, email::EmailService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubhub_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Clubhub Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    // Initialize mail (optional - invitations are logged instead of sent if not configured)
    let email = if config.has_smtp() {
        match EmailService::new(&config) {
            Ok(service) => match service.test_connection().await {
                Ok(()) => {
                    info!("SMTP connection verified");
                    Some(service)
                }
                Err(e) => {
                    tracing::warn!("SMTP connection test failed: {}. Invitation emails disabled.", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("SMTP setup failed: {}. Invitation emails disabled.", e);
                None
            }
        }
    } else {
        info!("SMTP not configured, invitation emails disabled");
        None
    };

    // Build application state
    let state = api::AppState::new(db_pool, config.clone(), email);

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("Server shutdown complete");

    Ok(())
}
