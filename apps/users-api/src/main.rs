#![recursion_limit = "256"]

use core_config::tracing::{init_tracing, install_color_eyre};
use domain_users::{AuditLogListener, EventBus, UserBackend, UserService, WelcomeNotifier};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod api;
mod config;
mod cors;
mod server;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.environment);

    let hasher = config.hasher.build()?;

    let events = EventBus::new();
    events.attach(Arc::new(AuditLogListener));
    events.attach(Arc::new(WelcomeNotifier));

    let backend = Arc::new(UserBackend::new(config.backend.clone(), events));

    info!(backend = %backend.kind(), "Connecting to database");
    let repository = backend.repository().await?;
    info!(backend = %backend.kind(), "Database ready");

    let service = UserService::new(repository, hasher, config.service.clone());
    if config.cors.is_permissive() {
        warn!("CORS_ALLOWED_ORIGIN not set, allowing any origin");
    }
    let app = api::router(service, Arc::clone(&backend), config.cors.layer());

    info!("Starting users API with graceful shutdown (30s timeout)");

    server::serve(app, &config.server, Duration::from_secs(30), async move {
        info!("Shutting down: closing database connection");
        if let Err(e) = backend.close().await {
            warn!("Failed to close database connection: {}", e);
        }
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Users API shutdown complete");
    Ok(())
}
