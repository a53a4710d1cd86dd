use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use shopq::api::{create_router, run_state_cleanup, AppState};
use shopq::config::Config;
use shopq::credentials::{CredentialStore, SqliteCredentialStore};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopq=info".into()),
        )
        .init();

    info!("shopq starting...");

    let config_path = std::env::var("SHOPQ_CONFIG").ok();
    let config = Config::load(config_path.as_deref()).context("Invalid configuration")?;

    info!(
        bind_addr = %config.server.bind_addr,
        callback_url = %config.callback_url(),
        database_path = %config.storage.database_path,
        answer_service = %config.answer_service.base_url,
        "Configuration loaded"
    );

    let credential_store: Arc<dyn CredentialStore> = Arc::new(
        SqliteCredentialStore::new(
            &config.storage.database_path,
            config.storage.encryption_key.expose_secret(),
        )
        .context("Failed to initialize credential store")?,
    );
    info!("Credential store initialized");

    let state = AppState::new(&config, credential_store)?;

    tokio::spawn(run_state_cleanup(
        state.state_manager.clone(),
        config.oauth.state_cleanup_interval_seconds,
    ));

    let router = create_router(state, &config.server);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl_c signal");
            }
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    info!("shopq stopped");
    Ok(())
}
