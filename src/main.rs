use anyhow::{Context, Result};
use greenroom::api::{create_router, AppState};
use greenroom::auth::{run_session_cleanup, SessionStore};
use greenroom::config::Config;
use greenroom::credentials::CredentialStore;
use greenroom::spotify::{SpotifyClient, TokenManager};
use std::sync::Arc;
use tracing::info;

/// How often expired sessions are swept from memory.
const SESSION_CLEANUP_INTERVAL_SECONDS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenroom=info".into()),
        )
        .init();

    info!("Spotify backend starting...");

    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);
    info!(
        redirect_uri = %config.redirect_uri,
        database_path = %config.database_path,
        bind_addr = %config.bind_addr,
        "Configuration loaded"
    );

    let store = Arc::new(
        CredentialStore::new(&config.database_path, &config.encryption_key)
            .context("Failed to initialize credential store")?,
    );
    info!("Credential store initialized");

    let sessions = Arc::new(SessionStore::new());
    tokio::spawn(run_session_cleanup(
        Arc::clone(&sessions),
        SESSION_CLEANUP_INTERVAL_SECONDS,
    ));

    let tokens = Arc::new(TokenManager::new(Arc::clone(&store), &config));
    let client = Arc::new(SpotifyClient::new());

    let state = AppState {
        config: Arc::clone(&config),
        store,
        sessions,
        tokens,
        client,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, router)
        .await
        .context("Server error")?;

    Ok(())
}
