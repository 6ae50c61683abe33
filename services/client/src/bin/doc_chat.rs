//! services/client/src/bin/doc_chat.rs

use client_lib::{
    adapters::{EnvIdentityProvider, HttpBackend},
    config::Config,
    error::ClientError,
    terminal,
};
use doc_chat_core::{Session, SessionConfig};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    // Logs go to stderr so the transcript on stdout stays readable.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Starting client...");

    // --- 2. Initialize Service Adapters ---
    let backend = Arc::new(HttpBackend::new(
        config.backend_url.clone(),
        config.request_timeout,
    )?);
    match backend.check_health().await {
        Ok(()) => info!("Backend at {} is healthy", backend.base_url()),
        Err(e) => warn!("Backend at {} is not reachable yet: {}", backend.base_url(), e),
    }

    let identity = Arc::new(EnvIdentityProvider::new(config.identity.clone()));
    if !identity.has_token() {
        warn!("DOC_CHAT_ID_TOKEN is not set; /login will fail until it is configured");
    }

    // --- 3. Build the Session & Start the Identity Subscription ---
    let session_config = SessionConfig {
        request_timeout: config.request_timeout,
        ..SessionConfig::default()
    };
    let session = Session::new(identity, backend, session_config);
    session.observe_identity().await;

    // --- 4. Run the Terminal Front End ---
    let stdin = BufReader::new(tokio::io::stdin());
    let result = terminal::run(session.clone(), stdin).await;

    // --- 5. Release the Subscription ---
    session.shutdown().await;
    info!("Client stopped.");
    result
}
