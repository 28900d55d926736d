#![allow(clippy::result_large_err)]

use async_trait::async_trait;
use dotenvy::dotenv;
use envelope_sync::{
    cache::EnvelopeStore,
    config,
    core::{
        Gateway,
        fallback::{FallbackNavigator, Navigator},
        settings::fetch_app_metadata,
    },
    errors::Result,
    guard::{GuardState, NavigationGuard},
    transport::ReqwestTransport,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Headless host: there is no router, so navigation is only reported.
struct LoggingNavigator;

#[async_trait]
impl Navigator for LoggingNavigator {
    async fn replace(&self, path: &str) -> Result<()> {
        warn!("Session reset, navigating to {}", path);
        Ok(())
    }

    async fn hard_reload(&self, path: &str) -> Result<()> {
        warn!("Session reset, reloading {}", path);
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Load .env file (non-fatal, env vars can be set externally)
    dotenv().ok();

    // 2. Load configuration; its log level is the default filter
    let client_config = config::load_client_configuration()?;

    // 3. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&client_config.log_level)),
        )
        .init();
    info!("Using remote service at {}", client_config.base_url);

    // 4. Wire transport, store, fallback and gateway
    let transport = Arc::new(
        ReqwestTransport::new(&client_config)
            .inspect_err(|e| error!("Failed to build HTTP transport: {}", e))?,
    );
    let store = EnvelopeStore::shared();
    let fallback = Arc::new(FallbackNavigator::new(
        Arc::new(LoggingNavigator),
        Arc::clone(&store),
    ));
    let gateway = Gateway::new(transport, Arc::clone(&store), fallback);

    match fetch_app_metadata(&gateway).await {
        Ok(metadata) => info!("Connected to {} {}", metadata.app_name, metadata.app_version),
        Err(e) => warn!("Could not read app metadata: {}", e),
    }

    // 5. Activate each requested route in order
    let guard = NavigationGuard::new(gateway);
    let mut paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        paths.push("/".to_string());
    }

    for path in &paths {
        let activation = guard.navigate(path).await;
        match activation.state() {
            GuardState::Ready => info!("{} ready", activation.route),
            state => error!(
                "{} ended {:?}: {}",
                activation.route,
                state,
                activation
                    .error
                    .as_ref()
                    .map_or_else(|| "no error".to_string(), ToString::to_string)
            ),
        }
    }

    let store = store.read().await;
    info!("{} envelopes cached", store.len());
    for envelope in store.iter() {
        info!(
            "  #{} {}: balance {}, priority {}{}",
            envelope.id(),
            envelope.name(),
            envelope.balance(),
            envelope.priority(),
            if envelope.is_overflow() { " (overflow)" } else { "" }
        );
    }
    if let Some(settings) = store.settings() {
        info!(
            "Automated saving {} with {} per cycle",
            if settings.is_automated_saving_active() { "on" } else { "off" },
            settings.savings_amount()
        );
    }

    Ok(())
}
