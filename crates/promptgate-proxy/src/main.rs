//! PromptGate gateway binary.

use promptgate_core::GatewayConfig;
use promptgate_detectors::Scanner;
use promptgate_proxy::{build_router, AppState, Forwarder};
use promptgate_storage::SqliteIncidentStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = resolve_config()?;
    init_tracing(&config);

    info!(
        environment = %config.environment,
        listen_addr = %config.listen_addr,
        risk_threshold = config.risk_threshold,
        "Starting PromptGate"
    );

    let state = build_app_state(config).await?;
    let listen_addr = state.config.listen_addr.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(%listen_addr, "Gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Resolve configuration: an explicit path from the first CLI argument or
/// the `PROMPTGATE_CONFIG` variable, otherwise built-in defaults. Env
/// overrides apply in all cases.
fn resolve_config() -> anyhow::Result<GatewayConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PROMPTGATE_CONFIG").ok());

    let mut config = match path {
        Some(p) => promptgate_proxy::config::load_config(Path::new(&p))?,
        None => GatewayConfig::default(),
    };
    promptgate_proxy::config::apply_env_overrides(&mut config);
    Ok(config)
}

fn init_tracing(config: &GatewayConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wire up the scanner, incident store, and outbound client.
async fn build_app_state(config: GatewayConfig) -> anyhow::Result<Arc<AppState>> {
    let scanner =
        Scanner::with_default_detectors(Path::new(&config.rules_path), config.risk_threshold)?;
    info!(
        detector_count = scanner.detector_count(),
        "Scanner initialized"
    );

    let incidents = SqliteIncidentStore::new(&config.database_url).await?;
    let forwarder = Forwarder::new(config.connection_timeout_ms)?;

    Ok(Arc::new(AppState {
        config,
        scanner,
        incidents: Arc::new(incidents),
        forwarder,
    }))
}
