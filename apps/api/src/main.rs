mod avatar;
mod config;
mod errors;
mod extract;
mod jobs;
mod models;
mod routes;
mod state;
#[cfg(test)]
mod testing;
mod vendors;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderValue;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::avatar::broker::{BrokerSettings, SessionBroker};
use crate::config::Config;
use crate::jobs::catalog::JobCatalog;
use crate::jobs::recommend::ProfileRecommender;
use crate::routes::build_router;
use crate::state::AppState;
use crate::vendors::persona::TavusClient;
use crate::vendors::streaming::LiveKitClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_PKG_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobNova API v{}", env!("CARGO_PKG_VERSION"));

    let catalog = Arc::new(JobCatalog::load(config.jobs_file.as_deref())?);

    // Vendor clients start even without credentials; their endpoints answer 503 until configured.
    let persona = Arc::new(TavusClient::new(&config.tavus)?);
    let streaming = Arc::new(LiveKitClient::new(&config.livekit)?);
    info!(
        "Vendors: persona key {}, streaming {}",
        if config.tavus.api_key.is_some() { "set" } else { "missing" },
        if config.livekit.is_configured() { "configured" } else { "not configured" }
    );

    let callback_url = config
        .public_base_url
        .as_deref()
        .map(|base| format!("{}{}/avatar/webhook", base.trim_end_matches('/'), config.api_prefix));
    let broker = Arc::new(SessionBroker::new(
        persona,
        streaming,
        BrokerSettings {
            callback_url,
            end_session_on_disconnect: config.end_session_on_disconnect,
        },
    ));

    let state = AppState {
        config: config.clone(),
        catalog,
        recommender: Arc::new(ProfileRecommender),
        broker: broker.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr} (API prefix '{}')", config.api_prefix);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, ending active avatar sessions");
    broker.shutdown().await;

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {o:?}");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
