//! SOS Calma - guided 5-4-3-2-1 grounding over a hosted chat model
//!
//! Serves a single page and a small API. Each browser session owns its own
//! transcript; every user turn is forwarded, with the full history and the
//! grounding instructions, to Gemini, and the reply is revealed slowly.

mod api;
mod config;
mod driver;
mod grounding;
mod llm;
mod locale;
mod reveal;
mod runtime;
mod session;
mod system_prompt;

use api::{create_router, AppState};
use config::AppConfig;
use listenfd::ListenFd;
use llm::GeminiConnector;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sos_calma=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env();
    let port = config.port;
    let session_ttl = config.session_ttl;

    if config.has_server_key() {
        tracing::info!(model = %config.model, "Using server-side API key");
    } else {
        tracing::warn!(
            model = %config.model,
            "GOOGLE_API_KEY not set; the page will ask each user for a key"
        );
    }

    let connector = Arc::new(GeminiConnector::new(
        &config.model,
        &config.base_url,
        config.request_timeout,
    )?);

    // Create application state
    let state = AppState::new(config, connector);
    let _idle_sweep = Arc::clone(&state.sessions).spawn_idle_sweep(session_ttl);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The default predicate already leaves text/event-stream alone
    let compression = CompressionLayer::new().gzip(true).br(true);

    let app = create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(compression),
    );

    // Start server, reusing a socket passed in by systemfd/systemd if any
    let listener = match ListenFd::from_env().take_tcp_listener(0)? {
        Some(std_listener) => {
            std_listener.set_nonblocking(true)?;
            tracing::info!(addr = ?std_listener.local_addr()?, "Using inherited listener");
            tokio::net::TcpListener::from_std(std_listener)?
        }
        None => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            tokio::net::TcpListener::bind(addr).await?
        }
    };
    tracing::info!("SOS Calma listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
