use slide_parser_api::{app, AppConfig, AppState, PdfiumRasterizer, S3Storage};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the background task sweeps expired sessions.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slide_parser_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let port = config.port;
    info!(
        "starting slide-parser-api on port {port} (storage configured: {})",
        config.storage.is_configured()
    );

    let storage = Arc::new(S3Storage::new(&config.storage));
    let state = AppState::new(config, storage, Arc::new(PdfiumRasterizer));

    // Unclaimed uploads hold full decks in memory until swept.
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sessions.sweep();
        }
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("failed to bind listen port");
    axum::serve(listener, app(state))
        .await
        .expect("server error");
}
