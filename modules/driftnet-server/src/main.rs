use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use data365_client::Data365Client;
use driftnet_common::Config;
use driftnet_ingest::{IngestSettings, Ingester, KeywordClient};
use driftnet_store::{RawPostWriter, StoreClient};

struct AppState {
    ingester: Arc<Ingester>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("driftnet=info".parse()?))
        .init();

    info!("Driftnet ingester starting...");

    let config = Config::from_env();
    config.log_summary();

    let store = StoreClient::connect(&config.mongo_uri, &config.mongo_db_name).await?;
    let writer = RawPostWriter::new(&store, &config.raw_data_collection);

    let jobs = Data365Client::with_base_url(
        config.data365_base_url.clone(),
        config.data365_api_key.clone(),
    );
    let keywords = KeywordClient::new(config.keyword_manager_url.clone());
    let settings = IngestSettings::from_config(&config);

    let ingester = Arc::new(Ingester::new(
        Arc::new(jobs),
        Arc::new(keywords),
        Arc::new(writer),
        settings,
    ));

    if config.ingestion_interval_minutes > 0 {
        spawn_interval_loop(ingester.clone(), config.ingestion_interval_minutes);
    } else {
        info!("Automatic ingestion disabled (INGESTION_INTERVAL_MINUTES unset or 0)");
    }

    let state = Arc::new(AppState { ingester });

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/trigger-ingestion", post(trigger_ingestion))
        .with_state(state)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Driftnet API listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run one ingestion cycle every `interval_minutes`, forever. The first tick
/// is skipped so startup does not immediately burn provider credits.
fn spawn_interval_loop(ingester: Arc<Ingester>, interval_minutes: u64) {
    info!(interval_minutes, "Starting periodic ingestion loop");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let stats = ingester.run_cycle().await;
            info!(%stats, "Periodic ingestion cycle complete");
        }
    });
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "driftnet",
        "message": "Social media ingester is running",
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Launch one ingestion cycle in the background and return immediately.
async fn trigger_ingestion(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    warn!("Manual ingestion cycle triggered via API");
    let ingester = state.ingester.clone();
    tokio::spawn(async move {
        let stats = ingester.run_cycle().await;
        info!(%stats, "Manual ingestion cycle complete");
    });
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "message": "Ingestion cycle initiated in the background" })),
    )
}
