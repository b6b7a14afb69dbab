//! Query server for IP geolocation lookups.
//!
//! Loads a CSV of address ranges, serves lookups over HTTP and optionally
//! reloads the file on a fixed interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cypress_geoip::geoip::{CounterMetrics, GeoIpService, LookupError, MetricsSnapshot, TableStats};
use cypress_geoip::loader::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "IP geolocation query server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CSV file of address ranges (overrides config)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Reload the CSV file every N seconds (overrides config)
    #[arg(long)]
    reload_interval: Option<u64>,
}

/// Application state shared across handlers
struct AppState {
    service: GeoIpService,
    metrics: Arc<CounterMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    let path = args
        .file
        .clone()
        .or_else(|| config.source.path.clone())
        .context("No range file given (use --file or [source].path)")?;
    let listen = args.listen.unwrap_or_else(|| config.server.listen.clone());
    let reload_interval = args.reload_interval.or(config.source.reload_interval_secs);

    info!("Cypress GeoIP Query Server");

    let metrics = Arc::new(CounterMetrics::new());
    let service = GeoIpService::new(config.loader_config()?, metrics.clone());

    let stats = service
        .load_path(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!("Loaded {} segments from {}", stats.segments, path.display());

    let state = Arc::new(AppState { service, metrics });

    if let Some(secs) = reload_interval.filter(|s| *s > 0) {
        info!("Reloading {} every {}s", path.display(), secs);
        tokio::spawn(reload_loop(Arc::clone(&state), path, Duration::from_secs(secs)));
    }

    let app = router(state);

    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/lookup", get(lookup_handler))
        .route("/v1/stats", get(stats_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Rebuild the table from `path` on every tick. Failures keep the old table.
async fn reload_loop(state: Arc<AppState>, path: PathBuf, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; the initial load already happened
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let task_state = Arc::clone(&state);
        let task_path = path.clone();
        let result =
            tokio::task::spawn_blocking(move || task_state.service.load_path(&task_path)).await;

        match result {
            Ok(Ok(stats)) => info!("Reloaded {} segments", stats.segments),
            Ok(Err(e)) => warn!("Reload failed, keeping previous table: {}", e),
            Err(e) => error!("Reload task failed: {}", e),
        }
    }
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let segments = state.service.stats().map(|s| s.segments).unwrap_or(0);

    Json(HealthResponse {
        status: if segments > 0 { "ok" } else { "not_initialized" },
        segments,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    segments: usize,
}

/// Resolve one address
async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Json<LookupResponse>, (StatusCode, String)> {
    let coord = state.service.lookup(&params.ip).map_err(|e| {
        let status = match &e {
            LookupError::InvalidAddressFormat(_) => StatusCode::BAD_REQUEST,
            LookupError::NotFound(_) => StatusCode::NOT_FOUND,
            LookupError::NotInitialized => {
                debug!("Lookup before any table was loaded");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, e.to_string())
    })?;

    Ok(Json(LookupResponse {
        ip: params.ip,
        latitude: coord.latitude,
        longitude: coord.longitude,
    }))
}

/// Table and counter statistics
async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        table: state.service.stats(),
        metrics: state.metrics.snapshot(),
    })
}

#[derive(Deserialize)]
struct LookupParams {
    /// IPv4 address to resolve
    ip: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct LookupResponse {
    ip: String,
    latitude: f32,
    longitude: f32,
}

#[derive(Serialize)]
struct StatsResponse {
    table: Option<TableStats>,
    metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use cypress_geoip::loader::LoaderConfig;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const RANGES: &str = "start,end,latitude,longitude
10.0.0.0,10.255.255.255,-1.0,-1.0
20.0.0.0,20.255.255.255,1.0,1.0
";

    fn state(loaded: bool) -> Arc<AppState> {
        let metrics = Arc::new(CounterMetrics::new());
        let service = GeoIpService::new(LoaderConfig::default(), metrics.clone());
        if loaded {
            service.load_reader(RANGES.as_bytes()).unwrap();
        }
        Arc::new(AppState { service, metrics })
    }

    async fn fetch(state: Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_lookup_found() {
        let (status, body) = fetch(state(true), "/v1/lookup?ip=10.1.1.1").await;
        assert_eq!(status, StatusCode::OK);

        let response: LookupResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            response,
            LookupResponse {
                ip: "10.1.1.1".to_string(),
                latitude: -1.0,
                longitude: -1.0,
            }
        );
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let (status, _) = fetch(state(true), "/v1/lookup?ip=30.1.1.1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = fetch(state(true), "/v1/lookup?ip=test").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = fetch(state(false), "/v1/lookup?ip=10.1.1.1").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let state = state(true);

        let (status, body) = fetch(Arc::clone(&state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["segments"], 2);

        fetch(Arc::clone(&state), "/v1/lookup?ip=20.0.0.1").await;

        let (status, body) = fetch(state, "/v1/stats").await;
        assert_eq!(status, StatusCode::OK);
        let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats["table"]["segments"], 2);
        assert_eq!(stats["metrics"]["lookups_found"], 1);
        assert_eq!(stats["metrics"]["builds"], 1);
    }
}
