// Radiomon Exporter - Tick driver and Prometheus exporter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Radiomon Exporter
//!
//! Drives the Radiomon engine from a simulated radio and exposes its
//! window statistics to Prometheus.
//!
//! ## Usage
//!
//! ```bash
//! # 32 simulated stations, default configuration
//! radiomon-exporter --stations 32
//!
//! # Custom configuration, ten times faster than real time
//! radiomon-exporter --config radiomon.json --speed 10.0 --port 9090
//! ```

mod driver;
mod error;
mod metrics;
mod sim;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::Parser;
use driver::{DriverState, DriverStatus, TickDriver};
use error::ExporterError;
use metrics::encode_metrics;
use radiomon::MonitorConfig;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Radiomon Prometheus Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9101")]
    port: u16,

    /// JSON engine configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Number of simulated stations
    #[arg(long, default_value = "16")]
    stations: u16,

    /// Seed of the simulated counters
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Speed multiplier (1.0 = real-time polling)
    #[arg(short, long, default_value = "1.0")]
    speed: f64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers.
struct AppState {
    driver: Arc<DriverState>,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() -> Result<(), ExporterError> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Radiomon Exporter v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path);
            MonitorConfig::from_file(path)?
        }
        None => MonitorConfig::default(),
    };

    let driver = TickDriver::new(config, args.stations, args.seed, args.speed)?;
    let driver_state = driver.state();
    tokio::spawn(driver.run());

    let state = Arc::new(AppState {
        driver: driver_state,
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::Bind { addr, source })?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Radiomon Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Radiomon Exporter</h1>
    <p>Wireless statistics of a simulated radio, processed by the Radiomon engine.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/ready">/ready</a> - Readiness check</div>
        <div class="endpoint"><a href="/status">/status</a> - Status information (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>radiomon_channel_load_percent</code> - Channel load</li>
        <li><code>radiomon_channel_load_idle_percent</code> - Idle channel share</li>
        <li><code>radiomon_channel_load_others_percent</code> - Foreign channel load</li>
        <li><code>radiomon_client_tx_load_percent</code> / <code>radiomon_client_rx_load_percent</code> - Client load</li>
        <li><code>radiomon_active_clients</code> - Active clients</li>
        <li><code>radiomon_activity_mode</code> - 0=Active, 1=Idle</li>
        <li><code>radiomon_messages_total</code> - Messages by kind</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Ready once the driver has processed its first window.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.driver.running.load(Ordering::SeqCst)
        && state.driver.windows.load(Ordering::SeqCst) > 0
    {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Starting")
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    engine_version: &'static str,
    uptime_secs: u64,
    polls: u64,
    windows: u64,
    #[serde(flatten)]
    engine: DriverStatus,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let engine = state.driver.status.read().await.clone();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine_version: radiomon::VERSION,
        uptime_secs: state.start_time.elapsed().as_secs(),
        polls: state.driver.polls.load(Ordering::SeqCst),
        windows: state.driver.windows.load(Ordering::SeqCst),
        engine,
    })
}
