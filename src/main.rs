//! Application entry point for the `fire-gateway` service.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Validating the gas calibration range and loading the classifier artifact
//!   (either failing aborts start-up)
//! - Creating the `sensor_logs` table if it does not exist
//! - Serving `/health` and running the MQTT ingestion loop until Ctrl-C
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `MODEL_PATH` (optional) – classifier artifact (default: `models/fire_model.json`)
//! - `GATEWAY_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `GATEWAY_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See [`fire_gateway::config`] for the full list.
use std::{env, io::IsTerminal, sync::Arc};

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use fire_gateway::{config, routes, schema};
use fire_gateway::{Ingestor, MqttSource, PgSink, RandomForest, RiskPolicy};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let gas_range = cfg.gas_calibration()?;

    tracing::info!("Loading classifier artifact from {}", cfg.model_path);
    let classifier = RandomForest::load(&cfg.model_path)
        .map_err(|e| anyhow!("Failed to load classifier '{}': {}", cfg.model_path, e))?;

    if cfg.db_init_schema {
        // The database may come up later; writes fail per record until it does.
        match schema::create_schema(&cfg.db_url).await {
            Ok(()) => tracing::info!("sensor_logs schema ready"),
            Err(e) => tracing::warn!("Could not verify sensor_logs schema: {}", e),
        }
    }

    let ingestor = Ingestor::new(
        gas_range,
        Arc::new(classifier),
        RiskPolicy::new(cfg.risk_warning_threshold),
        PgSink::new(cfg.db_url.clone()),
    )
    .with_write_timeout(cfg.db_write_timeout);

    let app = routes::router(ingestor.stats());
    let listener = tokio::net::TcpListener::bind(cfg.health_addr).await?;
    tracing::info!("Health endpoint listening on {}", cfg.health_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Health endpoint stopped: {}", e);
        }
    });

    let mut source = MqttSource::with_buffer(
        &cfg.mqtt_broker_uri,
        &cfg.mqtt_client_id,
        &cfg.mqtt_topic,
        cfg.mqtt_reconnect_delay,
        cfg.mqtt_buffer,
    )?;

    tokio::select! {
        _ = ingestor.run(&mut source) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
    }

    source.disconnect().await;
    tracing::info!("Gateway stopped");
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `GATEWAY_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `GATEWAY_LOG_LEVEL` env var
///
/// Call once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("GATEWAY_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to GATEWAY_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("GATEWAY_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,paho_mqtt=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
