//! Storefront API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use storefront_api::config::AppConfig;
use storefront_api::error::AppError;
use storefront_api::state::{AppState, PipelineSettings, Ports};
use storefront_api::{routes, sweeper, telemetry};
use storefront_core::clock::SystemClock;
use storefront_delivery::http_audit_bus::HttpAuditBus;
use storefront_delivery::http_gateway::HttpChannelGateway;
use storefront_store::pg_dead_letter_sink::PgDeadLetterSink;
use storefront_store::pg_event_store::PgEventStore;
use storefront_store::pg_notification_ledger::PgNotificationLedger;
use storefront_store::pg_transaction_store::PgTransactionStore;
use storefront_store::schema::ensure_schema;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Storefront API server");

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    ensure_schema(&pool).await?;

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| AppError::Config(format!("HTTP client: {e}")))?;

    let ports = Ports {
        clock: Arc::new(SystemClock),
        event_store: Arc::new(PgEventStore::new(pool.clone())),
        transaction_store: Arc::new(PgTransactionStore::new(pool.clone())),
        gateway: Arc::new(HttpChannelGateway::new(http.clone(), &config.channel_gateway_url)?),
        audit_bus: Arc::new(HttpAuditBus::new(http, config.audit_bus_url.clone())),
        ledger: Arc::new(PgNotificationLedger::new(pool.clone())),
        dead_letters: Arc::new(PgDeadLetterSink::new(pool)),
    };
    let app_state = AppState::new(
        ports,
        PipelineSettings {
            router: config.router.clone(),
            retry: config.retry.clone(),
            transaction_ttl: config.transaction_ttl,
            ledger_retention: config.ledger_retention,
        },
    );

    if let Some(interval) = config.sweep_interval {
        tracing::info!(interval_secs = interval.as_secs(), "starting expiry sweeper");
        sweeper::spawn(app_state.clone(), interval);
    }

    // TODO: Replace CorsLayer::permissive() with the storefront's origins.
    let app = routes::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    telemetry.shutdown();
    Ok(())
}
