// CropWatch API v0.1
use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::farms::AppState;
use routes::health::HealthState;
use services::analysis::FarmAnalyzer;
use services::monitoring::{MonitoringState, SharedMonitoringState};
use services::notifier::SmtpNotifier;
use services::raster::RasterClient;
use services::registry::PgFarmRegistry;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// CropWatch API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CropWatch API",
        version = "0.1.0",
        description = "Satellite-driven farm monitoring. Registers farm boundary polygons, \
            aggregates 30 days of precipitation, radar backscatter and optical vegetation \
            indices over each polygon, evaluates agronomic alert rules and e-mails a daily \
            report to the farm owner.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Farms", description = "Farm registration, status and analysis history"),
        (name = "Monitoring", description = "Batch analysis of all active farms"),
    ),
    paths(
        routes::health::health_check,
        routes::farms::register_farm,
        routes::farms::list_farms,
        routes::farms::update_farm_status,
        routes::farms::get_farm_history,
        routes::monitoring::run_monitoring_batch,
        routes::monitoring::get_monitoring_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::farms::RegisterFarmRequest,
            routes::farms::RegisterFarmResponse,
            routes::farms::FarmResponse,
            routes::farms::UpdateStatusRequest,
            routes::farms::HistoryEntryResponse,
            db::models::FarmStatus,
            services::analysis::FarmAnalysisReport,
            services::analysis::BatchReport,
            services::analysis::RunStatus,
            services::analysis::StageStatus,
            services::analysis::SourceStatus,
            services::collectors::CollectorStatus,
            services::metrics::MetricsRecord,
            services::prescription::Prescription,
            services::prescription::PrescriptionCategory,
            services::prescription::Severity,
            services::monitoring::MonitoringState,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cropwatch_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Long-lived clients, built once and shared
    let raster = RasterClient::new(
        &config.raster_api_url,
        config.raster_api_token.clone(),
        config.source_timeout_secs,
    )
    .expect("Failed to build raster client");
    let notifier = SmtpNotifier::new(&config.smtp).expect("Invalid SMTP configuration");
    let registry = PgFarmRegistry::new(pool.clone());

    let analyzer = Arc::new(FarmAnalyzer::new(
        Arc::new(raster),
        services::collectors::default_collectors(),
        Arc::new(notifier),
        Arc::new(registry),
        config.source_timeout_secs,
        config.batch_concurrency,
    ));

    let monitoring: SharedMonitoringState = Arc::new(RwLock::new(MonitoringState::default()));
    let health_state = HealthState {
        pool,
        monitoring: Arc::clone(&monitoring),
    };
    let app_state = AppState {
        analyzer,
        monitoring,
    };

    tracing::info!(
        "Raster source at {}, batch concurrency {}, source timeout {}s",
        config.raster_api_url,
        config.batch_concurrency,
        config.source_timeout_secs
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
        ])
        .allow_headers(Any);

    let farm_routes = Router::new()
        .route(
            "/api/v1/farms",
            post(routes::farms::register_farm).get(routes::farms::list_farms),
        )
        .route(
            "/api/v1/farms/:id/status",
            patch(routes::farms::update_farm_status),
        )
        .route(
            "/api/v1/farms/:id/history",
            get(routes::farms::get_farm_history),
        )
        .route(
            "/api/v1/monitoring/run",
            post(routes::monitoring::run_monitoring_batch),
        )
        .route(
            "/api/v1/monitoring/status",
            get(routes::monitoring::get_monitoring_status),
        )
        .with_state(app_state);

    // Health check pings the pool and reads the monitoring status
    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(health_state);

    let app = Router::new()
        .merge(health_routes)
        .merge(farm_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
