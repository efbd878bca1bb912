use axum::{
    routing::{get, post},
    Extension, Router,
};
use sea_orm::{Database, DatabaseConnection};
use std::net::SocketAddr;
use std::sync::Arc;
use vitalrelay_server::{api, classifier::ClassifierHandle, classifier::ForestClassifier, ingest::IngestConfig, migrator, notifications::Mailer};

#[tokio::main]
async fn main() {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    vitalrelay_server::telemetry::init_telemetry("vitalrelay-server");

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    // Database Connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Redis Connection (notification intent queue)
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let redis_client = redis::Client::open(redis_url).expect("Invalid Redis URL");

    // Mail relay config is validated up front even though delivery happens in
    // the worker; a missing credential should fail deploys, not alerts.
    Mailer::from_env().expect("mail relay misconfigured");

    // Frozen classifier artifact. A failed load leaves the adapter disabled
    // rather than refusing to start: ingestion keeps working without it.
    let model_path =
        std::env::var("MODEL_PATH").unwrap_or_else(|_| "models/vitals_forest.json".to_string());
    let classifier: ClassifierHandle = Arc::new(ForestClassifier::load(&model_path));

    // Run migrations
    use sea_orm_migration::MigratorTrait;
    migrator::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Initialize Metrics
    vitalrelay_server::metrics::init_metrics(&db).await;

    let ingest_config = IngestConfig::from_env();

    let app = app(
        db,
        redis_client,
        classifier,
        ingest_config,
        prometheus_layer,
        metric_handle,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> &'static str {
    "OK"
}

fn app(
    db: DatabaseConnection,
    redis_client: redis::Client,
    classifier: ClassifierHandle,
    ingest_config: IngestConfig,
    prometheus_layer: axum_prometheus::PrometheusMetricLayer<'static>,
    metric_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/data", post(api::ingest::receive_vitals))
        .route("/api/static", post(api::ingest::receive_static))
        .route("/api/static/ecg/:patient_id", get(api::ecg::get_ecg_data))
        .layer(Extension(db))
        .layer(Extension(redis_client))
        .layer(Extension(classifier))
        .layer(Extension(ingest_config))
        .layer(prometheus_layer)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<axum::body::Body>| {
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched| matched.as_str());

                    let span_name = if let Some(path) = matched_path {
                        format!("{} {}", request.method(), path)
                    } else {
                        format!("{} {}", request.method(), request.uri().path())
                    };

                    tracing::info_span!(
                        "request",
                        "otel.name" = span_name,
                        method = ?request.method(),
                        uri = ?request.uri(),
                    )
                },
            ),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(
                    "http://localhost:5173"
                        .parse::<axum::http::HeaderValue>()
                        .unwrap(),
                )
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_credentials(true),
        )
        .route("/metrics", get(|| async move { metric_handle.render() }))
}
