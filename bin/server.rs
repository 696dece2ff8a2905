// Mule Detector - Web Server
// REST API with Axum: upload a CSV, get the ring report back

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use mule_detector::ingest::{read_csv, IngestSummary};
use mule_detector::sample::{sample_transactions, TEMPLATE_CSV};
use mule_detector::{
    DetectionConfig, DetectionReport, DetectionStatistics, Engine, GraphMetrics, Transaction,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Engine plus the report of its last run
struct Session {
    engine: Engine,
    report: Option<DetectionReport>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    api_key: Option<String>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
        .into_response()
    }
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

#[derive(Serialize)]
struct UploadResponse {
    report: DetectionReport,
    ingest_summary: IngestSummary,
    rejected_rows: usize,
}

#[derive(Serialize)]
struct ValidationResponse {
    valid: bool,
    errors: Vec<String>,
}

#[derive(Serialize)]
struct StatsResponse {
    run_id: String,
    graph_metrics: GraphMetrics,
    statistics: DetectionStatistics,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs one complete pipeline on a blocking thread and stores the report
async fn analyze(state: &AppState, transactions: Vec<Transaction>) -> Result<DetectionReport, Response> {
    let session = state.session.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let mut session = session
            .lock()
            .map_err(|_| "engine state is poisoned".to_string())?;
        let outcome = session
            .engine
            .process(&transactions)
            .map_err(|e| e.to_string())?;
        let report = DetectionReport::build(&outcome, &transactions);
        session.report = Some(report.clone());
        Ok::<_, String>(report)
    })
    .await;

    match joined {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(message)) => {
            error!(%message, "detection run failed");
            Err(fail(StatusCode::INTERNAL_SERVER_ERROR, message))
        }
        Err(e) => {
            error!(error = %e, "detection task panicked");
            Err(fail(StatusCode::INTERNAL_SERVER_ERROR, "detection task failed"))
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// POST /api/upload - Analyze an uploaded CSV (multipart field `file`)
async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut payload = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return fail(StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}")),
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            return fail(StatusCode::BAD_REQUEST, "only .csv files are accepted");
        }

        match field.bytes().await {
            Ok(bytes) => payload = Some((file_name, bytes)),
            Err(e) => return fail(StatusCode::BAD_REQUEST, format!("failed to read upload: {e}")),
        }
        break;
    }

    let Some((file_name, bytes)) = payload else {
        return fail(StatusCode::BAD_REQUEST, "missing multipart field 'file'");
    };

    let ingested = match read_csv(bytes.as_ref()) {
        Ok(ingested) => ingested,
        Err(e) => {
            warn!(file = %file_name, error = %e, "upload rejected");
            return fail(StatusCode::BAD_REQUEST, format!("{e:#}"));
        }
    };
    info!(
        file = %file_name,
        transactions = ingested.transactions.len(),
        rejected = ingested.rejected.len(),
        "upload ingested"
    );

    let rejected_rows = ingested.rejected.len();
    let ingest_summary = ingested.summary.clone();
    match analyze(&state, ingested.transactions).await {
        Ok(report) => ApiResponse::ok(UploadResponse {
            report,
            ingest_summary,
            rejected_rows,
        }),
        Err(response) => response,
    }
}

/// GET /api/sample - Analyze the built-in sample dataset
async fn run_sample(State(state): State<AppState>) -> Response {
    match analyze(&state, sample_transactions()).await {
        Ok(report) => ApiResponse::ok(report),
        Err(response) => response,
    }
}

/// GET /api/results - Report of the last run
async fn get_results(State(state): State<AppState>) -> Response {
    let Ok(session) = state.session.lock() else {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "engine state is poisoned");
    };
    match &session.report {
        Some(report) => ApiResponse::ok(report.clone()),
        None => fail(StatusCode::NOT_FOUND, "no results yet, upload a CSV first"),
    }
}

/// GET /api/stats - Graph metrics and detector statistics of the last run
async fn get_stats(State(state): State<AppState>) -> Response {
    let Ok(session) = state.session.lock() else {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "engine state is poisoned");
    };
    match session.engine.last_outcome() {
        Some(outcome) => ApiResponse::ok(StatsResponse {
            run_id: outcome.run_id.clone(),
            graph_metrics: outcome.graph_metrics.clone(),
            statistics: outcome.statistics.clone(),
        }),
        None => fail(StatusCode::NOT_FOUND, "no results yet, upload a CSV first"),
    }
}

/// POST /api/reset - Discard all run state
async fn reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(expected) = &state.api_key {
        let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!("reset refused: bad or missing api key");
            return fail(StatusCode::UNAUTHORIZED, "invalid api key");
        }
    }

    let Ok(mut session) = state.session.lock() else {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "engine state is poisoned");
    };
    session.engine.reset();
    session.report = None;
    info!("engine state reset");
    ApiResponse::ok("reset")
}

/// GET /api/accounts/:account_id - Statistics and centrality of one account
async fn get_account(State(state): State<AppState>, Path(account_id): Path<String>) -> Response {
    let Ok(session) = state.session.lock() else {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "engine state is poisoned");
    };
    let Some(outcome) = session.engine.last_outcome() else {
        return fail(StatusCode::NOT_FOUND, "no results yet, upload a CSV first");
    };
    match outcome.account_summary(&account_id) {
        Some(summary) => ApiResponse::ok(summary.clone()),
        None => fail(StatusCode::NOT_FOUND, format!("unknown account: {account_id}")),
    }
}

/// POST /api/validate - Check a report's JSON shape
async fn validate(Json(body): Json<Value>) -> Response {
    let errors = DetectionReport::validate(&body);
    ApiResponse::ok(ValidationResponse {
        valid: errors.is_empty(),
        errors,
    })
}

/// GET /api/download/json - Last report as a file
async fn download_json(State(state): State<AppState>) -> Response {
    let json = {
        let Ok(session) = state.session.lock() else {
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "engine state is poisoned");
        };
        let Some(report) = &session.report else {
            return fail(StatusCode::NOT_FOUND, "no results yet, upload a CSV first");
        };
        match report.to_json_string() {
            Ok(json) => json,
            Err(e) => return fail(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
        }
    };

    let filename = format!(
        "fraud_detection_{}.json",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    );
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        json,
    )
        .into_response()
}

/// GET /api/download/template - CSV template
async fn download_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"transactions_template.csv\"",
            ),
        ],
        TEMPLATE_CSV,
    )
}

// ============================================================================
// Main Server
// ============================================================================

fn init_logging() {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = match std::env::var("MULE_CONFIG") {
        Ok(path) => DetectionConfig::from_file(&path)?,
        Err(_) => DetectionConfig::default(),
    };

    // Create shared state
    let state = AppState {
        session: Arc::new(Mutex::new(Session {
            engine: Engine::new(config)?,
            report: None,
        })),
        api_key: std::env::var("MULE_API_KEY").ok().filter(|k| !k.is_empty()),
    };
    if state.api_key.is_none() {
        warn!("MULE_API_KEY not set, /api/reset is unauthenticated");
    }

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload))
        .route("/sample", get(run_sample))
        .route("/results", get(get_results))
        .route("/stats", get(get_stats))
        .route("/accounts/:account_id", get(get_account))
        .route("/validate", post(validate))
        .route("/download/json", get(download_json))
        .route("/reset", post(reset))
        .route("/download/template", get(download_template))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::disable()),
        );

    // Start server
    let addr = std::env::var("MULE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {addr}: {e}"))?;

    info!(%addr, "mule-detector server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
