// Creditor Resolver - Web Server
// JSON API over the resolver for the agent workspace

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use creditor_resolver::{
    init_tracing, BatchOutcome, CreditorRecord, CreditorResolver, ResolverConfig, SqliteStore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    resolver: Arc<CreditorResolver>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn failed(data: T, error: &str) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

/// Search response
#[derive(Serialize)]
struct SearchResponse {
    query: String,
    count: usize,
    index_available: bool,
    creditors: Vec<CreditorRecord>,
}

#[derive(Deserialize)]
struct ValidateRequest {
    text: String,
    case_reference: String,
    #[serde(default)]
    report: bool,
}

#[derive(Deserialize)]
struct ReportRequest {
    codes: BTreeSet<String>,
    case_reference: String,
}

#[derive(Serialize)]
struct ReportResponse {
    saved: bool,
    codes: usize,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/creditors/search?q= - Substring search over codes and names
async fn search_creditors(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    if params.q.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::failed(
                SearchResponse {
                    query: params.q,
                    count: 0,
                    index_available: true,
                    creditors: vec![],
                },
                "empty query, no search performed",
            )),
        );
    }

    let outcome = state.resolver.search(&params.q);
    let response = SearchResponse {
        query: outcome.query,
        count: outcome.records.len(),
        index_available: outcome.index_available,
        creditors: outcome.records,
    };

    (StatusCode::OK, Json(ApiResponse::ok(response)))
}

/// POST /api/batches/validate - Exact-match a pasted batch
async fn validate_batch(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Json<ApiResponse<BatchOutcome>> {
    let outcome = if request.report {
        state
            .resolver
            .validate_and_report(&request.text, &request.case_reference)
    } else {
        state.resolver.validate(&request.text, &request.case_reference)
    };

    match outcome.report_saved {
        Some(false) => Json(ApiResponse::failed(outcome, "unresolved codes could not be saved")),
        _ => Json(ApiResponse::ok(outcome)),
    }
}

/// POST /api/misses - Report unresolved codes for curation
async fn report_misses(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> impl IntoResponse {
    match state
        .resolver
        .try_report_misses(&request.codes, &request.case_reference)
    {
        Ok(written) => (
            StatusCode::OK,
            Json(ApiResponse::ok(ReportResponse {
                saved: true,
                codes: written,
            })),
        ),
        Err(e) => {
            tracing::warn!(case_reference = %request.case_reference, error = %e, "miss report not saved");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::failed(
                    ReportResponse {
                        saved: false,
                        codes: 0,
                    },
                    "unresolved codes could not be saved",
                )),
            )
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = ResolverConfig::from_env()?;

    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    tracing::info!(
        database = %config.database_path.display(),
        aliases = store.count_creditors()?,
        "database opened"
    );

    // Create shared state
    let state = AppState {
        resolver: Arc::new(CreditorResolver::with_sqlite(store, &config)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/creditors/search", get(search_creditors))
        .route("/batches/validate", post(validate_batch))
        .route("/misses", post(report_misses))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "creditor server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
