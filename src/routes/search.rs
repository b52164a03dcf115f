use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use std::sync::Arc;

use crate::core::{SearchError, SearchService};
use crate::models::{ErrorResponse, HealthResponse, HistoryQuery, HistoryResponse, SearchRequest, SearchResponse};
use crate::services::{history::log_entry, SearchHistory};

/// Upper bound on past searches returned in one listing
const MAX_HISTORY_LIMIT: usize = 100;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub history: Arc<SearchHistory>,
}

/// Configure all search-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/search", web::post().to(search_candidates))
        .route("/searches", web::get().to(list_searches));
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Search candidates endpoint
///
/// POST /api/v1/search
///
/// Request body:
/// ```json
/// {
///   "requirement": "python developer with machine learning experience",
///   "location": "Berlin",
///   "language": "python",
///   "limit": 10
/// }
/// ```
///
/// If the client disconnects, actix drops this future and the run is
/// abandoned with it.
async fn search_candidates(
    state: web::Data<AppState>,
    req: web::Json<SearchRequest>,
) -> impl Responder {
    let request = req.into_inner();
    let search_id = uuid::Uuid::new_v4();

    tracing::info!("Search {} for requirement: {:?}", search_id, request.requirement);

    let outcome = match state.search.search(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!("Search {} failed: {}", search_id, e);
            return error_response(&e);
        }
    };

    if !outcome.dropped.is_empty() {
        tracing::info!("Search {} dropped candidates: {:?}", search_id, outcome.dropped);
    }

    // Logging is best-effort; a failed append never fails the search
    let entry = log_entry(search_id, &request, &outcome.candidates);
    if let Err(e) = state.history.append(&entry).await {
        tracing::warn!("Failed to record search {}: {}", search_id, e);
    }

    HttpResponse::Ok().json(SearchResponse {
        search_id,
        total_candidates: outcome.total_candidates,
        dropped_candidates: outcome.dropped,
        candidates: outcome.candidates,
    })
}

/// Past searches, newest first
///
/// GET /api/v1/searches?limit={n}
async fn list_searches(
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> impl Responder {
    let limit = query.limit.clamp(1, MAX_HISTORY_LIMIT);

    match state.history.recent(limit).await {
        Ok(searches) => HttpResponse::Ok().json(HistoryResponse { searches }),
        Err(e) => {
            tracing::error!("Failed to read search history: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to read search history".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

/// Status code and error label for a failed run
pub fn error_status(err: &SearchError) -> (StatusCode, &'static str) {
    match err {
        SearchError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        SearchError::Authentication(_) => (StatusCode::BAD_GATEWAY, "authentication_failed"),
        SearchError::RateLimitExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded"),
        SearchError::Cancelled => (StatusCode::GATEWAY_TIMEOUT, "search_cancelled"),
        SearchError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "search_failed"),
    }
}

fn error_response(err: &SearchError) -> HttpResponse {
    let (status, label) = error_status(err);
    let mut builder = HttpResponse::build(status);
    if let SearchError::RateLimitExceeded { retry_after: Some(secs) } = err {
        builder.insert_header(("Retry-After", secs.to_string()));
    }
    builder.json(ErrorResponse {
        error: label.to_string(),
        message: err.to_string(),
        status_code: status.as_u16(),
    })
}
