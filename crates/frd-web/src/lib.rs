//! Axum JSON API for FRD.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path as AxumPath, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use frd_core::{number_text, reviews_for_listing, ListingReviews};
use frd_pipeline::{PipelineConfig, ReviewPipeline, ReviewQuery};
use frd_storage::{ApprovalError, ApprovalStore};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const CRATE_NAME: &str = "frd-web";

const BANNER: &str = "FlexLiving Reviews API • Try /healthz and /api/reviews/hostaway";

pub struct AppState {
    pub pipeline: ReviewPipeline,
    pub approvals: ApprovalStore,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(pipeline: ReviewPipeline, approvals: ApprovalStore, allowed_origins: Vec<String>) -> Self {
        Self {
            pipeline,
            approvals,
            allowed_origins,
        }
    }
}

/// Every failure leaves as `{status: "error", message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({"status": "error", "message": message}))).into_response()
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);
    Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(healthz_handler))
        .route("/api/reviews/hostaway", get(reviews_handler))
        .route("/api/approvals", get(approvals_handler).post(approve_handler))
        .route("/api/listings/{slug}/reviews", get(listing_reviews_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Exact-match origin allow list; `*` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let allowed = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect::<Vec<_>>();
    base.allow_origin(AllowOrigin::list(allowed))
}

pub async fn serve(config: PipelineConfig) -> anyhow::Result<()> {
    info!(
        account_id = config.hostaway_account_id.as_deref().unwrap_or("-"),
        api_key_present = config.hostaway_api_key.is_some(),
        force_mock = config.force_mock,
        "review source configuration"
    );

    let pipeline = ReviewPipeline::from_config(&config)?;
    pipeline
        .selector()
        .probe_fallback()
        .await
        .context("fallback review dataset is required at startup")?;

    let approvals = ApprovalStore::new(config.resolved_approvals_path());
    approvals
        .ensure_initialized()
        .await
        .context("initializing approvals store")?;

    let state = AppState::new(pipeline, approvals, config.allowed_origins.clone());
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("reviews API listening on http://localhost:{}", config.port);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(PipelineConfig::from_env()).await
}

async fn root_handler() -> &'static str {
    BANNER
}

async fn healthz_handler() -> Json<JsonValue> {
    Json(json!({"status": "ok"}))
}

async fn reviews_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewQuery>,
) -> Result<Response, ApiError> {
    match state.pipeline.run(&query).await {
        Ok(report) => Ok(Json(report).into_response()),
        Err(err) => {
            error!(error = %format!("{err:#}"), "reviews request failed");
            Err(ApiError::Internal(err.to_string()))
        }
    }
}

async fn approvals_handler(State(state): State<Arc<AppState>>) -> Json<JsonValue> {
    let approvals = state.approvals.read().await;
    Json(json!({"status": "ok", "approvals": approvals}))
}

async fn approve_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Json<JsonValue>, ApiError> {
    let body = match payload {
        Ok(Json(body)) => body,
        // a body that is not declared as JSON reads as empty
        Err(JsonRejection::MissingJsonContentType(_)) => JsonValue::Null,
        Err(rejection) => return Err(ApiError::BadRequest(rejection.body_text())),
    };
    let Some(review_id) = body.get("reviewId").and_then(review_id_text) else {
        return Err(ApiError::BadRequest("Missing reviewId".to_string()));
    };
    let approved = body.get("approved").map(is_truthy).unwrap_or(false);

    match state.approvals.write(&review_id, approved).await {
        Ok(approvals) => Ok(Json(json!({"status": "ok", "approvals": approvals}))),
        Err(ApprovalError::MissingReviewId) => Err(ApiError::BadRequest("Missing reviewId".to_string())),
        Err(err) => {
            error!(error = %err, review_id = %review_id, "failed to persist approval");
            Err(ApiError::Internal("Failed to save approval".to_string()))
        }
    }
}

#[derive(Debug, Serialize)]
struct ListingReviewsResponse {
    status: &'static str,
    #[serde(flatten)]
    listing: ListingReviews,
}

async fn listing_reviews_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(slug): AxumPath<String>,
) -> Result<Json<ListingReviewsResponse>, ApiError> {
    let report = state
        .pipeline
        .run(&ReviewQuery::default())
        .await
        .map_err(|err| {
            error!(error = %format!("{err:#}"), slug = %slug, "listing reviews request failed");
            ApiError::Internal(err.to_string())
        })?;
    let approvals = state.approvals.read().await;
    Ok(Json(ListingReviewsResponse {
        status: "ok",
        listing: reviews_for_listing(&report.items, &approvals, &slug),
    }))
}

/// Review ids arrive as strings or numbers; empty and zero count as missing.
fn review_id_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) if n.as_f64() != Some(0.0) => Some(number_text(n)),
        _ => None,
    }
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}
