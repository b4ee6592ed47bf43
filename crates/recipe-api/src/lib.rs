//! `POST /api/fetch_recipe_meta`: fetch a recipe page and return its title,
//! image and ingredients.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use recipe_core::extract::extract_recipe;
use recipe_core::fetch::{fetch_page, FetchOutcome};
use recipe_core::models::RecipeMeta;
use serde_json::Value;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};
use url::Url;

/// Turns a fetched page into metadata: `(html, final_url, requested_url)`.
pub type ExtractFn = fn(&str, &Url, &str) -> RecipeMeta;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub max_bytes: usize,
    pub extract: ExtractFn,
}

impl AppState {
    pub fn new(http_client: reqwest::Client, max_bytes: usize) -> Self {
        Self {
            http_client,
            max_bytes,
            extract: extract_recipe,
        }
    }
}

/// Only absolute http(s) URLs written as `scheme://host...` are fetched.
pub fn validate_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    let (scheme, rest) = raw.split_once("://")?;
    if !(scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")) {
        return None;
    }
    if rest.starts_with(['/', '?', '#']) || rest.is_empty() {
        return None;
    }
    let url = Url::parse(raw).ok()?;
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    has_host.then_some(url)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// POST /api/fetch_recipe_meta — body `{"url": "..."}`.
pub async fn fetch_recipe_meta(State(state): State<AppState>, body: Bytes) -> Response {
    let Ok(request) = serde_json::from_slice::<Value>(&body) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid JSON");
    };
    let Some(raw_url) = request.get("url").and_then(Value::as_str) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid or missing URL");
    };
    let Some(url) = validate_url(raw_url) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid or missing URL");
    };

    info!(url = %url, "Fetching recipe metadata");

    match fetch_page(&state.http_client, &url, state.max_bytes).await {
        FetchOutcome::Page { html, final_url } => {
            let requested = raw_url.to_string();
            let extract = state.extract;
            let parsed =
                tokio::task::spawn_blocking(move || extract(&html, &final_url, &requested)).await;
            match parsed {
                Ok(meta) => (StatusCode::OK, Json(meta)).into_response(),
                Err(e) => {
                    error!(url = %url, error = %e, "Recipe extraction crashed");
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                }
            }
        }
        FetchOutcome::TimedOut => {
            (StatusCode::REQUEST_TIMEOUT, Json(RecipeMeta::fallback(raw_url))).into_response()
        }
        FetchOutcome::Transport(_) | FetchOutcome::BadStatus(_) | FetchOutcome::NotHtml(_) => {
            (StatusCode::OK, Json(RecipeMeta::fallback(raw_url))).into_response()
        }
    }
}

/// CORS preflight.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /health
pub async fn health() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// API routes with CORS headers; no fallback so it can be merged.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/fetch_recipe_meta",
            post(fetch_recipe_meta).options(preflight),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}

/// Standalone service: API routes plus health check and JSON 404.
pub fn app(state: AppState) -> Router {
    router(state)
        .route("/health", get(health))
        .fallback(not_found)
}
