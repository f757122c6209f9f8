use axum::{
    routing::{get, post},
    Router,
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{CorsLayer, Any};
use tracing::{error, info, warn};

use crate::AppState;
use crate::api::models::{CaptureRequest, ClearResponse, ScraperQuery};
use crate::api::response;
use crate::error::Result;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/api/captures",
            post(save_capture_handler)
                .get(list_captures_handler)
                .delete(clear_captures_handler),
        )
        .route("/api/export", post(export_handler))
        .route("/api/scrapers", get(list_scrapers_handler))
        .route("/api/scrapers/:id/run", post(run_scraper_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

/// Runs `operation` as its own task and waits up to the configured timeout.
///
/// A timeout only ends the wait: the task keeps running to completion.
async fn dispatch<T, F>(state: &AppState, name: &'static str, operation: F) -> std::result::Result<T, Response>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let start_time = std::time::Instant::now();
    let handle = tokio::spawn(operation);
    let outcome = tokio::time::timeout(state.config.request_timeout, handle).await;
    let elapsed = start_time.elapsed();

    match outcome {
        Ok(Ok(Ok(value))) => {
            info!(operation = name, ?elapsed, "request completed");
            Ok(value)
        }
        Ok(Ok(Err(err))) => {
            warn!(operation = name, ?elapsed, "request failed: {}", err);
            Err(err.into_response())
        }
        Ok(Err(join_err)) => {
            error!(operation = name, "task aborted: {}", join_err);
            Err(response::error::<()>(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{} aborted unexpectedly", name),
            )
            .into_response())
        }
        Err(_) => {
            warn!(operation = name, ?elapsed, "response timeout; operation continues in background");
            Err(response::timed_out(name).into_response())
        }
    }
}

fn json<T: Serialize>(outcome: std::result::Result<T, Response>) -> Response {
    match outcome {
        Ok(data) => response::success(data).into_response(),
        Err(resp) => resp,
    }
}

pub async fn save_capture_handler(
    State(state): State<AppState>,
    Json(req): Json<CaptureRequest>,
) -> Response {
    info!(url = %req.document.url, mode = ?req.mode, "save capture requested");
    let service = Arc::clone(&state.service);
    json(dispatch(&state, "save_capture", async move {
        service.save_capture(req.mode, req.document).await
    }).await)
}

pub async fn list_captures_handler(State(state): State<AppState>) -> Response {
    let service = Arc::clone(&state.service);
    json(dispatch(&state, "list_captures", async move { service.list_captures().await }).await)
}

pub async fn clear_captures_handler(State(state): State<AppState>) -> Response {
    let service = Arc::clone(&state.service);
    json(dispatch(&state, "clear_captures", async move {
        service.clear_captures().await.map(|_| ClearResponse { cleared: true })
    }).await)
}

pub async fn export_handler(State(state): State<AppState>) -> Response {
    let service = Arc::clone(&state.service);
    match dispatch(&state, "export_archive", async move { service.export_archive().await }).await {
        Ok(archive) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", archive.filename),
                ),
            ],
            archive.bytes,
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_scrapers_handler(
    State(state): State<AppState>,
    Query(query): Query<ScraperQuery>,
) -> impl IntoResponse {
    let scrapers = match query.url.as_deref() {
        Some(url) => state.service.list_matching_scrapers(url),
        None => state.service.list_all_scrapers(),
    };
    response::success(scrapers)
}

pub async fn run_scraper_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CaptureRequest>,
) -> Response {
    info!(scraper = %id, url = %req.document.url, mode = ?req.mode, "scraper run requested");
    let service = Arc::clone(&state.service);
    json(dispatch(&state, "run_scraper", async move {
        service.run_scraper(&id, req.mode, req.document).await
    }).await)
}
