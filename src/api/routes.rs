//! Router construction.
//!
//! All routes live under `/api`. Unmatched paths, unsupported methods and
//! panics inside handlers are answered with the same `{"error": ...}` body as
//! every other failure.

use std::any::Any;

use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::error::{ApiError, ApiErrorResponse};
use super::handlers::{
    AppState, create_contact, delete_contact, get_contact, health_check, list_contacts,
    update_contact,
};

/// Builds the application router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/contacts", get(list_contacts).post(create_contact))
        .route(
            "/api/contacts/{id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> ApiErrorResponse {
    ApiErrorResponse::not_found("Not found")
}

async fn method_not_allowed() -> ApiErrorResponse {
    ApiErrorResponse::new(
        StatusCode::METHOD_NOT_ALLOWED,
        ApiError::new("Method not allowed"),
    )
}

/// Request span; `operation` is the matched route, so anything logged while
/// serving the request (including a caught panic) names it.
fn request_span(request: &Request) -> Span {
    let operation = request
        .extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str);

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        operation,
    )
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    tracing::error!(panic = %detail, "Request handler panicked");
    ApiErrorResponse::internal_error("Internal server error").into_response()
}

// =============================================================================
// Tests
// =============================================================================
