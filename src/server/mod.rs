//! HTTP surface of the console.
//!
//! Routes are thin: they parse query strings and bodies, call into [`crate::console`],
//! and translate failures into `{ "error": ... }` responses. Query errors answer 400,
//! everything else 500 with a generic message; the underlying error is only logged.

mod documents;
mod users;

#[cfg(test)]
mod tests;

use crate::console::{ConnectionManager, ConsoleError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    /// Page size for listings that do not name one.
    pub default_limit: u32,
}

impl AppState {
    pub fn new(manager: Arc<ConnectionManager>, default_limit: u32) -> Self {
        Self {
            manager,
            default_limit,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/databases", get(documents::list_databases))
        .route("/api/databases/cache", delete(documents::clear_cache))
        .route("/api/collections", get(documents::list_collections))
        .route(
            "/api/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/api/documents/{id}",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/api/auth/tenants", get(users::list_tenants))
        .route("/api/auth/users", get(users::list_users))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the console on `listener` until the process is stopped.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

/// An error response: a status code and a JSON body with an `error` message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    /// Logs `err` and maps it to a response; `generic` is what non-client failures report.
    pub fn from_console(err: ConsoleError, generic: &str) -> Self {
        error!(error = %err, "{}", generic);
        match err {
            ConsoleError::Query(message) => Self::new(StatusCode::BAD_REQUEST, message),
            ConsoleError::Configuration(_) | ConsoleError::StoreUnavailable(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, generic)
            }
        }
    }

    /// Adds an extra field to the JSON body.
    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        if let Some(map) = self.body.as_object_mut() {
            map.insert(key.to_string(), value);
        }
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Parses an optional numeric `limit` parameter.
pub(crate) fn parse_limit(raw: Option<&str>, default: u32) -> Result<u32, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s
            .parse::<u32>()
            .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid limit: {}", s))),
    }
}
