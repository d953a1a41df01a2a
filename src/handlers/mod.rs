// Handlers module
// HTTP handlers for the REST API

pub mod health;

pub use health::{health_check, readiness_check};

use axum::{
    extract::OriginalUri,
    http::{Method, Uri},
};

use crate::error::ApiError;

/// Fallback for paths no route matches
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {}", uri.path()))
}

/// Fallback for a known path requested with an unsupported method.
/// Takes the original URI since nested routers see the prefix stripped.
pub async fn method_not_allowed(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::MethodNotAllowed(format!("{} {}", method, uri.path()))
}
