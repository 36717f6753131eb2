//! HTTP API handlers using axum.
//!
//! # Rust Learning Note
//!
//! ## Errors as responses
//!
//! Handlers return `Result<Json<T>, ApiError>`. `ApiError` implements
//! `IntoResponse`, and `From<airfone_common::Error>`, so a registry error
//! propagates out of a handler with a plain `?`:
//!
//! ```rust,ignore
//! async fn logout_handler(
//!     State(facade): State<RegistryFacade>,
//!     Json(req): Json<LogoutRequest>,
//! ) -> Result<Json<AckResponse>, ApiError> {
//!     Ok(Json(facade.logout(req)?))
//! }
//! ```
//!
//! The error's machine-readable reason picks the HTTP status and travels in
//! the body, so clients never parse the human message.

use crate::facade::RegistryFacade;
use crate::types::{
    AckResponse, ConformRequest, ErrorResponse, HeartbeatView, KeepAliveRequest, LogoutRequest,
    RegisterRequest, ServiceView, TopicListResponse, TopicView, UpdateRequest,
};
use airfone_common::{Error, ErrorReason};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, warn};

/// Creates the API router.
pub fn create_router(facade: RegistryFacade) -> Router {
    Router::new()
        .route("/api/v1/register", post(register_handler))
        .route("/api/v1/update", post(update_handler))
        .route("/api/v1/logout", post(logout_handler))
        .route("/api/v1/keepalive", post(keep_alive_handler))
        .route("/api/v1/conform", post(conform_handler))
        .route("/api/v1/topics", get(topics_handler))
        .route("/api/v1/topics/{topic}", get(topic_handler))
        .route("/api/v1/health", get(health_handler))
        .with_state(facade)
}

async fn register_handler(
    State(facade): State<RegistryFacade>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ServiceView>, ApiError> {
    info!(topic = %req.topic, ip = %req.ip, port = req.port, "Register request");
    Ok(Json(facade.register(req)?))
}

async fn update_handler(
    State(facade): State<RegistryFacade>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<ServiceView>, ApiError> {
    Ok(Json(facade.update(req)?))
}

async fn logout_handler(
    State(facade): State<RegistryFacade>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    Ok(Json(facade.logout(req)?))
}

async fn keep_alive_handler(
    State(facade): State<RegistryFacade>,
    Json(req): Json<KeepAliveRequest>,
) -> Result<Json<HeartbeatView>, ApiError> {
    Ok(Json(facade.keep_alive(req)?))
}

async fn conform_handler(
    State(facade): State<RegistryFacade>,
    Json(req): Json<ConformRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    Ok(Json(facade.conform(req)?))
}

async fn topics_handler(State(facade): State<RegistryFacade>) -> Json<TopicListResponse> {
    Json(facade.topics())
}

async fn topic_handler(
    State(facade): State<RegistryFacade>,
    Path(topic): Path<String>,
) -> Result<Json<TopicView>, ApiError> {
    Ok(Json(facade.topic(&topic)?))
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Registry error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

/// HTTP status used for each error reason.
pub fn status_for(reason: ErrorReason) -> StatusCode {
    match reason {
        ErrorReason::NotFound => StatusCode::NOT_FOUND,
        ErrorReason::AlreadyExists => StatusCode::CONFLICT,
        ErrorReason::AlreadyDropped => StatusCode::GONE,
        ErrorReason::InvalidUpdate | ErrorReason::InvalidDelete | ErrorReason::Validation => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let reason = self.0.reason();
        let status = status_for(reason);
        let message = self.0.to_string();

        if status.is_server_error() {
            error!(status = %status, reason = %reason, "API error: {}", message);
        } else {
            warn!(status = %status, reason = %reason, "API error: {}", message);
        }

        (status, Json(ErrorResponse { reason, message })).into_response()
    }
}
