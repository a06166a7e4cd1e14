//! Response relay.
//!
//! # Responsibilities
//! - Relay a validated upstream JSON body unchanged (200)
//! - Map any upstream failure to 400 with a JSON string description
//!
//! # Design Decisions
//! - The upstream body is not re-serialized, so field order and formatting survive
//! - Failure descriptions come from `UpstreamError` display strings, which never
//!   contain the outbound URL

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// A JSON body passed through verbatim.
#[derive(Debug, Clone)]
pub struct JsonPassthrough(pub String);

impl IntoResponse for JsonPassthrough {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            self.0,
        )
            .into_response()
    }
}

/// A failed dispatch, rendered as `400` with the description as a JSON string.
#[derive(Debug, Clone)]
pub struct Failure(pub String);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.0)).into_response()
    }
}
