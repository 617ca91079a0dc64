//! HTTP error taxonomy for the gateway
//!
//! Validation failures are the caller's fault and are reported verbatim.
//! Upstream failures are logged in full but surfaced as a generic 502.

use crate::core::provider::ProviderError;
use crate::models::gateway::ErrorResponse;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Body message for every upstream failure
pub const UPSTREAM_FAILURE_MESSAGE: &str = "upstream request failed";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] ProviderError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message placed in the `error` field of the response body
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Validation(_) => self.to_string(),
            GatewayError::Upstream(ProviderError::Timeout(_)) => {
                format!("{}: timed out", UPSTREAM_FAILURE_MESSAGE)
            }
            GatewayError::Upstream(_) => UPSTREAM_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::Validation(rejection.body_text())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
