//! Error types for the creative pipeline.
//!
//! Each layer owns its own enum so a failure carries the stage it came from.
//! Only [`ApiError`] knows about HTTP; it is what handlers return.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Message returned to callers for any failure after input validation.
pub const GENERIC_FAILURE: &str = "Creative AI pipeline failed. Check server logs for details.";

/// Message returned when a required form field is absent or blank.
pub const MISSING_FIELDS: &str = "Title, photo and style instruction are required.";

/// Message returned when a client exceeds the request budget.
pub const RATE_LIMITED: &str = "Too many requests, please try again in a minute.";

/// Configuration errors, raised before the server binds.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Image normalization errors.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("uploaded image is empty")]
    Empty,

    #[error("failed to decode uploaded image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode normalized image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("normalization task failed: {0}")]
    Join(#[source] tokio::task::JoinError),
}

/// Errors from the external image-generation and caption services.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{provider} HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The service answered 2xx but the payload was unusable.
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

/// Orchestration errors, tagged with the stage that aborted the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("image generation failed: {0}")]
    Generation(#[source] ProviderError),

    #[error("caption generation failed: {0}")]
    Caption(#[source] ProviderError),
}

/// Errors surfaced by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// The body could not be opened as `multipart/form-data`.
    #[error(transparent)]
    MultipartRejection(#[from] axum::extract::multipart::MultipartRejection),

    #[error(transparent)]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MultipartRejection(e) => e.status(),
            ApiError::Multipart(e) => e.status(),
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message sent to the client. Pipeline causes stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::MultipartRejection(e) => e.body_text(),
            ApiError::Multipart(e) => e.body_text(),
            ApiError::RateLimited => RATE_LIMITED.to_string(),
            ApiError::Pipeline(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Pipeline(ref e) = self {
            tracing::error!(error = %e, "creative pipeline aborted");
        }
        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}
