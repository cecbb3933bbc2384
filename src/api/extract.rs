//! Extractors whose rejections use the API error body.

use axum::extract::{rejection::JsonRejection, FromRequest};

use super::error::ApiError;

/// `axum::Json` with malformed bodies reported as validation errors
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_field("body", rejection.body_text())
    }
}
