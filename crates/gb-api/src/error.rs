//! HTTP mapping of domain errors.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use gb_core::error::AppError;
use serde_json::json;
use tracing::error;

/// `AppError` as an actix response: JSON `{"message": ...}` with guest-safe text.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::Validation(_)
            | AppError::PhotoTooLarge { .. }
            | AppError::UnsupportedPhotoType(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        HttpResponse::build(status).json(json!({ "message": self.0.public_message() }))
    }
}
