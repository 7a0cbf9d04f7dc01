//! # AppError
//!
//! Centralized error handling for the guestbook workflow.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all gb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad input shape or size; the message names the offending field
    #[error("validation error: {0}")]
    Validation(String),

    /// Too many attempts from one identity within the current window
    #[error("too many requests")]
    RateLimited,

    #[error("photo exceeds {max_bytes} bytes")]
    PhotoTooLarge { max_bytes: usize },

    #[error("unsupported photo type: {0}")]
    UnsupportedPhotoType(String),

    /// Backing store unavailable or it rejected the operation
    #[error("storage error: {0}")]
    Storage(String),

    /// Moderation target no longer exists
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Chat send failed. Never surfaced to guests.
    #[error("transport error: {0}")]
    Transport(String),
}

impl AppError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn entry_not_found(id: impl Into<String>) -> Self {
        Self::NotFound("entry".to_string(), id.into())
    }

    /// Text safe to show a guest. Storage detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::RateLimited => "Too many submissions. Please try again later.".to_string(),
            Self::PhotoTooLarge { .. } => "Photo must be less than 5MB.".to_string(),
            Self::UnsupportedPhotoType(_) => {
                "Photo must be a valid image (JPEG, PNG, WebP or HEIC).".to_string()
            }
            Self::NotFound(kind, _) => format!("{kind} not found."),
            Self::Storage(_) | Self::Transport(_) => {
                "An error occurred. Please try again.".to_string()
            }
        }
    }
}

/// A specialized Result type for guestbook logic.
pub type Result<T> = std::result::Result<T, AppError>;
