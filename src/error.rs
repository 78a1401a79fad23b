//! # Error Handling
//!
//! This module defines the failure taxonomy of the transcription service and
//! how each failure is converted to an HTTP response.
//!
//! ## Error Categories:
//! - **Validation**: Client-correctable input problems (400) — missing field,
//!   wrong extension, empty filename. Reported before any resource is touched.
//! - **Storage**: Local scratch-file I/O or decode failure (500). Cleanup of
//!   the handle and the scratch file still runs.
//! - **BackendUnavailable**: The recognition backend is unreachable, rate
//!   limited, or timed out (502). The detail message is passed through for
//!   diagnostics.
//! - **Internal**: Any unexpected fault not matching the above (500).
//! - **Config**: Configuration loading or validation problems (500).
//!
//! Note what is deliberately *not* here: "could not understand the speech" is
//! a normal outcome, not an error — it surfaces as a successful response with
//! an empty transcript (see the pipeline).
//!
//! ## Wire Contract:
//! Every error body has the same shape as a successful transcription so the
//! caller always receives a well-formed structured response:
//! ```json
//! { "transcript": "", "error": "Missing audio file" }
//! ```

use actix_web::{HttpResponse, ResponseError};  // Web framework error handling
use serde_json::json;                          // For creating JSON error responses
use std::fmt;                                  // For implementing Display trait

/// Custom error types for the application.
#[derive(Debug)]
pub enum AppError {
    /// Client sent invalid or malformed input (bad field, extension, filename)
    Validation(String),

    /// Scratch storage or audio decoding failed (disk full, permissions, bad WAV)
    Storage(String),

    /// The recognition backend failed or timed out
    BackendUnavailable(String),

    /// Unexpected server-side fault
    Internal(String),

    /// Configuration file or environment variable problems
    Config(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::BackendUnavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl AppError {
    /// The human-readable reason carried by this error, without the category
    /// prefix. This is what goes into the response body's `error` field.
    pub fn detail(&self) -> &str {
        match self {
            AppError::Validation(msg)
            | AppError::Storage(msg)
            | AppError::BackendUnavailable(msg)
            | AppError::Internal(msg)
            | AppError::Config(msg) => msg,
        }
    }
}

/// Converts errors into the transcribe endpoint's wire contract.
///
/// ## HTTP Status Code Mapping:
/// - Validation → 400 (Bad Request)
/// - BackendUnavailable → 502 (Bad Gateway)
/// - Storage/Internal/Config → 500 (Internal Server Error)
impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            AppError::Validation(_) => actix_web::http::StatusCode::BAD_REQUEST,
            AppError::BackendUnavailable(_) => actix_web::http::StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Internal(_) | AppError::Config(_) => {
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "transcript": "",
            "error": self.detail(),
        }))
    }
}

/// Automatic conversion from anyhow::Error for code that uses general-purpose
/// errors internally.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing failures are almost always malformed client input.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
