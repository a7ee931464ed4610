//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror. Every
//! variant maps to a stable machine-readable code via [`Error::kind`].

use std::time::Duration;
use thiserror::Error;

/// Maximum number of characters of an upstream body kept in error details.
pub const MAX_DETAIL_CHARS: usize = 512;

/// Why an inbound base64 image was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Image data is empty")]
    EmptyInput,

    #[error("Invalid base64 encoding")]
    DecodeError,

    #[error(
        "Image too large ({:.1} MiB), maximum supported size is 5 MiB",
        mib(.size)
    )]
    TooLarge { size: usize },

    #[error("Invalid image format, please upload a JPEG, PNG, GIF or WebP image")]
    UnsupportedFormat,
}

fn mib(size: &usize) -> f64 {
    *size as f64 / (1024.0 * 1024.0)
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyInput => "empty_input",
            ValidationError::DecodeError => "decode_error",
            ValidationError::TooLarge { .. } => "too_large",
            ValidationError::UnsupportedFormat => "unsupported_format",
        }
    }
}

/// Failure talking to the remote provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("provider returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("provider request timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("provider connection failed: {detail}")]
    Connection { detail: String },
}

impl TransportError {
    /// Upstream HTTP status, when the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Image validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Provider transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("The model returned a thought signature but no image yet, retry or simplify the prompt")]
    IncompleteGeneration,

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::Transport(_) => "transport_error",
            Error::MalformedResponse(_) => "malformed_response",
            Error::IncompleteGeneration => "incomplete_generation",
            Error::TemplateNotFound(_) => "template_not_found",
            Error::Config(_) | Error::EnvVar(_) => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::IncompleteGeneration)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // The HTTP transport maps timeouts itself, with the real budget attached.
        let transport = if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                detail: truncate_detail(&err.to_string()),
            }
        } else {
            TransportError::Connection {
                detail: truncate_detail(&err.to_string()),
            }
        };
        Error::Transport(transport)
    }
}

/// Cut an upstream body down to [`MAX_DETAIL_CHARS`] characters.
pub fn truncate_detail(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(MAX_DETAIL_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

pub type Result<T> = std::result::Result<T, Error>;
