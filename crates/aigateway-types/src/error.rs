//! The gateway's error taxonomy (SPEC_FULL.md §4.1).
//!
//! Every error a provider call can produce is classified into one of a
//! fixed set of codes. Classification happens once, at the boundary where
//! the failover executor calls into a provider; the resulting
//! [`ClassifiedError`] is what propagates from there on.

use thiserror::Error;

/// A fixed classification of what went wrong talking to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimited,
    AuthFailed,
    ModelUnavailable,
    Timeout,
    InvalidRequest,
    ServiceError,
    NetworkError,
}

impl ErrorCode {
    /// Classify a raw error message using the keyword buckets from
    /// SPEC_FULL.md §4.1. Disjoint: first matching bucket wins.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("rate") || lower.contains("429") {
            ErrorCode::RateLimited
        } else if lower.contains("auth") || lower.contains("401") || lower.contains("api key") {
            ErrorCode::AuthFailed
        } else if lower.contains("model") || lower.contains("not found") {
            ErrorCode::ModelUnavailable
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ErrorCode::Timeout
        } else if lower.contains("invalid") || lower.contains("400") {
            ErrorCode::InvalidRequest
        } else if lower.contains("network") || lower.contains("fetch") || lower.contains("connection refused") {
            ErrorCode::NetworkError
        } else {
            ErrorCode::ServiceError
        }
    }

    /// Whether the failover executor should try another provider for this
    /// code, per SPEC_FULL.md §4.1.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimited
                | ErrorCode::Timeout
                | ErrorCode::ServiceError
                | ErrorCode::NetworkError
                | ErrorCode::ModelUnavailable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::ModelUnavailable => "MODEL_UNAVAILABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::ServiceError => "SERVICE_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
        }
    }
}

/// A single provider failure, classified and attributed.
#[derive(Debug, Clone, Error)]
#[error("{code:?} from {service}: {message}")]
pub struct ClassifiedError {
    pub message: String,
    pub service: String,
    pub code: ErrorCode,
}

impl ClassifiedError {
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let code = ErrorCode::classify(&message);
        Self {
            message,
            service: service.into(),
            code,
        }
    }

    pub fn with_code(service: impl Into<String>, message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            service: service.into(),
            code,
        }
    }
}

/// Top-level gateway error. Structural failures (no providers registered,
/// workflow not found, definition invalid, state backend I/O) alongside the
/// provider-classified error.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Provider(#[from] ClassifiedError),

    #[error("no providers registered for category '{0}'")]
    EmptyCategory(String),

    #[error("workflow '{0}' not found")]
    DefinitionNotFound(String),

    #[error("workflow run '{0}' not found")]
    RunNotFound(uuid::Uuid),

    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("state backend error: {0}")]
    StateBackend(String),

    #[error("workflow step {step} failed: {message}")]
    StepFailed {
        step: usize,
        message: String,
        code: Option<ErrorCode>,
        service: Option<String>,
    },

    #[error("workflow timed out")]
    Timeout,
}

impl GatewayError {
    /// The error code this error should report at the HTTP boundary, per
    /// SPEC_FULL.md §6.3.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            GatewayError::Provider(e) => Some(e.code),
            GatewayError::StepFailed { code, .. } => *code,
            GatewayError::Timeout => Some(ErrorCode::Timeout),
            GatewayError::EmptyCategory(_) => Some(ErrorCode::ServiceError),
            _ => None,
        }
    }

    pub fn service(&self) -> Option<&str> {
        match self {
            GatewayError::Provider(e) => Some(e.service.as_str()),
            GatewayError::StepFailed { service, .. } => service.as_deref(),
            _ => None,
        }
    }
}
