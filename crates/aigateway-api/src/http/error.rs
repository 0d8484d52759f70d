//! Application error type mapping to HTTP status codes and envelope format.
//!
//! Every handler error funnels through [`AppError`] into the flat
//! `{name, message, service, code}` body (SPEC_FULL.md §6.3). A classified
//! `GatewayError` maps its `ErrorCode` to a status per the table there;
//! anything with no error code at all -- an invalid definition, a
//! state-backend failure -- is genuinely unclassified and renders as a bare
//! `500 {"error": "Internal server error"}` instead (SPEC_FULL.md §7),
//! matching the reference codebase's split between a typed envelope for
//! known failures and a flat fallback for everything else.

use aigateway_types::error::{ErrorCode, GatewayError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// `{name, message, service, code}` per SPEC_FULL.md §6.3/§11.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub name: String,
    pub message: String,
    pub service: Option<String>,
    pub code: Option<String>,
}

/// Error class name for a classified code, matching the reference
/// codebase's convention of a JS-`Error`-style `name` distinct from the
/// machine-readable `code`.
fn error_name(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::RateLimited => "RateLimitError",
        ErrorCode::AuthFailed => "AuthenticationError",
        ErrorCode::ModelUnavailable => "ModelUnavailableError",
        ErrorCode::Timeout => "TimeoutError",
        ErrorCode::InvalidRequest => "InvalidRequestError",
        ErrorCode::ServiceError => "ServiceError",
        ErrorCode::NetworkError => "NetworkError",
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::AuthFailed => StatusCode::UNAUTHORIZED,
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::ModelUnavailable | ErrorCode::Timeout | ErrorCode::ServiceError | ErrorCode::NetworkError => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid bearer token.
    Unauthorized,
    /// A workflow id or name could not be resolved.
    NotFound(String),
    /// A malformed request body or an input a transformer rejected.
    InvalidRequest(String),
    /// Everything that reached the HTTP boundary as a `GatewayError`.
    Gateway(GatewayError),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError::Gateway(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody {
                    name: error_name(ErrorCode::AuthFailed).to_string(),
                    message: "missing or invalid API key".to_string(),
                    service: None,
                    code: Some(ErrorCode::AuthFailed.as_str().to_string()),
                }),
            )
                .into_response(),
            AppError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    name: "NotFoundError".to_string(),
                    message,
                    service: None,
                    code: None,
                }),
            )
                .into_response(),
            AppError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    name: error_name(ErrorCode::InvalidRequest).to_string(),
                    message,
                    service: None,
                    code: Some(ErrorCode::InvalidRequest.as_str().to_string()),
                }),
            )
                .into_response(),
            AppError::Gateway(error) => match error.error_code() {
                Some(code) => {
                    let service = error.service().map(str::to_string);
                    let message = error.to_string();
                    (
                        status_for(code),
                        Json(ErrorBody {
                            name: error_name(code).to_string(),
                            message,
                            service,
                            code: Some(code.as_str().to_string()),
                        }),
                    )
                        .into_response()
                }
                None => {
                    tracing::error!(error = %error, "unclassified internal error");
                    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error" }))).into_response()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigateway_types::error::{ClassifiedError, ErrorCode};

    fn provider_error(code: ErrorCode) -> GatewayError {
        GatewayError::Provider(ClassifiedError::with_code("openai", "boom", code))
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let response = AppError::from(provider_error(ErrorCode::RateLimited)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn auth_failed_maps_to_401() {
        let response = AppError::from(provider_error(ErrorCode::AuthFailed)).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        assert_eq!(AppError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = AppError::NotFound("workflow run 'x' not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_request_maps_to_400() {
        let response = AppError::InvalidRequest("bad body".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn service_error_maps_to_503() {
        let response = AppError::from(provider_error(ErrorCode::ServiceError)).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unclassified_gateway_error_falls_back_to_500() {
        let response = AppError::from(GatewayError::StateBackend("connection reset".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_category_maps_to_503() {
        let response = AppError::from(GatewayError::EmptyCategory("video".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
