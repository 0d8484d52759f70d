//! Bearer token authentication extractor (SPEC_FULL.md §6.4, §11).
//!
//! When `GatewayConfig::api_key` is unset, auth is a no-op entirely. When
//! set, every route but `GET /` requires `Authorization: Bearer <API_KEY>`
//! matching it exactly.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use secrecy::ExposeSecret;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated request marker. Extracting this validates the bearer
/// token, or is a no-op if the gateway has no configured `API_KEY`.
pub struct Authenticated;

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = &state.config.api_key else {
            return Ok(Authenticated);
        };

        let provided = extract_bearer(parts).ok_or(AppError::Unauthorized)?;
        if provided == expected.expose_secret() {
            Ok(Authenticated)
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

fn extract_bearer(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|key| key.trim().to_string())
}
