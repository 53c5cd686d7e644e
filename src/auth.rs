//! Shared-secret bearer authentication for the dialer and admin surfaces.

use crate::errors::AppError;
use crate::handlers::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Validates the shared-secret bearer token.
///
/// The token is taken from the `Authorization: Bearer <token>` header, or
/// from a `token` query parameter as a fallback for callers that cannot set
/// headers (dialer postback URLs).
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let supplied = bearer_from_headers(request.headers())
        .or_else(|| token_from_query(request.uri().query().unwrap_or("")));

    let Some(supplied) = supplied else {
        return Err(AppError::Unauthorized("Bearer token required".to_string()));
    };

    if !constant_time_compare(&supplied, &state.config.api_bearer_token) {
        return Err(AppError::Unauthorized("Invalid bearer token".to_string()));
    }

    Ok(next.run(request).await)
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

fn token_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer secret-token".parse().unwrap(),
        );
        assert_eq!(
            bearer_from_headers(&headers).as_deref(),
            Some("secret-token")
        );
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Basic dXNlcjpwYXNz".parse().unwrap(),
        );
        assert!(bearer_from_headers(&headers).is_none());
    }

    #[test]
    fn token_query_param_is_extracted() {
        assert_eq!(
            token_from_query("page=1&token=secret&limit=5").as_deref(),
            Some("secret")
        );
        assert!(token_from_query("page=1&limit=5").is_none());
        assert!(token_from_query("token=").is_none());
        assert!(token_from_query("").is_none());
    }

    #[test]
    fn constant_time_compare_matches_equality() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "secre7"));
        assert!(!constant_time_compare("secret", "secrets"));
        assert!(!constant_time_compare("", "x"));
    }
}
