//! API key authentication middleware for admin routes

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use super::ApiState;

/// Extract the bearer key from the Authorization header
fn extract_api_key(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Middleware to verify the admin API key
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key configured, allow all requests (development mode)
    let Some(expected_key) = &state.api_key else {
        tracing::warn!("API key not configured - admin endpoints are open");
        return Ok(next.run(req).await);
    };

    match extract_api_key(&req) {
        Some(key) if key == expected_key => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::debug!(path = %req.uri().path(), "no API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_api_key() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_api_key(&req), None);

        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Bearer ops-key "));
        assert_eq!(extract_api_key(&req), Some("ops-key"));

        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Basic b3BzOmtleQ=="));
        assert_eq!(extract_api_key(&req), None);
    }
}
