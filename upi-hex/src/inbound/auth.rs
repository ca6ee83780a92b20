//! Authentication middleware for bearer token validation.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use upi_types::LedgerRepository;

use super::handlers::AppState;

/// Extracts the access token from the Authorization header.
/// Expected format: "Bearer <token>" or just "<token>"
fn extract_access_token(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;
    if header.starts_with("Bearer ") {
        Some(header.strip_prefix("Bearer ").unwrap())
    } else {
        Some(header)
    }
}

/// Requests that never require a token.
fn is_public(method: &axum::http::Method, path: &str) -> bool {
    if path == "/health" {
        return true;
    }
    if path == "/api/register" && *method == axum::http::Method::POST {
        return true;
    }
    // Swagger UI and the OpenAPI document.
    path.starts_with("/docs") || path.starts_with("/api-docs")
}

/// Authentication middleware that resolves the caller behind a bearer token.
///
/// This middleware:
/// 1. Extracts the token from the Authorization header
/// 2. Hashes it using SHA-256
/// 3. Looks up the caller behind the digest
/// 4. Injects the resolved caller identity for handlers, or returns 401
///
/// Endpoints that bypass authentication:
/// - `/health` - Health check endpoint
/// - `POST /api/register` - Registration issues the first token
/// - `/docs`, `/api-docs` - API documentation
pub async fn auth_middleware<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    // Extract the token from the Authorization header
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = match extract_access_token(auth_header) {
        Some(token) if !token.is_empty() => token,
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    // Only the digest ever reaches the store
    let digest = upi_repo::security::hash_token(token);

    match state.service.repo().identity_by_token_digest(&digest).await {
        Ok(Some(identity)) => {
            // Token is valid; make the caller available to handlers
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => {
            // Token not found
            unauthorized_response("Invalid access token")
        }
        Err(e) => {
            // Database error
            tracing::error!("token verification failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Internal server error",
                    "code": 500
                })),
            )
                .into_response()
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": message,
            "code": 401
        })),
    )
        .into_response()
}
