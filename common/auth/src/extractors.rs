use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use common_http_errors::Failure;

use crate::claims::AuthenticatedIdentity;
use crate::error::AuthResult;

const BEARER_PREFIX: &str = "Bearer ";

/// Returns the raw token following the literal `Bearer ` prefix.
pub fn extract_token(headers: &HeaderMap) -> AuthResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or_else(|| {
            Failure::invalid_authorization_header(
                "HTTP Authorization header not found, or it's invalid",
            )
        })
}

/// The authenticated principal of the current request, placed in the request
/// extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: AuthenticatedIdentity,
}

impl AuthContext {
    pub fn into_identity(self) -> AuthenticatedIdentity {
        self.identity
    }
}

/// Rejection for handlers reached without passing through the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct Unauthenticated;

impl IntoResponse for Unauthenticated {
    fn into_response(self) -> Response {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Unauthenticated;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .filter(|identity| identity.authenticated)
            .cloned()
            .map(|identity| Self { identity })
            .ok_or(Unauthenticated)
    }
}
