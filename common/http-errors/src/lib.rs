use std::fmt;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub const ERROR_CODE_HEADER: &str = "X-Error-Code";

/// Discriminant for every per-request failure the gatekeeper can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    InvalidAuthorizationHeader,
    MalformedToken,
    TokenExpired,
    InvalidVerificationMethod,
    MissingSigningKey,
    InvalidOrigin,
    BadOriginSyntax,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidAuthorizationHeader => "InvalidAuthorizationHeader",
            FailureKind::MalformedToken => "MalformedToken",
            FailureKind::TokenExpired => "TokenExpired",
            FailureKind::InvalidVerificationMethod => "InvalidVerificationMethod",
            FailureKind::MissingSigningKey => "MissingSigningKey",
            FailureKind::InvalidOrigin => "InvalidOrigin",
            FailureKind::BadOriginSyntax => "BadOriginSyntax",
            FailureKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    kind: FailureKind,
    message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_authorization_header(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidAuthorizationHeader, message)
    }

    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedToken, message)
    }

    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::new(FailureKind::TokenExpired, message)
    }

    pub fn invalid_verification_method(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidVerificationMethod, message)
    }

    pub fn missing_signing_key(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MissingSigningKey, message)
    }

    pub fn invalid_origin(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidOrigin, message)
    }

    pub fn bad_origin_syntax(message: impl Into<String>) -> Self {
        Self::new(FailureKind::BadOriginSyntax, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Client-driven failures; anything else is an unexpected runtime fault.
    pub fn is_expected(&self) -> bool {
        self.kind != FailureKind::Internal
    }
}

/// Host default when a failure is propagated instead of converted: a bare 500
/// that does not leak the failure message.
impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut resp = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        resp.headers_mut().insert(
            ERROR_CODE_HEADER,
            HeaderValue::from_static(self.kind.as_str()),
        );
        resp
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub exception_type: String,
    pub message: String,
}

impl From<&Failure> for ErrorBody {
    fn from(value: &Failure) -> Self {
        Self {
            exception_type: value.kind.as_str().to_string(),
            message: value.message.clone(),
        }
    }
}

/// Turns pipeline failures into responses, uniformly for every failure kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorResponder {
    convert_to_json: bool,
}

impl ErrorResponder {
    pub fn new(convert_to_json: bool) -> Self {
        Self { convert_to_json }
    }

    pub fn json() -> Self {
        Self::new(true)
    }

    pub fn strict() -> Self {
        Self::new(false)
    }

    pub fn converts_to_json(&self) -> bool {
        self.convert_to_json
    }

    /// In JSON mode every failure becomes a 403 with an
    /// `{exceptionType, message}` body; otherwise the failure is handed back.
    pub fn respond(&self, failure: Failure) -> Result<Response, Failure> {
        if self.convert_to_json {
            Ok(Self::known(&failure, StatusCode::FORBIDDEN))
        } else {
            Err(failure)
        }
    }

    pub fn known(failure: &Failure, status: StatusCode) -> Response {
        with_error_code(
            (status, Json(ErrorBody::from(failure))).into_response(),
            failure.kind.as_str(),
        )
    }

    pub fn unexpected<E: fmt::Display>(err: E) -> Response {
        error!(error = %err, "unexpected server error");
        let body = ErrorBody {
            exception_type: "InternalServerError".to_string(),
            message: "Unexpected server error".to_string(),
        };
        with_error_code(
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response(),
            "InternalServerError",
        )
    }
}

fn with_error_code(mut resp: Response, code: &'static str) -> Response {
    resp.headers_mut()
        .insert(ERROR_CODE_HEADER, HeaderValue::from_static(code));
    resp
}

pub type GateResult<T> = Result<T, Failure>;
