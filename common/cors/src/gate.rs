use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, info, warn};

use common_http_errors::{ErrorResponder, Failure, GateResult};

use crate::policy::CorsPolicy;

const MAX_CACHE_SECONDS: &str = "86400";

type CorsHeaders = Vec<(HeaderName, HeaderValue)>;

/// Validates the Origin of browser requests and answers preflights.
#[derive(Clone, Default)]
pub struct CorsGate {
    policy: Option<Arc<CorsPolicy>>,
    responder: ErrorResponder,
}

impl CorsGate {
    pub fn new(policy: CorsPolicy) -> Self {
        Self {
            policy: Some(Arc::new(policy)),
            responder: ErrorResponder::default(),
        }
    }

    /// A gate without policy only logs and answers preflights.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn with_responder(mut self, responder: ErrorResponder) -> Self {
        self.responder = responder;
        self
    }

    pub fn policy(&self) -> Option<&CorsPolicy> {
        self.policy.as_deref()
    }

    /// Headers to add to the response, or `None` when the gate does nothing
    /// for this request.
    pub fn prepare(&self, headers: &HeaderMap) -> GateResult<Option<CorsHeaders>> {
        let Some(policy) = self.policy.as_deref() else {
            warn!("CORS gate is doing nothing, no CORS policy has been set");
            return Ok(None);
        };
        let Some(origin_value) = headers.get(ORIGIN) else {
            debug!("client didn't send the origin header");
            return Ok(None);
        };
        let origin = origin_value
            .to_str()
            .map_err(|_| Failure::bad_origin_syntax("Bad HTTP Origin header: not visible ASCII"))?;

        policy.check_valid_origin(origin)?;

        let mut out: CorsHeaders = vec![
            (ACCESS_CONTROL_ALLOW_ORIGIN, origin_value.clone()),
            (
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            ),
            (
                ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(MAX_CACHE_SECONDS),
            ),
        ];
        if let Some(methods) = policy.methods() {
            let joined = HeaderValue::from_str(&methods.join(", ")).map_err(|err| {
                Failure::internal(format!("configured CORS methods are not a valid header: {err}"))
            })?;
            out.push((ACCESS_CONTROL_ALLOW_METHODS, joined));
        }
        if let Some(requested) = headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
            out.push((ACCESS_CONTROL_ALLOW_HEADERS, requested.clone()));
        }
        Ok(Some(out))
    }
}

/// Middleware entry point. Preflight `OPTIONS` requests are answered here and
/// never reach downstream handlers.
pub async fn cors_gate(
    State(gate): State<CorsGate>,
    request: Request,
    next: Next,
) -> Result<Response, Failure> {
    let cors_headers = match gate.prepare(request.headers()) {
        Ok(headers) => headers,
        Err(failure) => {
            if failure.is_expected() {
                info!(kind = %failure.kind(), "{failure}");
            } else {
                error!(kind = %failure.kind(), "Fatal error occurred: {failure}");
            }
            return gate.responder.respond(failure);
        }
    };

    let mut response = if request.method() == Method::OPTIONS {
        (StatusCode::OK, "OK").into_response()
    } else {
        next.run(request).await
    };

    if let Some(cors_headers) = cors_headers {
        let target = response.headers_mut();
        for (name, value) in cors_headers {
            target.insert(name, value);
        }
    }
    Ok(response)
}
