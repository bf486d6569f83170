use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use tracing::{debug, info};

use common_auth::{
    require_auth, AuthContext, AuthHooks, AuthenticatedIdentity, Authenticator, TokenService,
};
use common_cors::{cors_gate, CorsGate};
use common_http_errors::{ErrorResponder, ERROR_CODE_HEADER};
use common_observability::GatekeeperMetrics;

use crate::config::GatekeeperConfig;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub cors: CorsGate,
    pub metrics: Arc<GatekeeperMetrics>,
}

impl AppState {
    pub fn from_config(config: &GatekeeperConfig) -> Result<Self> {
        let tokens = TokenService::initialize(&config.token)
            .context("Failed to initialize token verification")?;
        let responder = ErrorResponder::new(config.errors_as_json);

        let authenticator = Authenticator::new(Arc::new(tokens))
            .with_hooks(Arc::new(TracingHooks))
            .with_responder(responder);
        let cors = match &config.cors {
            Some(policy) => CorsGate::new(policy.clone()),
            None => CorsGate::unconfigured(),
        }
        .with_responder(responder);
        let metrics = Arc::new(GatekeeperMetrics::new()?);

        info!(
            mode = config.token.mode.name(),
            cors = config.cors.is_some(),
            errors_as_json = config.errors_as_json,
            "gatekeeper state initialised"
        );
        Ok(Self {
            authenticator,
            cors,
            metrics,
        })
    }
}

/// Logs each authentication attempt at debug level.
struct TracingHooks;

impl AuthHooks for TracingHooks {
    fn before(&self, parts: &Parts) {
        debug!(method = %parts.method, uri = %parts.uri, "authenticating request");
    }

    fn after(&self, parts: &Parts, identity: &AuthenticatedIdentity) {
        debug!(uri = %parts.uri, id = %identity.id, username = %identity.username, "identity accepted");
    }
}

pub async fn health() -> &'static str {
    "ok"
}

async fn me(ctx: AuthContext) -> Json<AuthenticatedIdentity> {
    Json(ctx.into_identity())
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => ErrorResponder::unexpected(err),
    }
}

async fn track_http_errors(
    State(metrics): State<Arc<GatekeeperMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        metrics.record_error(code, status);
    }
    resp
}

/// Routes: `/healthz` and `/metrics` are open, `/me` requires a bearer token.
/// The CORS gate runs before authentication so preflights never need a token.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::<AppState>::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.authenticator.clone(),
            require_auth,
        ));

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(protected)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.cors.clone(), cors_gate))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_http_errors,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use common_auth::{TokenConfig, VerificationMode};
    use tower::ServiceExt;

    fn config(errors_as_json: bool) -> GatekeeperConfig {
        GatekeeperConfig {
            token: TokenConfig::new(VerificationMode::secret("s3cr3t")),
            cors: None,
            errors_as_json,
            host: "127.0.0.1".into(),
            port: 0,
        }
    }

    #[test]
    fn empty_secret_aborts_startup() {
        let mut config = config(true);
        config.token = TokenConfig::new(VerificationMode::secret(""));
        assert!(AppState::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn health_is_open() {
        let state = AppState::from_config(&config(true)).expect("state");
        let resp = build_router(state)
            .oneshot(HttpRequest::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn strict_failures_are_counted_by_kind() {
        let state = AppState::from_config(&config(false)).expect("state");
        let metrics = state.metrics.clone();
        let resp = build_router(state)
            .oneshot(HttpRequest::get("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            metrics.error_count("InvalidAuthorizationHeader", StatusCode::INTERNAL_SERVER_ERROR),
            1
        );
    }

    #[tokio::test]
    async fn unknown_routes_are_counted_without_code() {
        let state = AppState::from_config(&config(true)).expect("state");
        let metrics = state.metrics.clone();
        let resp = build_router(state)
            .oneshot(HttpRequest::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(metrics.error_count("none", StatusCode::NOT_FOUND), 1);
    }
}
