use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::any;
use axum::{middleware, Router};
use common_cors::{cors_gate, CorsGate, CorsPolicy};
use common_http_errors::ErrorResponder;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(gate: CorsGate, hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/resource",
            any(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "downstream"
                }
            }),
        )
        .layer(middleware::from_fn_with_state(gate, cors_gate))
}

fn policy() -> CorsPolicy {
    CorsPolicy::new()
        .with_origins(["http://localhost:3000"])
        .with_root_domains(["kevinguanchedarias.com"])
        .with_methods(["GET", "POST", "OPTIONS"])
}

fn request(method: Method, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/resource");
    if let Some(origin) = origin {
        builder = builder.header(ORIGIN, origin);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_text(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn preflight_is_answered_without_reaching_handler() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut req = request(Method::OPTIONS, Some("https://app.kevinguanchedarias.com"));
    req.headers_mut()
        .insert(ACCESS_CONTROL_REQUEST_HEADERS, "authorization".parse().unwrap());

    let resp = app(CorsGate::new(policy()), hits.clone())
        .oneshot(req)
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.kevinguanchedarias.com"
    );
    assert_eq!(resp.headers()["access-control-allow-methods"], "GET, POST, OPTIONS");
    assert_eq!(resp.headers()["access-control-allow-headers"], "authorization");
    assert_eq!(body_text(resp).await, "OK");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn preflight_without_origin_is_still_short_circuited() {
    let hits = Arc::new(AtomicUsize::new(0));
    let resp = app(CorsGate::new(policy()), hits.clone())
        .oneshot(request(Method::OPTIONS, None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn allowed_origin_gets_headers_on_downstream_response() {
    let hits = Arc::new(AtomicUsize::new(0));
    let resp = app(CorsGate::new(policy()), hits.clone())
        .oneshot(request(Method::GET, Some("http://localhost:3000")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(resp.headers()["access-control-allow-credentials"], "true");
    assert_eq!(resp.headers()["access-control-max-age"], "86400");
    assert_eq!(body_text(resp).await, "downstream");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_origin_is_forbidden_in_json_mode() {
    let hits = Arc::new(AtomicUsize::new(0));
    let gate = CorsGate::new(policy()).with_responder(ErrorResponder::json());
    let resp = app(gate, hits.clone())
        .oneshot(request(Method::GET, Some("https://evil.example")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(
        body,
        json!({
            "exceptionType": "InvalidOrigin",
            "message": "Origin https://evil.example is not authorized to use the service"
        })
    );
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_preflight_is_not_answered_ok() {
    let hits = Arc::new(AtomicUsize::new(0));
    let gate = CorsGate::new(policy()).with_responder(ErrorResponder::json());
    let resp = app(gate, hits)
        .oneshot(request(Method::OPTIONS, Some("https://evil.example")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_origin_propagates_in_strict_mode() {
    let hits = Arc::new(AtomicUsize::new(0));
    let resp = app(CorsGate::new(policy()), hits.clone())
        .oneshot(request(Method::GET, Some("not a url")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers()["x-error-code"], "BadOriginSyntax");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn request_without_origin_passes_through_untouched() {
    let hits = Arc::new(AtomicUsize::new(0));
    let resp = app(CorsGate::new(policy()), hits.clone())
        .oneshot(request(Method::GET, None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unconfigured_gate_lets_everything_through() {
    let hits = Arc::new(AtomicUsize::new(0));
    let resp = app(CorsGate::unconfigured(), hits.clone())
        .oneshot(request(Method::GET, Some("https://evil.example")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
