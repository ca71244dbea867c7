// tests/health_api.rs
//
// Operational HTTP surface exercised directly via tower::ServiceExt::oneshot.

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt as _; // for `oneshot`

use firehose_ingest::api;

const BODY_LIMIT: usize = 1024 * 1024;

#[tokio::test]
async fn healthz_and_metrics_respond() {
    let app = api::router(api::init_prometheus());

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["message"], "OK");

    let resp = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
