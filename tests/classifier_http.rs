// tests/classifier_http.rs
//
// Remote classifier client and pipeline against a real in-process HTTP
// server, covering the wire contract and partial-failure isolation.

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use firehose_ingest::classify::client::ClassifierClient;
use firehose_ingest::classify::{self, CategoryStep, FinSentimentStep, Pipeline};
use firehose_ingest::error::Error;

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

fn classify_ok(label: &'static str) -> Router {
    Router::new().route(
        "/classify",
        post(move |Json(body): Json<Value>| async move {
            // The request wire format is a single-key items batch.
            let items = body.get("items").and_then(|v| v.as_array());
            assert!(items.is_some_and(|v| !v.is_empty()), "items batch present");
            Json(json!([{ "label": label, "score": 0.87 }]))
        }),
    )
}

fn classify_failing() -> Router {
    Router::new().route(
        "/classify",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model down") }),
    )
}

#[tokio::test]
async fn classify_returns_first_label() {
    let base = spawn_server(classify_ok("economy")).await;
    let client = ClassifierClient::new(base);
    let item = client.classify("jobs numbers out today").await.unwrap();
    assert_eq!(item.label, "economy");
    assert!(item.score > 0.0);
}

#[tokio::test]
async fn non_200_is_a_hard_error_for_that_call() {
    let base = spawn_server(classify_failing()).await;
    let client = ClassifierClient::new(base);
    let err = client.classify("anything").await.unwrap_err();
    match err {
        Error::Classification(msg) => assert!(msg.contains("500"), "got: {msg}"),
        other => panic!("expected classification error, got {other}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_a_hard_error() {
    let app = Router::new().route("/classify", post(|| async { "not json" }));
    let base = spawn_server(app).await;
    let client = ClassifierClient::new(base);
    assert!(matches!(
        client.classify("x").await,
        Err(Error::Classification(_))
    ));
}

#[tokio::test]
async fn failed_sentiment_step_leaves_category_intact() {
    let good = spawn_server(classify_ok("politics and conflict")).await;
    let bad = spawn_server(classify_failing()).await;

    let mut pipeline = Pipeline::new();
    pipeline.add_step(Box::new(CategoryStep::new(good)));
    pipeline.add_step(Box::new(FinSentimentStep::new(bad)));

    let results = pipeline.process_all("some post text").await;
    assert_eq!(results[classify::CATEGORY_STEP], "politics and conflict");
    assert_eq!(results[classify::FIN_SENTIMENT_STEP], "");
}
