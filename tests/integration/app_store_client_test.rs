use axum::{routing::post, Json, Router};
use purchase_verifier::{
    config::AppStoreConfig,
    services::{
        app_store_service::{AppStoreEnvironment, AppStoreError, ReceiptVerifier},
        AppStoreClient,
    },
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::support::{spawn_server, valid_receipt};

type Received = Arc<Mutex<Vec<(&'static str, Value)>>>;

/// Fake verifyReceipt with separate production and sandbox routes
async fn fake_apple(production: Value, sandbox: Value) -> (AppStoreConfig, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let router = Router::new()
        .route(
            "/production/verifyReceipt",
            post({
                let received = received.clone();
                move |Json(body): Json<Value>| async move {
                    received.lock().unwrap().push(("production", body));
                    Json(production)
                }
            }),
        )
        .route(
            "/sandbox/verifyReceipt",
            post({
                let received = received.clone();
                move |Json(body): Json<Value>| async move {
                    received.lock().unwrap().push(("sandbox", body));
                    Json(sandbox)
                }
            }),
        );

    let addr = spawn_server(router).await;
    let config = AppStoreConfig {
        shared_secret: Some("shared-secret".to_string()),
        production_url: format!("http://{}/production/verifyReceipt", addr),
        sandbox_url: format!("http://{}/sandbox/verifyReceipt", addr),
    };

    (config, received)
}

#[tokio::test]
async fn test_posts_receipt_and_shared_secret() {
    let (config, received) = fake_apple(valid_receipt(&[("remove_ads", "1")]), json!({ "status": 0 })).await;
    let client = AppStoreClient::new(&config).unwrap();

    let response = client
        .verify_receipt("base64-receipt", AppStoreEnvironment::Production)
        .await
        .unwrap();

    assert_eq!(response.status, 0);
    assert_eq!(response.receipt.unwrap().in_app[0].product_id, "remove_ads");

    let received = received.lock().unwrap().clone();
    assert_eq!(
        received,
        vec![(
            "production",
            json!({ "receipt-data": "base64-receipt", "password": "shared-secret" })
        )]
    );
}

#[tokio::test]
async fn test_sandbox_status_triggers_one_sandbox_call() {
    let (config, received) = fake_apple(
        json!({ "status": 21007 }),
        valid_receipt(&[("remove_ads", "1000000001")]),
    )
    .await;
    let client = AppStoreClient::new(&config).unwrap();

    let response = client
        .verify_with_sandbox_fallback("base64-receipt")
        .await
        .unwrap();

    assert_eq!(response.status, 0);
    let environments: Vec<&str> = received.lock().unwrap().iter().map(|(env, _)| *env).collect();
    assert_eq!(environments, vec!["production", "sandbox"]);
}

#[tokio::test]
async fn test_other_status_does_not_retry() {
    let (config, received) = fake_apple(json!({ "status": 21003 }), json!({ "status": 0 })).await;
    let client = AppStoreClient::new(&config).unwrap();

    let response = client
        .verify_with_sandbox_fallback("base64-receipt")
        .await
        .unwrap();

    assert_eq!(response.status, 21003);
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_json_body_is_parse_error() {
    let router = Router::new().route(
        "/verifyReceipt",
        post(|| async { "<html>Service Unavailable</html>" }),
    );
    let addr = spawn_server(router).await;

    let client = AppStoreClient::new(&AppStoreConfig {
        shared_secret: Some("shared-secret".to_string()),
        production_url: format!("http://{}/verifyReceipt", addr),
        sandbox_url: format!("http://{}/verifyReceipt", addr),
    })
    .unwrap();

    let result = client
        .verify_receipt("base64-receipt", AppStoreEnvironment::Production)
        .await;

    assert!(matches!(result, Err(AppStoreError::Parse { .. })));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    // Grab a free port, then release it so nothing is listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = AppStoreClient::new(&AppStoreConfig {
        shared_secret: Some("shared-secret".to_string()),
        production_url: format!("http://{}/verifyReceipt", addr),
        sandbox_url: format!("http://{}/verifyReceipt", addr),
    })
    .unwrap();

    let result = client
        .verify_receipt("base64-receipt", AppStoreEnvironment::Sandbox)
        .await;

    assert!(matches!(result, Err(AppStoreError::Transport { .. })));
}
