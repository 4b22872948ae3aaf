// Test setup helpers

use async_trait::async_trait;
use axum::Router;
use purchase_verifier::{
    config::AuthConfig,
    services::{
        app_store_service::{
            AppStoreEnvironment, AppStoreError, AppStoreReceiptResponse, ReceiptVerifier,
        },
        google_play_service::{GooglePlayError, ProductPurchase, ProductPurchaseApi},
        jwt_service::Claims,
        JWTService, MemoryDocumentStore, VerificationService,
    },
};
use serde_json::Value;
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

pub const JWT_SECRET: &str = "integration-test-secret-with-at-least-32-chars";

pub fn jwt_service() -> JWTService {
    JWTService::new(&AuthConfig {
        jwt_secret: JWT_SECRET.to_string(),
    })
}

/// Caller token for `uid`, signed with `JWT_SECRET`
pub fn caller_token(uid: &str, expires_in: time::Duration) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: uid.to_string(),
        iat: now,
        exp: now + expires_in.whole_seconds(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign caller token")
}

/// Serve `router` on an ephemeral local port
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });

    addr
}

/// Android Publisher stand-in returning a fixed purchase
pub struct FakeGooglePlay {
    response: Result<ProductPurchase, u16>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeGooglePlay {
    pub fn purchase(value: Value) -> Self {
        Self {
            response: Ok(serde_json::from_value(value).expect("Invalid fake purchase")),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every lookup fails with this HTTP status
    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductPurchaseApi for FakeGooglePlay {
    async fn get_product_purchase(
        &self,
        product_id: &str,
        purchase_token: &str,
    ) -> Result<ProductPurchase, GooglePlayError> {
        self.calls
            .lock()
            .unwrap()
            .push((product_id.to_string(), purchase_token.to_string()));

        match &self.response {
            Ok(purchase) => Ok(purchase.clone()),
            Err(status) => Err(GooglePlayError::Api {
                status: *status,
                body: "{\"error\":{\"message\":\"The purchase token is no longer valid.\"}}"
                    .to_string(),
            }),
        }
    }
}

/// verifyReceipt stand-in with one canned response per environment
pub struct FakeAppStore {
    production: AppStoreReceiptResponse,
    sandbox: AppStoreReceiptResponse,
    calls: Mutex<Vec<AppStoreEnvironment>>,
}

impl FakeAppStore {
    pub fn new(production: Value, sandbox: Value) -> Self {
        Self {
            production: serde_json::from_value(production).expect("Invalid production response"),
            sandbox: serde_json::from_value(sandbox).expect("Invalid sandbox response"),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Production answers with `response`; sandbox must not be reached
    pub fn production(response: Value) -> Self {
        Self::new(response, serde_json::json!({ "status": 21008 }))
    }

    pub fn calls(&self) -> Vec<AppStoreEnvironment> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReceiptVerifier for FakeAppStore {
    async fn verify_receipt(
        &self,
        _receipt_data: &str,
        environment: AppStoreEnvironment,
    ) -> Result<AppStoreReceiptResponse, AppStoreError> {
        self.calls.lock().unwrap().push(environment);

        Ok(match environment {
            AppStoreEnvironment::Production => self.production.clone(),
            AppStoreEnvironment::Sandbox => self.sandbox.clone(),
        })
    }
}

/// Verification service wired to fakes, with handles kept for assertions
pub struct Harness {
    pub google_play: Arc<FakeGooglePlay>,
    pub app_store: Arc<FakeAppStore>,
    pub store: Arc<MemoryDocumentStore>,
    pub service: VerificationService,
}

impl Harness {
    pub fn new(google_play: FakeGooglePlay, app_store: FakeAppStore) -> Self {
        let google_play = Arc::new(google_play);
        let app_store = Arc::new(app_store);
        let store = Arc::new(MemoryDocumentStore::new());

        let service = VerificationService::new(
            google_play.clone(),
            app_store.clone(),
            store.clone(),
        );

        Self {
            google_play,
            app_store,
            store,
            service,
        }
    }
}

pub fn purchased(order_id: &str) -> Value {
    serde_json::json!({
        "kind": "androidpublisher#productPurchase",
        "purchaseTimeMillis": "1700000000000",
        "purchaseState": 0,
        "consumptionState": 0,
        "orderId": order_id,
        "acknowledgementState": 1
    })
}

pub fn valid_receipt(products: &[(&str, &str)]) -> Value {
    let in_app: Vec<Value> = products
        .iter()
        .map(|(product_id, transaction_id)| {
            serde_json::json!({
                "quantity": "1",
                "product_id": product_id,
                "transaction_id": transaction_id,
                "original_transaction_id": transaction_id,
                "purchase_date_ms": "1700000000000"
            })
        })
        .collect();

    serde_json::json!({
        "status": 0,
        "environment": "Production",
        "receipt": { "bundle_id": "com.example.game", "in_app": in_app }
    })
}
