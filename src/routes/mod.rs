// Route modules
pub mod purchases;

use crate::{
    app_state::AppState,
    middleware::{caller_auth_middleware, logging_middleware},
};
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // Callable endpoints; caller identity is optional
    let callable_routes = Router::new()
        .route("/verifyPurchase", post(purchases::verify_purchase))
        .route("/verifyAppleReceipt", post(purchases::verify_apple_receipt))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            caller_auth_middleware,
        ))
        .layer(cors);

    Router::new()
        .merge(callable_routes)
        .route("/health", get(health))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
