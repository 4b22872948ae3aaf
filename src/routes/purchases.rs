use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::{instrument, warn};

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::{
        common::{CallableRequest, CallableResponse, CallerContext},
        purchase::{
            VerifyAppleReceiptRequest, VerifyAppleReceiptResult, VerifyPurchaseRequest,
            VerifyPurchaseResult,
        },
    },
};

fn invalid_body(rejection: JsonRejection) -> ApiError {
    warn!("Rejected callable body: {}", rejection.body_text());
    ApiError::InvalidArgument(format!("Invalid request body: {}", rejection.body_text()))
}

/// POST /verifyPurchase
#[instrument(skip(state, payload))]
pub async fn verify_purchase(
    State(state): State<AppState>,
    caller: CallerContext,
    payload: std::result::Result<Json<CallableRequest<VerifyPurchaseRequest>>, JsonRejection>,
) -> Result<Json<CallableResponse<VerifyPurchaseResult>>> {
    let Json(request) = payload.map_err(invalid_body)?;

    let result = state
        .verification_service
        .verify_purchase(&caller, request.data)
        .await?;

    Ok(Json(CallableResponse::new(result)))
}

/// POST /verifyAppleReceipt
#[instrument(skip(state, payload))]
pub async fn verify_apple_receipt(
    State(state): State<AppState>,
    caller: CallerContext,
    payload: std::result::Result<Json<CallableRequest<VerifyAppleReceiptRequest>>, JsonRejection>,
) -> Result<Json<CallableResponse<VerifyAppleReceiptResult>>> {
    let Json(request) = payload.map_err(invalid_body)?;

    let result = state
        .verification_service
        .verify_apple_receipt(&caller, request.data)
        .await?;

    Ok(Json(CallableResponse::new(result)))
}
