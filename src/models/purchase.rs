use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ApiError, Result};

const MISSING_PARAMETERS: &str = "Missing required parameters";

fn missing_parameters() -> ApiError {
    ApiError::InvalidArgument(MISSING_PARAMETERS.to_string())
}

/// Payload of `verifyPurchase`
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPurchaseRequest {
    #[serde(default)]
    #[validate(required, length(min = 1))]
    pub purchase_token: Option<String>,
    #[serde(default)]
    #[validate(required, length(min = 1))]
    pub product_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Payload of `verifyAppleReceipt`
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAppleReceiptRequest {
    #[serde(default)]
    #[validate(required, length(min = 1))]
    pub receipt_data: Option<String>,
    #[serde(default)]
    #[validate(required, length(min = 1))]
    pub product_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Google Play purchase to verify, with required fields present
#[derive(Debug, Clone)]
pub struct GooglePurchaseInput {
    pub purchase_token: String,
    pub product_id: String,
    pub user_id: Option<String>,
}

/// App Store receipt to verify, with required fields present
#[derive(Debug, Clone)]
pub struct AppleReceiptInput {
    pub receipt_data: String,
    pub product_id: String,
    pub user_id: Option<String>,
}

impl VerifyPurchaseRequest {
    pub fn into_input(self) -> Result<GooglePurchaseInput> {
        self.validate().map_err(|_| missing_parameters())?;

        match (self.purchase_token, self.product_id) {
            (Some(purchase_token), Some(product_id)) => Ok(GooglePurchaseInput {
                purchase_token,
                product_id,
                user_id: self.user_id.filter(|id| !id.is_empty()),
            }),
            _ => Err(missing_parameters()),
        }
    }
}

impl VerifyAppleReceiptRequest {
    pub fn into_input(self) -> Result<AppleReceiptInput> {
        self.validate().map_err(|_| missing_parameters())?;

        match (self.receipt_data, self.product_id) {
            (Some(receipt_data), Some(product_id)) => Ok(AppleReceiptInput {
                receipt_data,
                product_id,
                user_id: self.user_id.filter(|id| !id.is_empty()),
            }),
            _ => Err(missing_parameters()),
        }
    }
}

/// Result of `verifyPurchase`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPurchaseResult {
    pub success: bool,
    pub verified: bool,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_time: Option<String>,
}

/// Result of `verifyAppleReceipt`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAppleReceiptResult {
    pub success: bool,
    pub verified: bool,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,
}
