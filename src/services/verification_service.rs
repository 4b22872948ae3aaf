use anyhow::anyhow;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{error, info, instrument};

use crate::{
    error::{ApiError, Result},
    models::{
        common::{CallerContext, Platform},
        purchase::{
            AppleReceiptInput, GooglePurchaseInput, VerifyAppleReceiptRequest,
            VerifyAppleReceiptResult, VerifyPurchaseRequest, VerifyPurchaseResult,
        },
        records::{
            AndroidPurchase, IosPurchase, PurchaseDetails, PurchaseRecord, UserPurchaseStatus,
            ANONYMOUS_USER, PURCHASES_COLLECTION, USERS_COLLECTION,
        },
    },
    services::{
        app_store_service::{ReceiptVerifier, STATUS_OK},
        document_store::DocumentStore,
        google_play_service::{
            ProductPurchaseApi, CONSUMPTION_STATE_CONSUMED, PURCHASE_STATE_PURCHASED,
        },
    },
    utils::fingerprint,
};

/// Validates purchases with the stores and records the verified ones
pub struct VerificationService {
    google_play: Arc<dyn ProductPurchaseApi>,
    app_store: Arc<dyn ReceiptVerifier>,
    store: Arc<dyn DocumentStore>,
}

impl VerificationService {
    pub fn new(
        google_play: Arc<dyn ProductPurchaseApi>,
        app_store: Arc<dyn ReceiptVerifier>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            google_play,
            app_store,
            store,
        }
    }

    /// `verifyPurchase`: Google Play one-time product
    #[instrument(skip_all)]
    pub async fn verify_purchase(
        &self,
        caller: &CallerContext,
        request: VerifyPurchaseRequest,
    ) -> Result<VerifyPurchaseResult> {
        let result = match request.into_input() {
            Ok(input) => self.verify_google_purchase(caller, input).await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            error!(error = %e, "Error verifying purchase");
            e.at_boundary("Failed to verify purchase")
        })
    }

    /// `verifyAppleReceipt`: App Store receipt containing the product
    #[instrument(skip_all)]
    pub async fn verify_apple_receipt(
        &self,
        caller: &CallerContext,
        request: VerifyAppleReceiptRequest,
    ) -> Result<VerifyAppleReceiptResult> {
        let result = match request.into_input() {
            Ok(input) => self.verify_app_store_receipt(caller, input).await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            error!(error = %e, "Error verifying Apple receipt");
            e.at_boundary("Failed to verify receipt")
        })
    }

    async fn verify_google_purchase(
        &self,
        caller: &CallerContext,
        input: GooglePurchaseInput,
    ) -> Result<VerifyPurchaseResult> {
        let purchase = self
            .google_play
            .get_product_purchase(&input.product_id, &input.purchase_token)
            .await?;

        if purchase.purchase_state != Some(PURCHASE_STATE_PURCHASED) {
            return Err(ApiError::FailedPrecondition(
                "Purchase is not in purchased state".to_string(),
            ));
        }

        // Non-consumables must stay unconsumed to remain entitled
        if purchase.consumption_state == Some(CONSUMPTION_STATE_CONSUMED) {
            return Err(ApiError::FailedPrecondition(
                "Purchase has already been consumed".to_string(),
            ));
        }

        let order_id = purchase
            .order_id
            .clone()
            .ok_or_else(|| anyhow!("Google Play purchase has no orderId"))?;

        let user_id = caller.resolve_user_id(input.user_id.as_deref());
        let record = PurchaseRecord {
            product_id: input.product_id.clone(),
            user_id: user_id.unwrap_or(ANONYMOUS_USER).to_string(),
            verified_at: OffsetDateTime::now_utc(),
            platform: Platform::Android,
            details: PurchaseDetails::Android(AndroidPurchase {
                purchase_token: input.purchase_token.clone(),
                order_id: order_id.clone(),
                purchase_time: purchase.purchase_time_millis.clone(),
                purchase_state: purchase.purchase_state,
                consumption_state: purchase.consumption_state,
            }),
        };

        self.save(&record, user_id).await?;

        info!(
            order_id = %order_id,
            product_id = %input.product_id,
            token = %fingerprint(&input.purchase_token),
            "Verified Google Play purchase"
        );

        Ok(VerifyPurchaseResult {
            success: true,
            verified: true,
            order_id,
            purchase_time: purchase.purchase_time_millis,
        })
    }

    async fn verify_app_store_receipt(
        &self,
        caller: &CallerContext,
        input: AppleReceiptInput,
    ) -> Result<VerifyAppleReceiptResult> {
        let response = self
            .app_store
            .verify_with_sandbox_fallback(&input.receipt_data)
            .await?;

        if response.status != STATUS_OK {
            return Err(ApiError::FailedPrecondition(format!(
                "App Store verification failed with status: {}",
                response.status
            )));
        }

        let receipt = response
            .receipt
            .ok_or_else(|| anyhow!("App Store response has no receipt"))?;

        let purchase = receipt
            .in_app
            .into_iter()
            .find(|p| p.product_id == input.product_id)
            .ok_or_else(|| ApiError::NotFound("Product not found in receipt".to_string()))?;

        let user_id = caller.resolve_user_id(input.user_id.as_deref());
        let record = PurchaseRecord {
            product_id: input.product_id.clone(),
            user_id: user_id.unwrap_or(ANONYMOUS_USER).to_string(),
            verified_at: OffsetDateTime::now_utc(),
            platform: Platform::Ios,
            details: PurchaseDetails::Ios(IosPurchase {
                transaction_id: purchase.transaction_id.clone(),
                original_transaction_id: purchase.original_transaction_id,
                purchase_date: purchase.purchase_date_ms.clone(),
            }),
        };

        self.save(&record, user_id).await?;

        info!(
            transaction_id = %purchase.transaction_id,
            product_id = %input.product_id,
            receipt = %fingerprint(&input.receipt_data),
            "Verified App Store receipt"
        );

        Ok(VerifyAppleReceiptResult {
            success: true,
            verified: true,
            transaction_id: purchase.transaction_id,
            purchase_date: purchase.purchase_date_ms,
        })
    }

    /// Merge the purchase record, then the user's entitlement map.
    ///
    /// The two writes are independent; the user map can be rebuilt from
    /// `purchases` if the second one fails.
    async fn save(&self, record: &PurchaseRecord, user_id: Option<&str>) -> Result<()> {
        self.store
            .merge(
                PURCHASES_COLLECTION,
                record.document_id(),
                record.to_document()?,
            )
            .await?;

        if let Some(user_id) = user_id {
            self.store
                .merge(
                    USERS_COLLECTION,
                    user_id,
                    UserPurchaseStatus::for_record(record).to_document()?,
                )
                .await?;
        }

        Ok(())
    }
}
