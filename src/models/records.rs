use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

use super::common::Platform;

/// Collection holding one document per verified purchase
pub const PURCHASES_COLLECTION: &str = "purchases";
/// Collection holding one document per user
pub const USERS_COLLECTION: &str = "users";
/// Attribution used when neither an explicit nor an authenticated user id exists
pub const ANONYMOUS_USER: &str = "anonymous";

/// Verified purchase, keyed by the platform's order or transaction id
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub product_id: String,
    pub user_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub verified_at: OffsetDateTime,
    pub platform: Platform,
    #[serde(flatten)]
    pub details: PurchaseDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PurchaseDetails {
    Android(AndroidPurchase),
    Ios(IosPurchase),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidPurchase {
    pub purchase_token: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_state: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption_state: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IosPurchase {
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,
}

impl PurchaseRecord {
    /// Document id in the purchases collection
    pub fn document_id(&self) -> &str {
        match &self.details {
            PurchaseDetails::Android(purchase) => &purchase.order_id,
            PurchaseDetails::Ios(purchase) => &purchase.transaction_id,
        }
    }

    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Per-user mapping from product id to entitlement, merged into the user document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPurchaseStatus {
    pub purchases: BTreeMap<String, ProductEntitlement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductEntitlement {
    pub purchased: bool,
    #[serde(flatten)]
    pub reference: EntitlementReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntitlementReference {
    Android {
        #[serde(rename = "orderId")]
        order_id: String,
        #[serde(rename = "purchaseTime", skip_serializing_if = "Option::is_none")]
        purchase_time: Option<String>,
    },
    Ios {
        #[serde(rename = "transactionId")]
        transaction_id: String,
        #[serde(rename = "purchaseDate", skip_serializing_if = "Option::is_none")]
        purchase_date: Option<String>,
    },
}

impl UserPurchaseStatus {
    /// Entitlement entry for the product a record was verified for
    pub fn for_record(record: &PurchaseRecord) -> Self {
        let reference = match &record.details {
            PurchaseDetails::Android(purchase) => EntitlementReference::Android {
                order_id: purchase.order_id.clone(),
                purchase_time: purchase.purchase_time.clone(),
            },
            PurchaseDetails::Ios(purchase) => EntitlementReference::Ios {
                transaction_id: purchase.transaction_id.clone(),
                purchase_date: purchase.purchase_date.clone(),
            },
        };

        let mut purchases = BTreeMap::new();
        purchases.insert(
            record.product_id.clone(),
            ProductEntitlement {
                purchased: true,
                reference,
            },
        );

        Self { purchases }
    }

    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
