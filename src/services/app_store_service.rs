use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{config::AppStoreConfig, utils::fingerprint};

/// Receipt is valid
pub const STATUS_OK: i64 = 0;
/// Sandbox receipt sent to the production endpoint
pub const STATUS_SANDBOX_RECEIPT: i64 = 21007;

#[derive(Debug, thiserror::Error)]
pub enum AppStoreError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid response from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStoreEnvironment {
    Production,
    Sandbox,
}

/// Body POSTed to verifyReceipt
#[derive(Debug, Serialize)]
pub struct AppStoreReceiptRequest<'a> {
    #[serde(rename = "receipt-data")]
    pub receipt_data: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppStoreReceiptResponse {
    pub status: i64,
    #[serde(default)]
    pub receipt: Option<AppStoreReceipt>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppStoreReceipt {
    #[serde(default)]
    pub in_app: Vec<AppStoreInAppPurchase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppStoreInAppPurchase {
    pub product_id: String,
    pub transaction_id: String,
    #[serde(default)]
    pub original_transaction_id: Option<String>,
    #[serde(default)]
    pub purchase_date_ms: Option<String>,
}

#[async_trait]
pub trait ReceiptVerifier: Send + Sync {
    /// Submit a receipt to one verifyReceipt environment
    async fn verify_receipt(
        &self,
        receipt_data: &str,
        environment: AppStoreEnvironment,
    ) -> Result<AppStoreReceiptResponse, AppStoreError>;

    /// Verify against production, resubmitting once to sandbox on status 21007
    async fn verify_with_sandbox_fallback(
        &self,
        receipt_data: &str,
    ) -> Result<AppStoreReceiptResponse, AppStoreError> {
        let response = self
            .verify_receipt(receipt_data, AppStoreEnvironment::Production)
            .await?;

        if response.status != STATUS_SANDBOX_RECEIPT {
            return Ok(response);
        }

        info!("Sandbox receipt sent to production, retrying against sandbox");
        self.verify_receipt(receipt_data, AppStoreEnvironment::Sandbox)
            .await
    }
}

/// verifyReceipt client
pub struct AppStoreClient {
    http_client: reqwest::Client,
    production_url: String,
    sandbox_url: String,
    shared_secret: String,
}

impl AppStoreClient {
    pub fn new(config: &AppStoreConfig) -> Result<Self, config::ConfigError> {
        Ok(Self {
            http_client: reqwest::Client::new(),
            production_url: config.production_url.clone(),
            sandbox_url: config.sandbox_url.clone(),
            shared_secret: config.shared_secret()?.to_string(),
        })
    }

    fn endpoint(&self, environment: AppStoreEnvironment) -> &str {
        match environment {
            AppStoreEnvironment::Production => &self.production_url,
            AppStoreEnvironment::Sandbox => &self.sandbox_url,
        }
    }
}

#[async_trait]
impl ReceiptVerifier for AppStoreClient {
    #[instrument(skip(self, receipt_data), fields(receipt = %fingerprint(receipt_data)))]
    async fn verify_receipt(
        &self,
        receipt_data: &str,
        environment: AppStoreEnvironment,
    ) -> Result<AppStoreReceiptResponse, AppStoreError> {
        let endpoint = self.endpoint(environment);
        let transport = |source| AppStoreError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let request_body = AppStoreReceiptRequest {
            receipt_data,
            password: &self.shared_secret,
        };

        let body = self
            .http_client
            .post(endpoint)
            .json(&request_body)
            .send()
            .await
            .map_err(transport)?
            .text()
            .await
            .map_err(transport)?;

        let response: AppStoreReceiptResponse =
            serde_json::from_str(&body).map_err(|source| AppStoreError::Parse {
                endpoint: endpoint.to_string(),
                source,
            })?;

        info!(
            environment = ?environment,
            status = response.status,
            "App Store verification response"
        );

        Ok(response)
    }
}
