use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::{config::GooglePlayConfig, utils::fingerprint};

/// `purchaseState`: 0 = purchased, 1 = canceled, 2 = pending
pub const PURCHASE_STATE_PURCHASED: i32 = 0;
/// `consumptionState`: 0 = yet to be consumed, 1 = consumed
pub const CONSUMPTION_STATE_CONSUMED: i32 = 1;

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime requested for the signed assertion
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh cached access tokens this long before Google expires them
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum GooglePlayError {
    #[error("failed to read service account key {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    #[error("failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    TokenRejected { status: u16, body: String },

    #[error("Android Publisher API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("invalid response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fields of a Google service-account JSON key that token exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &str) -> Result<Self, GooglePlayError> {
        let contents = std::fs::read_to_string(path).map_err(|source| GooglePlayError::KeyFile {
            path: path.to_string(),
            source,
        })?;

        serde_json::from_str(&contents)
            .map_err(|e| GooglePlayError::InvalidKey(format!("{}: {}", path, e)))
    }
}

/// Product purchase resource (androidpublisher v3), subset we act on
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPurchase {
    #[serde(default)]
    pub purchase_time_millis: Option<String>,
    #[serde(default)]
    pub purchase_state: Option<i32>,
    #[serde(default)]
    pub consumption_state: Option<i32>,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, GooglePlayError>;
}

#[async_trait]
pub trait ProductPurchaseApi: Send + Sync {
    /// Look up a one-time product purchase by product id and token
    async fn get_product_purchase(
        &self,
        product_id: &str,
        purchase_token: &str,
    ) -> Result<ProductPurchase, GooglePlayError>;
}

/// JWT assertion claims for the OAuth 2.0 service-account flow
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: OffsetDateTime,
}

/// Exchanges signed service-account assertions for access tokens
pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    pub fn new(key: ServiceAccountKey, scope: &str) -> Result<Self, GooglePlayError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| GooglePlayError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key,
            encoding_key,
            scope: scope.to_string(),
            http_client: reqwest::Client::new(),
            cache: RwLock::new(None),
        })
    }

    /// Signed RS256 assertion presented to the token endpoint
    pub fn sign_assertion(&self, now: OffsetDateTime) -> Result<String, GooglePlayError> {
        let iat = now.unix_timestamp();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    async fn fetch_token(&self) -> Result<CachedToken, GooglePlayError> {
        let now = OffsetDateTime::now_utc();
        let assertion = self.sign_assertion(now)?;

        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GooglePlayError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        info!(
            client_email = %self.key.client_email,
            expires_in = token.expires_in,
            "Obtained Google API access token"
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String, GooglePlayError> {
        let fresh_until = OffsetDateTime::now_utc() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > fresh_until {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > fresh_until {
                return Ok(cached.access_token.clone());
            }
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);

        Ok(access_token)
    }
}

/// Android Publisher API client scoped to one package
pub struct GooglePlayClient {
    http_client: reqwest::Client,
    api_base_url: String,
    package_name: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GooglePlayClient {
    pub fn new(
        api_base_url: &str,
        package_name: &str,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base_url: api_base_url.to_string(),
            package_name: package_name.to_string(),
            tokens,
        }
    }

    /// Client authenticated with the configured service-account key
    pub fn from_config(config: &GooglePlayConfig) -> Result<Self, GooglePlayError> {
        let key = ServiceAccountKey::from_file(&config.service_account_key_path)?;
        let tokens = ServiceAccountTokenProvider::new(key, &config.scope)?;

        Ok(Self::new(
            &config.api_base_url,
            &config.package_name,
            Arc::new(tokens),
        ))
    }

    /// `.../applications/{package}/purchases/products/{productId}/tokens/{token}`
    pub fn product_purchase_url(
        &self,
        product_id: &str,
        purchase_token: &str,
    ) -> Result<reqwest::Url, GooglePlayError> {
        let mut url = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| GooglePlayError::InvalidUrl(e.to_string()))?;

        url.path_segments_mut()
            .map_err(|_| GooglePlayError::InvalidUrl(self.api_base_url.clone()))?
            .pop_if_empty()
            .extend([
                "androidpublisher",
                "v3",
                "applications",
                self.package_name.as_str(),
                "purchases",
                "products",
                product_id,
                "tokens",
                purchase_token,
            ]);

        Ok(url)
    }
}

#[async_trait]
impl ProductPurchaseApi for GooglePlayClient {
    #[instrument(skip(self, purchase_token), fields(token = %fingerprint(purchase_token)))]
    async fn get_product_purchase(
        &self,
        product_id: &str,
        purchase_token: &str,
    ) -> Result<ProductPurchase, GooglePlayError> {
        let url = self.product_purchase_url(product_id, purchase_token)?;
        let access_token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GooglePlayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let purchase: ProductPurchase = serde_json::from_str(&body)?;
        debug!(
            purchase_state = ?purchase.purchase_state,
            consumption_state = ?purchase.consumption_state,
            "Fetched Google Play product purchase"
        );

        Ok(purchase)
    }
}
