use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub google_play: GooglePlayConfig,
    pub app_store: AppStoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret used to validate caller bearer tokens
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GooglePlayConfig {
    pub package_name: String,
    pub service_account_key_path: String,
    #[serde(default = "default_google_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_android_publisher_scope")]
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppStoreConfig {
    #[serde(default)]
    pub shared_secret: Option<String>,
    #[serde(default = "default_apple_production_url")]
    pub production_url: String,
    #[serde(default = "default_apple_sandbox_url")]
    pub sandbox_url: String,
}

fn default_google_api_base_url() -> String {
    "https://androidpublisher.googleapis.com".to_string()
}

fn default_android_publisher_scope() -> String {
    "https://www.googleapis.com/auth/androidpublisher".to_string()
}

fn default_apple_production_url() -> String {
    "https://buy.itunes.apple.com/verifyReceipt".to_string()
}

fn default_apple_sandbox_url() -> String {
    "https://sandbox.itunes.apple.com/verifyReceipt".to_string()
}

impl AppStoreConfig {
    /// Shared secret sent as `password` to verifyReceipt; must be configured
    pub fn shared_secret(&self) -> Result<&str, config::ConfigError> {
        match self.shared_secret.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(config::ConfigError::Message(
                "app_store.shared_secret must be set".to_string(),
            )),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("PURCHASE_VERIFIER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.app_store.shared_secret()?;

        Ok(config)
    }
}
