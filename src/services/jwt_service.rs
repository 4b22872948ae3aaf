use crate::{
    config::AuthConfig,
    error::{ApiError, Result},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Caller token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (caller uid)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Verifies caller tokens; issuing them is left to the identity provider
pub struct JWTService {
    decoding_key: DecodingKey,
}

impl JWTService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// Validate and decode a caller token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthenticated("Token has expired".to_string())
                }
                _ => ApiError::Unauthenticated(format!("Invalid token: {}", e)),
            })?;

        if token_data.claims.sub.is_empty() {
            return Err(ApiError::Unauthenticated(
                "Token has no subject".to_string(),
            ));
        }

        Ok(token_data.claims)
    }
}
