//! JWT utilities for session token generation and validation
//!
//! Session tokens are HS256-signed and carry the account's id, email and role.
//! A token is only honoured while its hash is also present in the session
//! registry (see `SessionRepository`), so logout revokes it before `exp`.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::Role;
use crate::core::config::Config;

/// Default session token lifetime (24 hours)
const SESSION_EXPIRATION_HOURS: i64 = 24;

/// Length of the per-process secret used when none is configured
const GENERATED_SECRET_LEN: usize = 48;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Session token expiration in hours
    pub expiration_hours: i64,
    /// Token issuer
    pub issuer: String,
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours: SESSION_EXPIRATION_HOURS,
            issuer: "agrimarket".to_string(),
        }
    }

    /// Configuration with a random secret; tokens die with the process
    pub fn random() -> Self {
        let secret: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_SECRET_LEN)
            .map(char::from)
            .collect();
        Self::new(secret)
    }

    /// Build from application config, generating a secret if none is set
    pub fn from_config(config: &Config) -> Self {
        let jwt = match &config.jwt_secret {
            Some(secret) => Self::new(secret.clone()),
            None => {
                tracing::warn!("JWT_SECRET not set; using a random per-process secret");
                Self::random()
            }
        };
        jwt.expiration(config.jwt_expiration_hours)
    }

    /// Set token expiration
    pub fn expiration(mut self, hours: i64) -> Self {
        self.expiration_hours = hours;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    /// Account email
    pub email: String,
    /// Role at the time the token was issued
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a session token, returning it with its expiry timestamp
    pub fn issue(&self, account_id: &str, email: &str, role: Role) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, exp.timestamp()))
    }

    /// Validate and decode a token
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        // Set leeway to 0 for strict expiration checking
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    pub fn expiration_hours(&self) -> i64 {
        self.config.expiration_hours
    }
}
