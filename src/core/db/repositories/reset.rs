//! Password-reset token repository
//!
//! Tokens are random, single-use and short-lived. Like session tokens they are
//! stored only as SHA-256 hashes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;

use crate::core::db::models::ResetTokenRecord;
use crate::core::db::repositories::hash_token;

/// Reset token lifetime (1 hour)
const RESET_TOKEN_EXPIRATION_MINUTES: i64 = 60;

/// Random bytes per reset token (hex-encoded for the link)
const RESET_TOKEN_BYTES: usize = 32;

/// Reset token repository error types
#[derive(Debug, thiserror::Error)]
pub enum ResetTokenRepositoryError {
    #[error("Reset token not found")]
    NotFound,

    #[error("Reset token expired")]
    Expired,
}

/// Outstanding reset tokens keyed by token hash
#[derive(Clone, Default)]
pub struct ResetTokenRepository {
    tokens: Arc<DashMap<String, ResetTokenRecord>>,
}

impl ResetTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for an account, replacing any earlier one.
    ///
    /// Returns the raw token, which is never stored.
    pub async fn create(&self, account_id: &str) -> Result<String, ResetTokenRepositoryError> {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let raw_token = hex::encode(bytes);

        self.tokens
            .retain(|_, record| record.account_id != account_id);

        let now = Utc::now();
        let record = ResetTokenRecord {
            account_id: account_id.to_string(),
            token_hash: hash_token(&raw_token),
            expires_at: now + Duration::minutes(RESET_TOKEN_EXPIRATION_MINUTES),
            created_at: now,
        };
        self.tokens.insert(record.token_hash.clone(), record);

        Ok(raw_token)
    }

    /// Redeem a token. It is removed whether or not it was still valid.
    pub async fn consume(
        &self,
        raw_token: &str,
    ) -> Result<ResetTokenRecord, ResetTokenRepositoryError> {
        let (_, record) = self
            .tokens
            .remove(&hash_token(raw_token))
            .ok_or(ResetTokenRepositoryError::NotFound)?;

        if record.is_expired() {
            return Err(ResetTokenRepositoryError::Expired);
        }

        Ok(record)
    }

    /// Number of outstanding tokens
    pub async fn count(&self) -> usize {
        self.tokens.len()
    }
}
