//! Session repository for issued session tokens
//!
//! Handles storage and validation of session tokens. Tokens are stored as
//! SHA-256 hashes for security, so a leaked registry cannot be replayed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::db::models::SessionRecord;

/// Session repository error types
#[derive(Debug, thiserror::Error)]
pub enum SessionRepositoryError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,
}

/// Hash a token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Live sessions keyed by token hash
#[derive(Clone, Default)]
pub struct SessionRepository {
    sessions: Arc<DashMap<String, SessionRecord>>,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `raw_token`; only its hash is kept
    pub async fn create(
        &self,
        account_id: &str,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, SessionRepositoryError> {
        let record = SessionRecord {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            token_hash: hash_token(raw_token),
            expires_at,
            created_at: Utc::now(),
        };

        self.sessions
            .insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }

    /// Find a session by its raw token
    pub async fn find_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<SessionRecord>, SessionRepositoryError> {
        Ok(self
            .sessions
            .get(&hash_token(raw_token))
            .map(|record| record.clone()))
    }

    /// Resolve a raw token to a live session, dropping it if expired
    pub async fn validate_token(
        &self,
        raw_token: &str,
    ) -> Result<SessionRecord, SessionRepositoryError> {
        let token_hash = hash_token(raw_token);
        let record = self
            .sessions
            .get(&token_hash)
            .map(|record| record.clone())
            .ok_or(SessionRepositoryError::NotFound)?;

        if record.is_expired() {
            self.sessions.remove(&token_hash);
            return Err(SessionRepositoryError::Expired);
        }

        Ok(record)
    }

    /// Delete a session by its raw token
    pub async fn delete_by_token(&self, raw_token: &str) -> Result<bool, SessionRepositoryError> {
        Ok(self.sessions.remove(&hash_token(raw_token)).is_some())
    }

    /// Delete every session belonging to an account
    pub async fn delete_all_for_user(&self, account_id: &str) -> Result<usize, SessionRepositoryError> {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, record| record.account_id != account_id);
        Ok(before - self.sessions.len())
    }

    /// Drop expired sessions
    pub async fn cleanup_expired(&self) -> Result<usize, SessionRepositoryError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, record| !record.is_expired());
        Ok(before - self.sessions.len())
    }

    /// Count live sessions for an account
    pub async fn count_user_sessions(&self, account_id: &str) -> usize {
        self.sessions
            .iter()
            .filter(|record| record.account_id == account_id)
            .count()
    }
}
