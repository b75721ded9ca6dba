//! Stored entities for the development auth API

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::auth::{Role, User};

// ============================================================================
// Account Model
// ============================================================================

/// Registered account, including its password hash
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Public view of the account as sent to clients
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            profile_image: self.profile_image.clone(),
        }
    }
}

/// Account data for creation (password not yet hashed)
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

// ============================================================================
// Session Model
// ============================================================================

/// Live session; only the SHA-256 of the token is kept
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub account_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

// ============================================================================
// Reset Token Model
// ============================================================================

/// Outstanding password-reset token, stored hashed
#[derive(Debug, Clone)]
pub struct ResetTokenRecord {
    pub account_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ResetTokenRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
