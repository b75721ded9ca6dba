//! Account repository
//!
//! Stores accounts in memory with secure password hashing using bcrypt.
//! Emails are unique case-insensitively.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::core::db::models::{Account, NewAccount};

/// Cost factor for bcrypt hashing (12 is recommended for production)
const BCRYPT_COST: u32 = 12;

const DUMMY_PASSWORD: &str = "agrimarket-no-such-account";

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Password hashing failed: {0}")]
    HashingError(String),
}

/// Account storage keyed by id, with an email index
#[derive(Clone)]
pub struct UserRepository {
    accounts: Arc<DashMap<String, Account>>,
    emails: Arc<DashMap<String, String>>,
    bcrypt_cost: u32,
    /// Verified against when the email is unknown, so both misses cost a bcrypt round
    dummy_hash: Arc<OnceLock<String>>,
}

impl UserRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::with_bcrypt_cost(BCRYPT_COST)
    }

    /// Create an empty repository hashing with `cost`
    pub fn with_bcrypt_cost(cost: u32) -> Self {
        Self {
            accounts: Arc::new(DashMap::new()),
            emails: Arc::new(DashMap::new()),
            bcrypt_cost: cost,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Hash a password using bcrypt with automatic salt generation
    pub fn hash_password(&self, password: &str) -> Result<String, UserRepositoryError> {
        bcrypt::hash(password, self.bcrypt_cost)
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, UserRepositoryError> {
        bcrypt::verify(password, hash).map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Create a new account with a plain text password (will be hashed)
    pub async fn create(&self, account: NewAccount) -> Result<Account, UserRepositoryError> {
        let key = email_key(&account.email);
        if self.emails.contains_key(&key) {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        // Hash the password with bcrypt (includes automatic salt)
        let password_hash = self.hash_password(&account.password)?;

        let now = Utc::now();
        let created = Account {
            id: Uuid::new_v4().to_string(),
            name: account.name,
            email: account.email,
            password_hash,
            role: account.role,
            profile_image: None,
            created_at: now,
            updated_at: now,
        };

        // Re-check under the entry lock; another registration may have won
        match self.emails.entry(key) {
            Entry::Occupied(_) => Err(UserRepositoryError::EmailAlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(created.id.clone());
                self.accounts.insert(created.id.clone(), created.clone());
                Ok(created)
            }
        }
    }

    /// Find an account by ID
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Account>, UserRepositoryError> {
        Ok(self.accounts.get(id).map(|account| account.clone()))
    }

    /// Find an account by email (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, UserRepositoryError> {
        let id = match self.emails.get(&email_key(email)) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        self.find_by_id(&id).await
    }

    /// Replace an account's password
    pub async fn update_password(
        &self,
        id: &str,
        new_password: &str,
    ) -> Result<Account, UserRepositoryError> {
        let password_hash = self.hash_password(new_password)?;

        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or(UserRepositoryError::NotFound)?;
        account.password_hash = password_hash;
        account.updated_at = Utc::now();

        Ok(account.clone())
    }

    /// Verify credentials, returning the account when they match
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Account, UserRepositoryError> {
        let Some(account) = self.find_by_email(email).await? else {
            let dummy = match self.dummy_hash.get() {
                Some(hash) => hash,
                None => {
                    let hash = self.hash_password(DUMMY_PASSWORD)?;
                    self.dummy_hash.get_or_init(|| hash)
                }
            };
            Self::verify_password(password, dummy)?;
            return Err(UserRepositoryError::NotFound);
        };

        if !Self::verify_password(password, &account.password_hash)? {
            return Err(UserRepositoryError::InvalidPassword);
        }

        Ok(account)
    }

    /// Count accounts
    pub async fn count(&self) -> usize {
        self.accounts.len()
    }
}

impl Default for UserRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}
