//! Storage for the development auth API
//!
//! Accounts, session tokens and password-reset tokens live in process memory
//! (`DashMap`), so every restart begins with an empty store plus the
//! optional demo accounts.

pub mod models;
pub mod repositories;

// Re-export commonly used items
pub use models::*;
pub use repositories::{
    ResetTokenRepository, ResetTokenRepositoryError, SessionRepository, SessionRepositoryError,
    UserRepository, UserRepositoryError, hash_token,
};
