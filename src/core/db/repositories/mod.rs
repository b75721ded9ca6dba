//! In-memory repositories for the development auth API
//!
//! Repositories encapsulate data access and give the auth service a small,
//! storage-agnostic API. Clones share the same underlying maps.

pub mod reset;
pub mod session;
pub mod user;

pub use reset::{ResetTokenRepository, ResetTokenRepositoryError};
pub use session::{SessionRepository, SessionRepositoryError, hash_token};
pub use user::{UserRepository, UserRepositoryError};
