//! Authentication service
//!
//! Provides business logic for registration, login, logout, session lookup and
//! password reset. Coordinates between the account, session and reset-token
//! repositories and the JWT service.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::auth::jwt::{JwtError, JwtService};
use crate::core::auth::{AuthResponse, LoginRequest, RegisterRequest, ResetPasswordRequest, Role, User};
use crate::core::db::models::{Account, NewAccount};
use crate::core::db::repositories::{
    ResetTokenRepository, ResetTokenRepositoryError, SessionRepository, SessionRepositoryError,
    UserRepository, UserRepositoryError,
};

/// Minimum password length
const MIN_PASSWORD_LEN: usize = 6;

/// Period between sweeps of expired sessions
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Password shared by the seeded demo accounts
pub const DEMO_PASSWORD: &str = "harvest123";

/// Demo accounts, one per role
const DEMO_ACCOUNTS: [(&str, &str, Role); 3] = [
    ("Casey Consumer", "consumer@agrimarket.test", Role::Consumer),
    ("Fern Farmer", "farmer@agrimarket.test", Role::Farmer),
    ("Ada Admin", "admin@agrimarket.test", Role::Admin),
];

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Name is required")]
    NameRequired,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Account type must be consumer or farmer")]
    RoleNotAllowed,

    #[error("Reset link is invalid or has expired")]
    InvalidResetToken,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<UserRepositoryError> for ServiceError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => ServiceError::UserNotFound,
            UserRepositoryError::EmailAlreadyExists => ServiceError::EmailAlreadyExists,
            UserRepositoryError::InvalidPassword => ServiceError::InvalidCredentials,
            UserRepositoryError::HashingError(_) => ServiceError::InternalError(err.to_string()),
        }
    }
}

impl From<SessionRepositoryError> for ServiceError {
    fn from(err: SessionRepositoryError) -> Self {
        match err {
            SessionRepositoryError::NotFound => ServiceError::SessionNotFound,
            SessionRepositoryError::Expired => ServiceError::TokenExpired,
        }
    }
}

impl From<ResetTokenRepositoryError> for ServiceError {
    fn from(_: ResetTokenRepositoryError) -> Self {
        ServiceError::InvalidResetToken
    }
}

impl From<JwtError> for ServiceError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ServiceError::TokenExpired,
            JwtError::InvalidToken | JwtError::DecodingError(_) => ServiceError::InvalidToken,
            JwtError::EncodingError(_) => ServiceError::InternalError(err.to_string()),
        }
    }
}

impl ServiceError {
    /// Whether the error means the caller holds no valid session
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidToken
                | ServiceError::TokenExpired
                | ServiceError::SessionNotFound
                | ServiceError::UserNotFound
        )
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    session_repo: SessionRepository,
    reset_repo: ResetTokenRepository,
    jwt_service: JwtService,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        user_repo: UserRepository,
        session_repo: SessionRepository,
        reset_repo: ResetTokenRepository,
        jwt_service: JwtService,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            reset_repo,
            jwt_service,
        }
    }

    /// Service with empty repositories
    pub fn in_memory(jwt_service: JwtService) -> Self {
        Self::new(
            UserRepository::new(),
            SessionRepository::new(),
            ResetTokenRepository::new(),
            jwt_service,
        )
    }

    /// Validate email format
    fn validate_email(email: &str) -> Result<(), ServiceError> {
        // Check for valid structure: something@something.something
        let Some((local, domain)) = email.split_once('@') else {
            return Err(ServiceError::InvalidEmail);
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(ServiceError::InvalidEmail);
        }

        if !domain.contains('.') || domain.split('.').any(|part| part.is_empty()) {
            return Err(ServiceError::InvalidEmail);
        }

        if email.chars().any(char::is_whitespace) {
            return Err(ServiceError::InvalidEmail);
        }

        Ok(())
    }

    /// Validate password length
    fn validate_password(password: &str) -> Result<(), ServiceError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::PasswordTooShort);
        }

        Ok(())
    }

    /// Register a new account and open a session for it
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        let name = request.name.trim();
        let email = request.email.trim();

        // Validate input
        if name.is_empty() {
            return Err(ServiceError::NameRequired);
        }
        Self::validate_email(email)?;
        Self::validate_password(&request.password)?;

        // Admins are provisioned, never self-registered
        if request.user_type == Role::Admin {
            return Err(ServiceError::RoleNotAllowed);
        }

        // Create account (password will be hashed in repository)
        let account = self
            .user_repo
            .create(NewAccount {
                name: name.to_string(),
                email: email.to_string(),
                password: request.password,
                role: request.user_type,
            })
            .await?;

        tracing::info!(user_id = %account.id, role = %account.role, "account registered");
        self.open_session(&account).await
    }

    /// Login an existing account
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        // Unknown email and wrong password both cost a bcrypt verify and yield the same error
        let account = self
            .user_repo
            .authenticate(request.email.trim(), &request.password)
            .await
            .map_err(|err| match err {
                UserRepositoryError::NotFound | UserRepositoryError::InvalidPassword => {
                    ServiceError::InvalidCredentials
                }
                other => other.into(),
            })?;

        self.open_session(&account).await
    }

    /// Logout (revoke the session token)
    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        let account = self.resolve(token).await?;
        self.session_repo.delete_by_token(token).await?;

        tracing::info!(user_id = %account.id, "session revoked");
        Ok(())
    }

    /// Get the account owning a session token
    pub async fn current_user(&self, token: &str) -> Result<User, ServiceError> {
        Ok(self.resolve(token).await?.to_user())
    }

    /// Start a password reset.
    ///
    /// Succeeds whether or not the email is registered. The raw token, when
    /// one was issued, is returned to in-process callers for delivery.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>, ServiceError> {
        let Some(account) = self.user_repo.find_by_email(email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(None);
        };

        let token = self.reset_repo.create(&account.id).await?;
        tracing::info!(user_id = %account.id, "password reset issued");
        Ok(Some(token))
    }

    /// Complete a password reset and revoke every session of the account
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), ServiceError> {
        Self::validate_password(&request.password)?;

        let record = self.reset_repo.consume(&request.token).await?;
        self.user_repo
            .update_password(&record.account_id, &request.password)
            .await?;

        // Invalidate all existing sessions (force re-login)
        let revoked = self
            .session_repo
            .delete_all_for_user(&record.account_id)
            .await?;

        tracing::info!(user_id = %record.account_id, revoked, "password reset completed");
        Ok(())
    }

    /// Create the demo accounts that do not exist yet, returning how many were added
    pub async fn seed_demo_accounts(&self) -> Result<usize, ServiceError> {
        let mut created = 0;

        for (name, email, role) in DEMO_ACCOUNTS {
            if self.user_repo.find_by_email(email).await?.is_some() {
                continue;
            }

            self.user_repo
                .create(NewAccount {
                    name: name.to_string(),
                    email: email.to_string(),
                    password: DEMO_PASSWORD.to_string(),
                    role,
                })
                .await?;
            created += 1;
        }

        Ok(created)
    }

    /// Drop expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<usize, ServiceError> {
        Ok(self.session_repo.cleanup_expired().await?)
    }

    /// Start a background task that sweeps expired sessions every `period`
    pub fn spawn_session_sweep(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                match service.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "swept expired sessions"),
                    Err(err) => tracing::warn!(error = %err, "session sweep failed"),
                }
            }
        })
    }

    async fn open_session(&self, account: &Account) -> Result<AuthResponse, ServiceError> {
        let (token, expires_at) = self
            .jwt_service
            .issue(&account.id, &account.email, account.role)?;

        let expires_at = DateTime::<Utc>::from_timestamp(expires_at, 0)
            .ok_or_else(|| ServiceError::InternalError("token expiry out of range".to_string()))?;

        self.session_repo
            .create(&account.id, &token, expires_at)
            .await?;

        Ok(AuthResponse {
            token,
            user: account.to_user(),
        })
    }

    /// Verify the signature, then the registry, then re-read the account
    async fn resolve(&self, token: &str) -> Result<Account, ServiceError> {
        let claims = self.jwt_service.validate(token)?;
        let session = self.session_repo.validate_token(token).await?;

        if session.account_id != claims.sub {
            return Err(ServiceError::InvalidToken);
        }

        self.user_repo
            .find_by_id(&session.account_id)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }
}
