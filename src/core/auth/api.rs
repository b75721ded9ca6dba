//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /api/auth/register - Register a new account
//! - POST /api/auth/login - Login and get a session token
//! - POST /api/auth/logout - Logout (revoke the bearer token)
//! - GET /api/auth/me - Get the account owning the bearer token
//! - POST /api/auth/forgot-password - Start a password reset
//! - POST /api/auth/reset-password - Complete a password reset

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use crate::core::auth::{
    AuthResponse, AuthService, ForgotPasswordRequest, LoginRequest, MessageResponse,
    RegisterRequest, ResetPasswordRequest, ServiceError, User,
};

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

impl ServiceError {
    /// HTTP status and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServiceError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            // A token whose account is gone is as dead as an unknown token
            ServiceError::UserNotFound => (StatusCode::UNAUTHORIZED, "USER_NOT_FOUND"),
            ServiceError::EmailAlreadyExists => (StatusCode::CONFLICT, "EMAIL_EXISTS"),
            ServiceError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            ServiceError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            ServiceError::SessionNotFound => (StatusCode::UNAUTHORIZED, "SESSION_NOT_FOUND"),
            ServiceError::NameRequired => (StatusCode::BAD_REQUEST, "NAME_REQUIRED"),
            ServiceError::PasswordTooShort => (StatusCode::BAD_REQUEST, "PASSWORD_TOO_SHORT"),
            ServiceError::InvalidEmail => (StatusCode::BAD_REQUEST, "INVALID_EMAIL"),
            ServiceError::RoleNotAllowed => (StatusCode::BAD_REQUEST, "ROLE_NOT_ALLOWED"),
            ServiceError::InvalidResetToken => (StatusCode::BAD_REQUEST, "INVALID_RESET_TOKEN"),
            ServiceError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Convert ServiceError to API response
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "auth request failed");
        }

        let body = ApiError::new(self.to_string(), code);

        (status, Json(body)).into_response()
    }
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/api/auth/forgot-password", post(forgot_password_handler))
        .route("/api/auth/reset-password", post(reset_password_handler))
        .with_state(state)
}

/// POST /api/auth/register
/// Register a new account
async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ServiceError> {
    tracing::info!("Registration attempt for email: {}", request.email);

    let response = state.auth_service.register(request).await?;

    tracing::info!("User registered successfully: {}", response.user.email);

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
/// Login and get a session token
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ServiceError> {
    tracing::info!("Login attempt for email: {}", request.email);

    let response = state.auth_service.login(request).await?;

    tracing::info!("User logged in successfully: {}", response.user.email);

    Ok(Json(response))
}

/// POST /api/auth/logout
/// Logout and revoke the bearer token
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ServiceError> {
    tracing::info!("Logout request");

    let token = extract_bearer_token(&headers)?;
    state.auth_service.logout(&token).await?;

    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// GET /api/auth/me
/// Get current user info from the bearer token
async fn me_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<User>, ServiceError> {
    let token = extract_bearer_token(&headers)?;

    let user = state.auth_service.current_user(&token).await?;

    Ok(Json(user))
}

/// POST /api/auth/forgot-password
/// Always succeeds so registered emails cannot be enumerated
async fn forgot_password_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ServiceError> {
    tracing::info!("Password reset requested");

    state
        .auth_service
        .forgot_password(request.email.trim())
        .await?;

    Ok(Json(MessageResponse {
        message: "If an account exists for that email, a reset link has been sent.".to_string(),
    }))
}

/// POST /api/auth/reset-password
/// Set a new password using a reset token
async fn reset_password_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state.auth_service.reset_password(request).await?;

    Ok(Json(MessageResponse {
        message: "Password updated. Please sign in again.".to_string(),
    }))
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ServiceError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServiceError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ServiceError::InvalidToken)?
        .trim();

    if token.is_empty() {
        return Err(ServiceError::InvalidToken);
    }

    Ok(token.to_string())
}
