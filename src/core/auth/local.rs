//! In-process auth API
//!
//! [`LocalAuthApi`] answers the session manager directly from an
//! [`AuthService`], with optional simulated latency. Errors are classified
//! exactly as [`HttpAuthApi`](crate::core::auth::HttpAuthApi) would classify
//! the equivalent HTTP responses.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::auth::{
    ApiErrorBody, AuthApi, AuthError, AuthResponse, AuthService, Endpoint, LoginRequest,
    RegisterRequest, ServiceError, User, classify_failure,
};

/// [`AuthApi`] backed by an in-process [`AuthService`]
#[derive(Clone)]
pub struct LocalAuthApi {
    service: AuthService,
    latency: Duration,
}

impl LocalAuthApi {
    pub fn new(service: AuthService) -> Self {
        Self {
            service,
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn service(&self) -> &AuthService {
        &self.service
    }

    async fn simulate_network(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// Translate a service failure into what a client would see over HTTP
fn to_client_error(endpoint: Endpoint, err: ServiceError) -> AuthError {
    let (status, code) = err.status_and_code();
    let body = ApiErrorBody {
        error: Some(err.to_string()),
        message: None,
        code: Some(code.to_string()),
    };
    classify_failure(endpoint, status, Some(body))
}

#[async_trait]
impl AuthApi for LocalAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        self.simulate_network().await;
        self.service
            .login(request.clone())
            .await
            .map_err(|e| to_client_error(Endpoint::Login, e))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        self.simulate_network().await;
        self.service
            .register(request.clone())
            .await
            .map_err(|e| to_client_error(Endpoint::Register, e))
    }

    async fn current_user(&self, token: &str) -> Result<User, AuthError> {
        self.simulate_network().await;
        self.service
            .current_user(token)
            .await
            .map_err(|e| to_client_error(Endpoint::CurrentUser, e))
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.simulate_network().await;
        self.service
            .logout(token)
            .await
            .map_err(|e| to_client_error(Endpoint::Logout, e))
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.simulate_network().await;
        self.service
            .forgot_password(email)
            .await
            .map(|_| ())
            .map_err(|e| to_client_error(Endpoint::ForgotPassword, e))
    }
}
