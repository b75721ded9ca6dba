//! Auth API client
//!
//! [`AuthApi`] is the seam between the session manager and whatever answers
//! `/api/auth/*`. [`HttpAuthApi`] talks to a real server with `reqwest`;
//! `LocalAuthApi` (server feature) answers in-process.
//!
//! ERROR MAPPING
//! =============
//! Status codes are classified per endpoint: a 401 from login means bad
//! credentials, a 401 from `me`/logout means the token is dead, any other 4xx
//! from register is a validation failure carrying the server's message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::core::auth::{
    ApiErrorBody, AuthError, AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    User,
};
use crate::core::config::Config;

/// Operations the session manager needs from the auth backend
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError>;

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError>;

    /// Resolve the user owning `token`
    async fn current_user(&self, token: &str) -> Result<User, AuthError>;

    async fn logout(&self, token: &str) -> Result<(), AuthError>;

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError>;
}

/// Auth endpoints consumed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    CurrentUser,
    Logout,
    ForgotPassword,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Login => "/api/auth/login",
            Endpoint::Register => "/api/auth/register",
            Endpoint::CurrentUser => "/api/auth/me",
            Endpoint::Logout => "/api/auth/logout",
            Endpoint::ForgotPassword => "/api/auth/forgot-password",
        }
    }
}

/// Map a non-success response to the client error taxonomy
pub fn classify_failure(
    endpoint: Endpoint,
    status: StatusCode,
    body: Option<ApiErrorBody>,
) -> AuthError {
    let message = body.and_then(ApiErrorBody::into_message);

    match endpoint {
        Endpoint::Login if status == StatusCode::UNAUTHORIZED => AuthError::InvalidCredentials,
        Endpoint::CurrentUser | Endpoint::Logout if status == StatusCode::UNAUTHORIZED => {
            AuthError::Unauthenticated
        }
        Endpoint::Register | Endpoint::Login | Endpoint::ForgotPassword
            if status.is_client_error() =>
        {
            AuthError::Validation(message.unwrap_or_else(|| match endpoint {
                Endpoint::Register => "Registration failed. Please check your details.".to_string(),
                _ => "The request was rejected. Please check your details.".to_string(),
            }))
        }
        _ => AuthError::Unknown(message.unwrap_or_else(|| format!("HTTP {status}"))),
    }
}

/// `reqwest`-backed [`AuthApi`]
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Unknown(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        Self::new(&config.api_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Send the request and turn non-2xx responses into [`AuthError`]
    async fn dispatch(
        &self,
        endpoint: Endpoint,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AuthError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(endpoint = endpoint.path(), error = %e, "auth request failed");
            AuthError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ApiErrorBody>().await.ok();
        tracing::debug!(endpoint = endpoint.path(), %status, "auth request rejected");
        Err(classify_failure(endpoint, status, body))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let builder = self.client.post(self.url(Endpoint::Login)).json(request);
        let response = self.dispatch(Endpoint::Login, builder).await?;
        Ok(response.json::<AuthResponse>().await?)
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        let builder = self.client.post(self.url(Endpoint::Register)).json(request);
        let response = self.dispatch(Endpoint::Register, builder).await?;
        Ok(response.json::<AuthResponse>().await?)
    }

    async fn current_user(&self, token: &str) -> Result<User, AuthError> {
        let builder = self
            .client
            .get(self.url(Endpoint::CurrentUser))
            .bearer_auth(token);
        let response = self.dispatch(Endpoint::CurrentUser, builder).await?;
        Ok(response.json::<User>().await?)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let builder = self.client.post(self.url(Endpoint::Logout)).bearer_auth(token);
        self.dispatch(Endpoint::Logout, builder).await?;
        Ok(())
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let request = ForgotPasswordRequest {
            email: email.to_string(),
        };
        let builder = self
            .client
            .post(self.url(Endpoint::ForgotPassword))
            .json(&request);
        self.dispatch(Endpoint::ForgotPassword, builder).await?;
        Ok(())
    }
}
