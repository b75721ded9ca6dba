//! Auth wire types
//!
//! Shared by the session manager, the HTTP client and the development API so
//! both ends of `/api/auth/*` agree on field names. Users travel with their
//! role under `userType`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::auth::AuthError;

/// Marketplace role, fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Consumer,
    Farmer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consumer => "consumer",
            Role::Farmer => "farmer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles a visitor can pick for themselves on the registration form.
///
/// Administrators are provisioned out of band, so `admin` has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelfServeRole {
    Consumer,
    Farmer,
}

impl From<SelfServeRole> for Role {
    fn from(role: SelfServeRole) -> Self {
        match role {
            SelfServeRole::Consumer => Role::Consumer,
            SelfServeRole::Farmer => Role::Farmer,
        }
    }
}

impl TryFrom<Role> for SelfServeRole {
    type Error = Role;

    fn try_from(role: Role) -> Result<Self, Self::Error> {
        match role {
            Role::Consumer => Ok(SelfServeRole::Consumer),
            Role::Farmer => Ok(SelfServeRole::Farmer),
            Role::Admin => Err(role),
        }
    }
}

/// User information from the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "userType", alias = "role")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Register request as sent over the wire.
///
/// `user_type` is a full [`Role`] so the server can reject `admin` with a
/// readable error instead of a decoding failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub user_type: Role,
}

/// Registration form input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: SelfServeRole,
}

impl RegistrationData {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        role: SelfServeRole,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role,
        }
    }

    /// Every field is required; blank input never reaches the API.
    pub fn validate(&self) -> Result<(), AuthError> {
        let missing = [
            ("Name", self.name.trim().is_empty()),
            ("Email", self.email.trim().is_empty()),
            ("Password", self.password.is_empty()),
        ]
        .into_iter()
        .find_map(|(field, blank)| blank.then_some(field));

        match missing {
            Some(field) => Err(AuthError::Validation(format!("{field} is required"))),
            None => Ok(()),
        }
    }

    pub fn into_request(self) -> RegisterRequest {
        RegisterRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
            user_type: self.role.into(),
        }
    }
}

/// Successful login/register payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Error body returned by the API. Older endpoints use `message`, newer ones `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|message| !message.trim().is_empty())
    }
}

/// Forgot-password request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Password reset completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Generic `{message}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
