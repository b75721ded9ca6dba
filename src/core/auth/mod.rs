//! Authentication module for Agrimarket
//!
//! This module provides:
//! - Wire types shared by the client and the development API
//! - The `AuthApi` seam and its HTTP client
//! - The development auth service, JWT handling and REST endpoints (`server` feature)

pub mod client;
pub mod error;
pub mod models;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod jwt;
#[cfg(feature = "server")]
pub mod local;
#[cfg(feature = "server")]
pub mod service;

pub use client::{AuthApi, Endpoint, HttpAuthApi, classify_failure};
pub use error::AuthError;
pub use models::{
    ApiErrorBody, AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse,
    RegisterRequest, RegistrationData, ResetPasswordRequest, Role, SelfServeRole, User,
};

#[cfg(feature = "server")]
pub use api::{AuthApiState, auth_api_router};
#[cfg(feature = "server")]
pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
#[cfg(feature = "server")]
pub use local::LocalAuthApi;
#[cfg(feature = "server")]
pub use service::{AuthService, ServiceError};
