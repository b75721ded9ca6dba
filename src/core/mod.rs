//! Core session, routing and authentication logic

pub mod auth;
pub mod config;
#[cfg(feature = "server")]
pub mod db;
pub mod routing;
pub mod session;

pub use auth::{AuthApi, AuthError, HttpAuthApi, Role, SelfServeRole, User};
pub use config::{Config, ConfigError};
pub use routing::{GuardDecision, RouteAccess, RouteGuard, RouteTable, resolve_landing_path};
pub use session::{
    AuthState, FileSessionStore, MemorySessionStore, NotificationCenter, SessionManager,
    SessionSnapshot, SessionStore,
};
