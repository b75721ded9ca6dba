//! Route access rules and the navigation guard
//!
//! - [`RouteTable`]: which paths need a session or a specific role
//! - [`evaluate`]: the per-navigation wait/redirect/render decision
//! - [`resolve_landing_path`]: each role's home, shared by guards and post-login redirects

pub mod guard;
pub mod routes;

pub use guard::{
    GuardDecision, RouteGuard, evaluate, login_location, parse_login_redirect,
    post_auth_destination,
};
pub use routes::{LOGIN_PATH, RouteAccess, RouteTable, resolve_landing_path};
