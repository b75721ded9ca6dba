//! Navigation guard
//!
//! The decision is made from a [`SessionSnapshot`] before anything renders,
//! so a page behind a role check is never produced for the wrong user, not
//! even for one frame.

use crate::core::auth::User;
use crate::core::routing::routes::path_of;
use crate::core::routing::{LOGIN_PATH, RouteAccess, RouteTable, resolve_landing_path};
use crate::core::session::{AuthState, SessionSnapshot};

/// Outcome of guarding one navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The session is still resolving; show a neutral placeholder
    Wait,
    /// Send the visitor to sign in, then back to `from`
    RedirectToLogin { from: String },
    /// Signed in but not allowed here
    Redirect { to: String },
    Render,
}

impl GuardDecision {
    /// Location the router should navigate to, if any
    pub fn redirect_target(&self) -> Option<String> {
        match self {
            GuardDecision::RedirectToLogin { from } => Some(login_location(from)),
            GuardDecision::Redirect { to } => Some(to.clone()),
            GuardDecision::Wait | GuardDecision::Render => None,
        }
    }

    pub fn renders(&self) -> bool {
        matches!(self, GuardDecision::Render)
    }
}

/// Decide what to do with a navigation to `requested`
pub fn evaluate(snapshot: &SessionSnapshot, access: RouteAccess, requested: &str) -> GuardDecision {
    if access == RouteAccess::Public {
        return GuardDecision::Render;
    }

    if snapshot.loading || snapshot.is_initializing() {
        return GuardDecision::Wait;
    }

    let AuthState::Authenticated(user) = &snapshot.state else {
        return GuardDecision::RedirectToLogin {
            from: requested.to_string(),
        };
    };

    if access.allows(Some(user)) {
        GuardDecision::Render
    } else {
        GuardDecision::Redirect {
            to: resolve_landing_path(user.role).to_string(),
        }
    }
}

/// Guard bound to a route table
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    routes: RouteTable,
}

impl RouteGuard {
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn check(&self, snapshot: &SessionSnapshot, location: &str) -> GuardDecision {
        let decision = evaluate(snapshot, self.routes.access_for(location), location);
        if let Some(target) = decision.redirect_target() {
            tracing::debug!(location, redirect = %target, "navigation redirected");
        }
        decision
    }
}

/// `/login?redirect=<from>`
pub fn login_location(from: &str) -> String {
    format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(from))
}

/// Extract the preserved location from a login URL.
///
/// Only same-site absolute paths are returned.
pub fn parse_login_redirect(location: &str) -> Option<String> {
    let (_, query) = location.split_once('?')?;
    let query = path_of(query);

    let raw = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("redirect="))?;
    let decoded = urlencoding::decode(raw).ok()?;

    is_local_path(&decoded).then(|| decoded.into_owned())
}

/// Where to send a user who just signed in.
///
/// The preserved location wins when the user may open it; otherwise the
/// role's landing page.
pub fn post_auth_destination(user: &User, from: Option<&str>, routes: &RouteTable) -> String {
    from.filter(|from| is_local_path(from))
        .filter(|from| path_of(from) != LOGIN_PATH)
        .filter(|from| routes.access_for(from).allows(Some(user)))
        .map(str::to_string)
        .unwrap_or_else(|| resolve_landing_path(user.role).to_string())
}

fn is_local_path(location: &str) -> bool {
    location.starts_with('/') && !location.starts_with("//") && !location.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::Role;

    fn user(role: Role) -> User {
        User {
            id: "u1".to_string(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            role,
            profile_image: None,
        }
    }

    fn signed_in(role: Role) -> SessionSnapshot {
        SessionSnapshot {
            state: AuthState::Authenticated(user(role)),
            loading: false,
        }
    }

    fn anonymous() -> SessionSnapshot {
        SessionSnapshot {
            state: AuthState::Anonymous,
            loading: false,
        }
    }

    // ========================================================================
    // Guard Decision Tests
    // ========================================================================

    #[test]
    fn test_wait_while_loading() {
        let restoring = SessionSnapshot::default();
        let busy = SessionSnapshot {
            loading: true,
            ..signed_in(Role::Consumer)
        };
        let farmer_only = RouteAccess::Role(Role::Farmer);

        for snapshot in [restoring, busy] {
            let decision = evaluate(&snapshot, farmer_only, "/farmer/dashboard");
            assert_eq!(decision, GuardDecision::Wait);
            assert!(!decision.renders());
            assert!(decision.redirect_target().is_none());
        }
    }

    #[test]
    fn test_anonymous_redirected_to_login_with_location() {
        let decision = evaluate(&anonymous(), RouteAccess::Authenticated, "/profile?tab=1");

        assert_eq!(
            decision,
            GuardDecision::RedirectToLogin {
                from: "/profile?tab=1".to_string()
            }
        );
        assert_eq!(
            decision.redirect_target().as_deref(),
            Some("/login?redirect=%2Fprofile%3Ftab%3D1")
        );
    }

    #[test]
    fn test_consumer_on_farmer_route_redirected_to_own_dashboard() {
        let decision = evaluate(
            &signed_in(Role::Consumer),
            RouteAccess::Role(Role::Farmer),
            "/farmer/dashboard",
        );

        assert!(!decision.renders());
        assert_eq!(
            decision.redirect_target().as_deref(),
            Some("/consumer/dashboard")
        );
    }

    #[test]
    fn test_role_match_is_strict() {
        // Admin is not a superset of the other roles
        let decision = evaluate(
            &signed_in(Role::Admin),
            RouteAccess::Role(Role::Farmer),
            "/farmer/dashboard",
        );
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/admin/dashboard".to_string()
            }
        );
    }

    #[test]
    fn test_matching_role_and_any_session_render() {
        assert!(
            evaluate(
                &signed_in(Role::Farmer),
                RouteAccess::Role(Role::Farmer),
                "/farmer/products"
            )
            .renders()
        );
        assert!(evaluate(&signed_in(Role::Consumer), RouteAccess::Authenticated, "/profile").renders());
    }

    #[test]
    fn test_public_routes_render_even_while_loading() {
        let decision = evaluate(&SessionSnapshot::default(), RouteAccess::Public, "/products");
        assert!(decision.renders());
    }

    #[test]
    fn test_route_guard_uses_table() {
        let guard = RouteGuard::default();

        assert_eq!(
            guard.check(&signed_in(Role::Farmer), "/consumer/cart"),
            GuardDecision::Redirect {
                to: "/farmer/dashboard".to_string()
            }
        );
        assert!(guard.check(&anonymous(), "/about").renders());
        assert!(matches!(
            guard.check(&anonymous(), "/admin/users"),
            GuardDecision::RedirectToLogin { .. }
        ));
    }

    // ========================================================================
    // Login Redirect Tests
    // ========================================================================

    #[test]
    fn test_parse_login_redirect_round_trip() {
        let location = login_location("/farmer/orders?status=open");
        assert_eq!(
            parse_login_redirect(&location).as_deref(),
            Some("/farmer/orders?status=open")
        );
    }

    #[test]
    fn test_parse_login_redirect_rejects_external_targets() {
        assert_eq!(parse_login_redirect("/login?redirect=https%3A%2F%2Fevil.test"), None);
        assert_eq!(parse_login_redirect("/login?redirect=%2F%2Fevil.test"), None);
        assert_eq!(parse_login_redirect("/login"), None);
    }

    #[test]
    fn test_parse_login_redirect_among_other_params() {
        assert_eq!(
            parse_login_redirect("/login?utm=x&redirect=%2Fprofile#form").as_deref(),
            Some("/profile")
        );
    }

    // ========================================================================
    // Post-Auth Destination Tests
    // ========================================================================

    #[test]
    fn test_destination_prefers_accessible_preserved_location() {
        let routes = RouteTable::marketplace();
        let farmer = user(Role::Farmer);

        assert_eq!(
            post_auth_destination(&farmer, Some("/farmer/orders"), &routes),
            "/farmer/orders"
        );
        assert_eq!(post_auth_destination(&farmer, Some("/profile"), &routes), "/profile");
    }

    #[test]
    fn test_destination_falls_back_to_landing_path() {
        let routes = RouteTable::marketplace();
        let consumer = user(Role::Consumer);

        assert_eq!(
            post_auth_destination(&consumer, Some("/farmer/dashboard"), &routes),
            "/consumer/dashboard"
        );
        assert_eq!(post_auth_destination(&consumer, None, &routes), "/consumer/dashboard");
        assert_eq!(
            post_auth_destination(&consumer, Some("//evil.test"), &routes),
            "/consumer/dashboard"
        );
        assert_eq!(
            post_auth_destination(&consumer, Some("/login?redirect=%2F"), &routes),
            "/consumer/dashboard"
        );
    }
}
