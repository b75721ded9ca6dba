//! Route table for the marketplace

use crate::core::auth::{Role, User};

/// Entry point for signing in
pub const LOGIN_PATH: &str = "/login";

/// What a route requires before it may render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    /// Any signed-in user
    Authenticated,
    /// Only users with exactly this role
    Role(Role),
}

impl RouteAccess {
    /// Whether `user` (None when anonymous) satisfies this requirement
    pub fn allows(&self, user: Option<&User>) -> bool {
        match (self, user) {
            (RouteAccess::Public, _) => true,
            (RouteAccess::Authenticated, user) => user.is_some(),
            (RouteAccess::Role(required), Some(user)) => user.role == *required,
            (RouteAccess::Role(_), None) => false,
        }
    }
}

/// Home page for a role
pub fn resolve_landing_path(role: Role) -> &'static str {
    match role {
        Role::Farmer => "/farmer/dashboard",
        Role::Consumer => "/consumer/dashboard",
        Role::Admin => "/admin/dashboard",
    }
}

/// Path prefixes mapped to their access requirement.
///
/// Matching is by whole path segments and the longest prefix wins. Paths no
/// rule covers are public.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<(String, RouteAccess)>,
}

impl RouteTable {
    /// Table with no rules; every path is public
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The marketplace's routes
    pub fn marketplace() -> Self {
        let public = [
            "/",
            LOGIN_PATH,
            "/register",
            "/forgot-password",
            "/about",
            "/products",
            "/terms",
            "/privacy",
        ];

        let mut table = Self::empty();
        for path in public {
            table = table.with_rule(path, RouteAccess::Public);
        }

        table
            .with_rule("/profile", RouteAccess::Authenticated)
            .with_rule("/settings", RouteAccess::Authenticated)
            .with_rule("/consumer", RouteAccess::Role(Role::Consumer))
            .with_rule("/farmer", RouteAccess::Role(Role::Farmer))
            .with_rule("/admin", RouteAccess::Role(Role::Admin))
    }

    /// Add or replace the rule for `prefix`
    pub fn with_rule(mut self, prefix: &str, access: RouteAccess) -> Self {
        let prefix = normalize(prefix).to_string();
        match self.rules.iter_mut().find(|(existing, _)| *existing == prefix) {
            Some(rule) => rule.1 = access,
            None => self.rules.push((prefix, access)),
        }
        self
    }

    /// Requirement for a location; query and fragment are ignored
    pub fn access_for(&self, location: &str) -> RouteAccess {
        let path = normalize(path_of(location));

        self.rules
            .iter()
            .filter(|(prefix, _)| covers(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, access)| *access)
            .unwrap_or(RouteAccess::Public)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::marketplace()
    }
}

/// Strip `?query` and `#fragment`
pub(crate) fn path_of(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    &location[..end]
}

fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn covers(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
