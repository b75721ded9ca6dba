//! Observable session state

use crate::core::auth::{Role, User};

/// Authentication state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Startup, before the persisted session has been checked
    #[default]
    Initializing,
    /// No user is signed in
    Anonymous,
    /// A user is signed in
    Authenticated(User),
}

/// Point-in-time view of the session published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: AuthState,
    /// True during the restore check and while login/register calls are in flight
    pub loading: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: AuthState::Initializing,
            loading: true,
        }
    }
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self.state, AuthState::Initializing)
    }

    pub fn current_user(&self) -> Option<&User> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.current_user().map(|user| user.role)
    }
}
