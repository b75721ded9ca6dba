//! Client session: current user, persistence and notifications
//!
//! The [`SessionManager`] is the single owner of authentication state. It is
//! created once per application run (see `crate::app::App`) and shared by
//! reference; nothing here is a global.

pub mod manager;
pub mod notify;
pub mod state;
pub mod store;

pub use manager::SessionManager;
pub use notify::{Notification, NotificationCenter, NotificationItem, NotificationType};
pub use state::{AuthState, SessionSnapshot};
pub use store::{
    FileSessionStore, MemorySessionStore, PersistedSession, SESSION_STORAGE_KEY, SessionStore,
    StoreError,
};
