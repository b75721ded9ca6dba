//! Application context
//!
//! [`App`] owns the one [`SessionManager`] for a run together with the route
//! guard, and gives the presentation layer a start/stop lifecycle.

use std::sync::Arc;

use crate::core::auth::{AuthApi, AuthError, HttpAuthApi};
use crate::core::config::Config;
use crate::core::routing::{GuardDecision, RouteGuard, RouteTable, post_auth_destination};
use crate::core::session::{FileSessionStore, MemorySessionStore, SessionManager, SessionStore};

pub struct App {
    session: Arc<SessionManager>,
    guard: RouteGuard,
}

impl App {
    /// Build the app from config and restore the persisted session
    pub async fn start(config: &Config) -> Result<Self, AuthError> {
        let api = Arc::new(HttpAuthApi::from_config(config)?);

        tracing::info!(
            api_url = %config.api_url,
            persistent = config.has_session_dir(),
            "starting session"
        );
        Ok(Self::start_with(api, session_store(config)).await)
    }

    /// Build the app against an in-process auth service instead of the HTTP
    /// API, delaying every call by `mock_latency`
    #[cfg(feature = "server")]
    pub async fn start_local(config: &Config) -> Result<Self, AuthError> {
        use crate::core::auth::{AuthService, JwtConfig, JwtService, LocalAuthApi};

        let service = AuthService::in_memory(JwtService::new(JwtConfig::from_config(config)));
        if config.seed_demo_accounts {
            service
                .seed_demo_accounts()
                .await
                .map_err(|err| AuthError::Unknown(err.to_string()))?;
        }

        let api = Arc::new(LocalAuthApi::new(service).with_latency(config.mock_latency));

        tracing::info!(
            latency_ms = config.mock_latency.as_millis() as u64,
            persistent = config.has_session_dir(),
            "starting session against the in-process auth service"
        );
        Ok(Self::start_with(api, session_store(config)).await)
    }

    /// Build the app from explicit collaborators and restore the session
    pub async fn start_with(api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> Self {
        let app = Self {
            session: Arc::new(SessionManager::new(api, store)),
            guard: RouteGuard::default(),
        };
        app.session.restore_session().await;
        app
    }

    /// Replace the route table
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.guard = RouteGuard::new(routes);
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    /// Guard a navigation against the current session
    pub fn navigate(&self, location: &str) -> GuardDecision {
        self.guard.check(&self.session.snapshot(), location)
    }

    /// Where to go after a successful login or registration; None while signed out
    pub fn destination_after_auth(&self, from: Option<&str>) -> Option<String> {
        self.session
            .current_user()
            .map(|user| post_auth_destination(&user, from, self.guard.routes()))
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}

/// File-backed when a session directory is configured, in-memory otherwise
fn session_store(config: &Config) -> Arc<dyn SessionStore> {
    match &config.session_dir {
        Some(dir) => Arc::new(FileSessionStore::new(dir)),
        None => Arc::new(MemorySessionStore::new()),
    }
}
