//! Session manager for the signed-in user
//!
//! This module owns the client-side authentication state machine:
//! - `Initializing -> {Authenticated, Anonymous}` via [`SessionManager::restore_session`]
//! - `Authenticated <-> Anonymous` via login/register and logout
//! - Persists the session token through a [`SessionStore`]
//! - Publishes every change on a `watch` channel
//!
//! REQUEST ORDERING
//! ================
//! Each state-changing call takes a ticket from a monotonically increasing
//! counter. A response is applied only while its ticket is still the latest,
//! so when two logins overlap the one issued last wins no matter which
//! resolves first. Discarded responses surface as [`AuthError::Superseded`];
//! anything arriving after [`SessionManager::shutdown`] surfaces as
//! [`AuthError::SessionClosed`] and never touches state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::core::auth::{AuthApi, AuthError, AuthResponse, LoginRequest, RegistrationData, User};
use crate::core::session::{
    AuthState, NotificationCenter, PersistedSession, SessionSnapshot, SessionStore,
};

/// Holds `loading` true for as long as it lives
struct LoadingGuard<'a> {
    manager: &'a SessionManager,
}

impl<'a> LoadingGuard<'a> {
    fn acquire(manager: &'a SessionManager) -> Self {
        // Counter and flag change together under the watch lock
        manager.state.send_modify(|snapshot| {
            manager.in_flight.fetch_add(1, Ordering::SeqCst);
            snapshot.loading = true;
        });
        Self { manager }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let in_flight = &self.manager.in_flight;
        self.manager.state.send_modify(|snapshot| {
            let remaining = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            snapshot.loading = remaining > 0;
        });
    }
}

/// Single owner of the current session
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    notifications: NotificationCenter,
    state: watch::Sender<SessionSnapshot>,
    latest_ticket: AtomicU64,
    in_flight: AtomicUsize,
    restored: AtomicBool,
    closed: AtomicBool,
}

impl SessionManager {
    /// Create a manager in the `Initializing` state with `loading` set
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            api,
            store,
            notifications: NotificationCenter::new(),
            state,
            latest_ticket: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            restored: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that observes every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().current_user().cloned()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolve the persisted session against the API.
    ///
    /// Runs once; later calls return the current snapshot untouched. Failures
    /// are expected (no token, expired token, offline) and only yield
    /// `Anonymous`, never a notification.
    pub async fn restore_session(&self) -> SessionSnapshot {
        if self.restored.swap(true, Ordering::SeqCst) {
            tracing::warn!("restore_session called more than once; ignoring");
            return self.snapshot();
        }

        {
            let _loading = LoadingGuard::acquire(self);
            let ticket = self.issue_ticket();
            let outcome = self.lookup_persisted_user().await;

            match self.accept(ticket) {
                Ok(()) => match outcome {
                    Ok((token, user)) => {
                        tracing::info!(user_id = %user.id, role = %user.role, "session restored");
                        self.persist(&token, &user);
                        self.set_state(AuthState::Authenticated(user));
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "no session to restore");
                        if err == AuthError::Unauthenticated {
                            self.clear_persisted();
                        }
                        self.set_state(AuthState::Anonymous);
                    }
                },
                Err(discarded) => {
                    tracing::debug!(reason = %discarded, "discarding restore result");
                }
            }
        }

        self.snapshot()
    }

    async fn lookup_persisted_user(&self) -> Result<(String, User), AuthError> {
        let persisted = match self.store.load() {
            Ok(persisted) => persisted,
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable persisted session");
                self.clear_persisted();
                None
            }
        };

        let Some(PersistedSession { token, .. }) = persisted else {
            return Err(AuthError::Unauthenticated);
        };

        // The cached user is ignored; the server's answer is authoritative.
        let user = self.api.current_user(&token).await?;
        Ok((token, user))
    }

    /// Sign in with email and password.
    ///
    /// On failure the error is both notified and returned so the calling form
    /// can keep its fields and show inline feedback.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.ensure_open()?;

        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        let _loading = LoadingGuard::acquire(self);
        let ticket = self.issue_ticket();
        tracing::info!(email = %request.email, "login attempt");

        let outcome = self.api.login(&request).await;
        self.accept(ticket)?;

        match outcome {
            Ok(response) => Ok(self.establish(response, "Welcome back")),
            Err(err) => {
                self.reject_sign_in("Login failed", err.user_message(), &err);
                Err(err)
            }
        }
    }

    /// Create an account and sign in as it
    pub async fn register(&self, data: RegistrationData) -> Result<User, AuthError> {
        self.ensure_open()?;

        if let Err(err) = data.validate() {
            self.notifications
                .error("Registration failed", err.user_message());
            return Err(err);
        }

        let request = data.into_request();
        let _loading = LoadingGuard::acquire(self);
        let ticket = self.issue_ticket();
        tracing::info!(email = %request.email, role = %request.user_type, "registration attempt");

        let outcome = self.api.register(&request).await;
        self.accept(ticket)?;

        match outcome {
            Ok(response) => Ok(self.establish(response, "Welcome to the marketplace")),
            Err(err) => {
                let message = match &err {
                    AuthError::Validation(message) => message.clone(),
                    AuthError::Network(_) => err.user_message(),
                    _ => "Registration failed. Please try again.".to_string(),
                };
                self.reject_sign_in("Registration failed", message, &err);
                Err(err)
            }
        }
    }

    /// Sign out. Local state is cleared before the API is told, so a
    /// request overlapping the logout can never revive the old session.
    /// The API call is best-effort.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.ensure_open()?;

        // Invalidate anything in flight before reading the token
        self.issue_ticket();
        let token = self.persisted_token();

        self.clear_persisted();
        self.set_state(AuthState::Anonymous);
        self.notifications
            .info("Signed out", "You have been signed out.");
        tracing::info!("signed out");

        let outcome = match &token {
            Some(token) => self.api.logout(token).await,
            None => Ok(()),
        };

        match outcome {
            // A rejected token means the server already ended the session
            Ok(()) | Err(AuthError::Unauthenticated) => {}
            Err(err) => {
                tracing::warn!(error = %err, "logout request failed; local session already cleared");
                if !self.is_closed() {
                    self.notifications.warning(
                        "Signed out on this device",
                        "We could not reach the server, but your local session has been cleared.",
                    );
                }
            }
        }

        Ok(())
    }

    /// Ask the API to send a reset link. Never changes session state.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.ensure_open()?;

        let email = email.trim();
        if email.is_empty() {
            let err = AuthError::Validation("Email is required".to_string());
            self.notifications
                .error("Password reset failed", err.user_message());
            return Err(err);
        }

        match self.api.forgot_password(email).await {
            Ok(()) => {
                self.notifications.success(
                    "Check your inbox",
                    format!("If an account exists for {email}, a password reset link is on its way."),
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "forgot-password request failed");
                self.notifications
                    .error("Password reset failed", err.user_message());
                Err(err)
            }
        }
    }

    /// React to the API rejecting the session token on any call.
    ///
    /// Resets to `Anonymous`, forgets the persisted token and invalidates any
    /// request still in flight.
    pub fn handle_auth_failure(&self) {
        if self.is_closed() {
            return;
        }

        self.issue_ticket();
        if self.is_authenticated() {
            tracing::info!("session rejected by the API; signing out");
            self.notifications
                .warning("Session expired", "Please sign in again.");
        }

        self.clear_persisted();
        self.set_state(AuthState::Anonymous);
    }

    /// Tear down. Responses that arrive afterwards are dropped.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("session manager shut down");
        }
    }

    fn establish(&self, response: AuthResponse, greeting: &str) -> User {
        let AuthResponse { token, user } = response;

        self.persist(&token, &user);
        self.set_state(AuthState::Authenticated(user.clone()));
        self.notifications
            .success("Signed in", format!("{greeting}, {}!", user.name));
        tracing::info!(user_id = %user.id, role = %user.role, "signed in");

        user
    }

    fn reject_sign_in(&self, title: &str, message: String, err: &AuthError) {
        tracing::warn!(error = %err, "{title}");
        // A failed attempt resolves a session that never finished restoring
        self.state.send_modify(|snapshot| {
            if snapshot.is_initializing() {
                snapshot.state = AuthState::Anonymous;
            }
        });
        self.notifications.error(title, message);
    }

    fn ensure_open(&self) -> Result<(), AuthError> {
        if self.is_closed() {
            Err(AuthError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn issue_ticket(&self) -> u64 {
        self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether a response for `ticket` may still change state
    fn accept(&self, ticket: u64) -> Result<(), AuthError> {
        if self.is_closed() {
            tracing::debug!(ticket, "dropping response after shutdown");
            return Err(AuthError::SessionClosed);
        }
        if self.latest_ticket.load(Ordering::SeqCst) != ticket {
            tracing::debug!(ticket, "dropping superseded response");
            return Err(AuthError::Superseded);
        }
        Ok(())
    }

    fn set_state(&self, state: AuthState) {
        self.state.send_modify(|snapshot| snapshot.state = state);
    }

    fn persisted_token(&self) -> Option<String> {
        match self.store.load() {
            Ok(persisted) => persisted.map(|session| session.token),
            Err(err) => {
                tracing::warn!(error = %err, "could not read persisted session");
                None
            }
        }
    }

    fn persist(&self, token: &str, user: &User) {
        let session = PersistedSession {
            token: token.to_string(),
            user: user.clone(),
        };
        if let Err(err) = self.store.save(&session) {
            tracing::warn!(error = %err, "could not persist session");
        }
    }

    fn clear_persisted(&self) {
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "could not clear persisted session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{RegisterRequest, Role, SelfServeRole};
    use crate::core::session::{MemorySessionStore, NotificationType};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    fn user(id: &str, name: &str, email: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role,
            profile_image: None,
        }
    }

    fn test_user() -> User {
        user("u1", "Test", "test@example.com", Role::Consumer)
    }

    /// Scripted API double. Logins are keyed by email; anything unscripted is
    /// rejected the way a real server would.
    #[derive(Default)]
    struct StubApi {
        logins: Mutex<HashMap<String, (Duration, Result<AuthResponse, AuthError>)>>,
        register_result: Mutex<Option<Result<AuthResponse, AuthError>>>,
        me_result: Mutex<Option<Result<User, AuthError>>>,
        logout_result: Mutex<Option<Result<(), AuthError>>>,
        logout_delay: Mutex<Duration>,
        forgot_result: Mutex<Option<Result<(), AuthError>>>,
        register_calls: AtomicUsize,
        me_calls: AtomicUsize,
        logout_tokens: Mutex<Vec<String>>,
    }

    impl StubApi {
        fn login_ok(self, email: &str, token: &str, user: User) -> Self {
            self.login_after(email, Duration::ZERO, Ok(AuthResponse {
                token: token.to_string(),
                user,
            }))
        }

        fn login_after(
            self,
            email: &str,
            delay: Duration,
            result: Result<AuthResponse, AuthError>,
        ) -> Self {
            self.logins
                .lock()
                .unwrap()
                .insert(email.to_string(), (delay, result));
            self
        }

        fn me(self, result: Result<User, AuthError>) -> Self {
            *self.me_result.lock().unwrap() = Some(result);
            self
        }

        fn register(self, result: Result<AuthResponse, AuthError>) -> Self {
            *self.register_result.lock().unwrap() = Some(result);
            self
        }

        fn logout(self, result: Result<(), AuthError>) -> Self {
            *self.logout_result.lock().unwrap() = Some(result);
            self
        }

        fn logout_delayed(self, delay: Duration) -> Self {
            *self.logout_delay.lock().unwrap() = delay;
            self
        }

        fn forgot(self, result: Result<(), AuthError>) -> Self {
            *self.forgot_result.lock().unwrap() = Some(result);
            self
        }
    }

    #[async_trait]
    impl AuthApi for StubApi {
        async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
            let scripted = self.logins.lock().unwrap().get(&request.email).cloned();
            match scripted {
                Some((delay, result)) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    result
                }
                None => Err(AuthError::InvalidCredentials),
            }
        }

        async fn register(&self, _request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            self.register_result
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(Err(AuthError::Unknown("unscripted".to_string())))
        }

        async fn current_user(&self, _token: &str) -> Result<User, AuthError> {
            self.me_calls.fetch_add(1, Ordering::SeqCst);
            self.me_result
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(Err(AuthError::Unauthenticated))
        }

        async fn logout(&self, token: &str) -> Result<(), AuthError> {
            self.logout_tokens.lock().unwrap().push(token.to_string());
            let delay = *self.logout_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.logout_result.lock().unwrap().clone().unwrap_or(Ok(()))
        }

        async fn forgot_password(&self, _email: &str) -> Result<(), AuthError> {
            self.forgot_result.lock().unwrap().clone().unwrap_or(Ok(()))
        }
    }

    fn manager_with(api: StubApi) -> (SessionManager, Arc<StubApi>, Arc<MemorySessionStore>) {
        manager_with_store(api, MemorySessionStore::new())
    }

    fn manager_with_store(
        api: StubApi,
        store: MemorySessionStore,
    ) -> (SessionManager, Arc<StubApi>, Arc<MemorySessionStore>) {
        let api = Arc::new(api);
        let store = Arc::new(store);
        let manager = SessionManager::new(api.clone(), store.clone());
        (manager, api, store)
    }

    // ========================================================================
    // Restore Tests
    // ========================================================================

    #[tokio::test]
    async fn test_new_manager_is_initializing_and_loading() {
        let (manager, _, _) = manager_with(StubApi::default());
        let snapshot = manager.snapshot();

        assert!(snapshot.is_initializing());
        assert!(snapshot.loading);
    }

    #[tokio::test]
    async fn test_restore_without_token_is_anonymous_without_network() {
        let (manager, api, _) = manager_with(StubApi::default());

        let snapshot = manager.restore_session().await;

        assert_eq!(snapshot.state, AuthState::Anonymous);
        assert!(!snapshot.loading);
        assert_eq!(api.me_calls.load(Ordering::SeqCst), 0);
        assert!(manager.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_restore_with_valid_token_uses_server_user() {
        // The cached copy claims admin; the server says consumer.
        let mut cached = test_user();
        cached.role = Role::Admin;
        let store = MemorySessionStore::with_session(PersistedSession {
            token: "t1".to_string(),
            user: cached,
        });
        let (manager, _, store) = manager_with_store(StubApi::default().me(Ok(test_user())), store);

        let snapshot = manager.restore_session().await;

        assert!(snapshot.is_authenticated());
        assert_eq!(snapshot.role(), Some(Role::Consumer));
        assert!(!snapshot.loading);
        assert_eq!(store.load().unwrap().unwrap().user.role, Role::Consumer);
    }

    #[tokio::test]
    async fn test_restore_with_expired_token_clears_store() {
        let store = MemorySessionStore::with_session(PersistedSession {
            token: "stale".to_string(),
            user: test_user(),
        });
        let (manager, _, store) =
            manager_with_store(StubApi::default().me(Err(AuthError::Unauthenticated)), store);

        let snapshot = manager.restore_session().await;

        assert_eq!(snapshot.state, AuthState::Anonymous);
        assert!(!snapshot.loading);
        assert!(store.load().unwrap().is_none());
        assert!(manager.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_restore_offline_keeps_token_for_next_run() {
        let store = MemorySessionStore::with_session(PersistedSession {
            token: "t1".to_string(),
            user: test_user(),
        });
        let (manager, _, store) = manager_with_store(
            StubApi::default().me(Err(AuthError::Network("connection refused".to_string()))),
            store,
        );

        let snapshot = manager.restore_session().await;

        assert_eq!(snapshot.state, AuthState::Anonymous);
        assert!(!snapshot.loading);
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restore_runs_once() {
        let store = MemorySessionStore::with_session(PersistedSession {
            token: "t1".to_string(),
            user: test_user(),
        });
        let (manager, api, _) = manager_with_store(StubApi::default().me(Ok(test_user())), store);

        manager.restore_session().await;
        manager.restore_session().await;

        assert_eq!(api.me_calls.load(Ordering::SeqCst), 1);
    }

    // ========================================================================
    // Login Tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_success_authenticates_with_api_role() {
        let api = StubApi::default().login_ok("test@example.com", "t1", test_user());
        let (manager, _, store) = manager_with(api);
        manager.restore_session().await;

        let user = manager.login("test@example.com", "123456").await.unwrap();

        assert_eq!(user.id, "u1");
        assert!(manager.is_authenticated());
        assert_eq!(manager.snapshot().role(), Some(Role::Consumer));
        assert!(!manager.is_loading());
        assert_eq!(store.load().unwrap().unwrap().token, "t1");
        assert_eq!(
            manager.notifications().latest().map(|n| n.notification_type),
            Some(NotificationType::Success)
        );
    }

    #[tokio::test]
    async fn test_login_invalid_credentials_surfaces_error() {
        let api = StubApi::default().login_after(
            "test@example.com",
            Duration::ZERO,
            Err(AuthError::InvalidCredentials),
        );
        let (manager, _, store) = manager_with(api);
        manager.restore_session().await;

        let err = manager.login("test@example.com", "wrong").await.unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(store.load().unwrap().is_none());
        let notice = manager.notifications().latest().unwrap();
        assert_eq!(notice.notification_type, NotificationType::Error);
        assert_eq!(notice.message, "Invalid email or password");
    }

    #[tokio::test]
    async fn test_login_failure_before_restore_resolves_to_anonymous() {
        let (manager, _, _) = manager_with(StubApi::default());

        let _ = manager.login("nobody@example.com", "x").await;

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.state, AuthState::Anonymous);
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_login_trims_email() {
        let api = StubApi::default().login_ok("test@example.com", "t1", test_user());
        let (manager, _, _) = manager_with(api);

        assert!(manager.login("  test@example.com ", "123456").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_true_while_login_in_flight() {
        let api = StubApi::default().login_after(
            "test@example.com",
            Duration::from_millis(100),
            Ok(AuthResponse {
                token: "t1".to_string(),
                user: test_user(),
            }),
        );
        let (manager, _, _) = manager_with(api);
        manager.restore_session().await;

        let observed = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.is_loading()
        };
        let (result, loading_mid_flight) =
            tokio::join!(manager.login("test@example.com", "123456"), observed);

        assert!(result.is_ok());
        assert!(loading_mid_flight);
        assert!(!manager.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_logins_last_issued_wins() {
        let farmer = user("f1", "Fern", "fern@farm.io", Role::Farmer);
        let api = StubApi::default()
            .login_after(
                "test@example.com",
                Duration::from_millis(200),
                Ok(AuthResponse {
                    token: "slow".to_string(),
                    user: test_user(),
                }),
            )
            .login_after(
                "fern@farm.io",
                Duration::from_millis(20),
                Ok(AuthResponse {
                    token: "fast".to_string(),
                    user: farmer.clone(),
                }),
            );
        let (manager, _, store) = manager_with(api);
        manager.restore_session().await;

        let second = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            manager.login("fern@farm.io", "secret").await
        };
        let (first, second) = tokio::join!(manager.login("test@example.com", "123456"), second);

        assert_eq!(first.unwrap_err(), AuthError::Superseded);
        assert_eq!(second.unwrap(), farmer);
        assert_eq!(manager.current_user(), Some(farmer));
        assert_eq!(store.load().unwrap().unwrap().token, "fast");
        assert!(!manager.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_after_shutdown_are_ignored() {
        let api = StubApi::default().login_after(
            "test@example.com",
            Duration::from_millis(100),
            Ok(AuthResponse {
                token: "t1".to_string(),
                user: test_user(),
            }),
        );
        let (manager, _, store) = manager_with(api);
        manager.restore_session().await;

        let teardown = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.shutdown();
        };
        let (result, ()) = tokio::join!(manager.login("test@example.com", "123456"), teardown);

        assert_eq!(result.unwrap_err(), AuthError::SessionClosed);
        assert!(!manager.is_authenticated());
        assert!(store.load().unwrap().is_none());
        assert_eq!(
            manager.login("test@example.com", "123456").await,
            Err(AuthError::SessionClosed)
        );
    }

    #[tokio::test]
    async fn test_subscribers_observe_sign_in() {
        let api = StubApi::default().login_ok("test@example.com", "t1", test_user());
        let (manager, _, _) = manager_with(api);
        manager.restore_session().await;
        let mut rx = manager.subscribe();
        rx.mark_unchanged();

        manager.login("test@example.com", "123456").await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());
    }

    // ========================================================================
    // Register Tests
    // ========================================================================

    #[tokio::test]
    async fn test_register_success_authenticates() {
        let farmer = user("f1", "Fern", "fern@farm.io", Role::Farmer);
        let api = StubApi::default().register(Ok(AuthResponse {
            token: "t2".to_string(),
            user: farmer.clone(),
        }));
        let (manager, _, _) = manager_with(api);
        manager.restore_session().await;

        let data = RegistrationData::new("Fern", "fern@farm.io", "secret1", SelfServeRole::Farmer);
        let registered = manager.register(data).await.unwrap();

        assert_eq!(registered, farmer);
        assert_eq!(manager.snapshot().role(), Some(Role::Farmer));
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn test_register_blank_field_never_calls_api() {
        let (manager, api, _) = manager_with(StubApi::default());
        manager.restore_session().await;

        let data = RegistrationData::new("Fern", "", "secret1", SelfServeRole::Farmer);
        let err = manager.register(data).await.unwrap_err();

        assert_eq!(err, AuthError::Validation("Email is required".to_string()));
        assert_eq!(api.register_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            manager.notifications().latest().map(|n| n.message),
            Some("Email is required".to_string())
        );
    }

    #[tokio::test]
    async fn test_register_failure_surfaces_api_message() {
        let api = StubApi::default().register(Err(AuthError::Validation(
            "Email already registered".to_string(),
        )));
        let (manager, _, _) = manager_with(api);
        manager.restore_session().await;

        let data = RegistrationData::new("Fern", "fern@farm.io", "secret1", SelfServeRole::Farmer);
        let err = manager.register(data).await.unwrap_err();

        assert!(matches!(err, AuthError::Validation(_)));
        assert!(!manager.is_authenticated());
        assert_eq!(
            manager.notifications().latest().map(|n| n.message),
            Some("Email already registered".to_string())
        );
    }

    #[tokio::test]
    async fn test_register_failure_without_message_uses_fallback() {
        let api = StubApi::default().register(Err(AuthError::Unknown("HTTP 500".to_string())));
        let (manager, _, _) = manager_with(api);
        manager.restore_session().await;

        let data = RegistrationData::new("Fern", "fern@farm.io", "secret1", SelfServeRole::Farmer);
        assert!(manager.register(data).await.is_err());

        assert_eq!(
            manager.notifications().latest().map(|n| n.message),
            Some("Registration failed. Please try again.".to_string())
        );
    }

    // ========================================================================
    // Logout Tests
    // ========================================================================

    #[tokio::test]
    async fn test_logout_clears_session_and_sends_token() {
        let api = StubApi::default().login_ok("test@example.com", "t1", test_user());
        let (manager, api, store) = manager_with(api);
        manager.restore_session().await;
        manager.login("test@example.com", "123456").await.unwrap();

        manager.logout().await.unwrap();

        assert!(!manager.is_authenticated());
        assert!(manager.current_user().is_none());
        assert!(store.load().unwrap().is_none());
        assert_eq!(*api.logout_tokens.lock().unwrap(), vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn test_logout_failure_still_signs_out_locally() {
        let api = StubApi::default()
            .login_ok("test@example.com", "t1", test_user())
            .logout(Err(AuthError::Network("offline".to_string())));
        let (manager, _, store) = manager_with(api);
        manager.restore_session().await;
        manager.login("test@example.com", "123456").await.unwrap();

        assert!(manager.logout().await.is_ok());

        assert!(!manager.is_authenticated());
        assert!(store.load().unwrap().is_none());
        let warned = manager
            .notifications()
            .items()
            .iter()
            .any(|item| item.notification.notification_type == NotificationType::Warning);
        assert!(warned);
    }

    #[tokio::test]
    async fn test_logout_when_anonymous_is_harmless() {
        let (manager, api, _) = manager_with(StubApi::default());
        manager.restore_session().await;

        manager.logout().await.unwrap();

        assert!(!manager.is_authenticated());
        assert!(api.logout_tokens.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_login_during_logout_leaves_user_signed_out() {
        let api = StubApi::default()
            .login_ok("test@example.com", "t1", test_user())
            .logout_delayed(Duration::from_millis(100));
        let (manager, api, store) = manager_with(api);
        manager.restore_session().await;
        manager.login("test@example.com", "123456").await.unwrap();

        let retry = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.login("other@example.com", "typo").await
        };
        let (logout, login) = tokio::join!(manager.logout(), retry);

        assert!(logout.is_ok());
        assert_eq!(login.unwrap_err(), AuthError::InvalidCredentials);
        assert!(!manager.is_authenticated());
        assert!(store.load().unwrap().is_none());
        assert!(!manager.is_loading());
        assert_eq!(*api.logout_tokens.lock().unwrap(), vec!["t1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_started_during_logout_signs_in_fresh() {
        let farmer = user("f1", "Fern", "fern@farm.io", Role::Farmer);
        let api = StubApi::default()
            .login_ok("test@example.com", "t1", test_user())
            .login_ok("fern@farm.io", "t2", farmer.clone())
            .logout_delayed(Duration::from_millis(100));
        let (manager, _, store) = manager_with(api);
        manager.restore_session().await;
        manager.login("test@example.com", "123456").await.unwrap();

        let switch = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.login("fern@farm.io", "secret").await
        };
        let (logout, login) = tokio::join!(manager.logout(), switch);

        assert!(logout.is_ok());
        assert_eq!(login.unwrap(), farmer);
        assert_eq!(manager.current_user(), Some(farmer));
        assert_eq!(store.load().unwrap().unwrap().token, "t2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_supersedes_login_in_flight() {
        let api = StubApi::default().login_after(
            "test@example.com",
            Duration::from_millis(100),
            Ok(AuthResponse {
                token: "t1".to_string(),
                user: test_user(),
            }),
        );
        let (manager, _, store) = manager_with(api);
        manager.restore_session().await;

        let sign_out = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.logout().await
        };
        let (login, logout) = tokio::join!(manager.login("test@example.com", "123456"), sign_out);

        assert_eq!(login.unwrap_err(), AuthError::Superseded);
        assert!(logout.is_ok());
        assert!(!manager.is_authenticated());
        assert!(store.load().unwrap().is_none());
    }

    // ========================================================================
    // Forgot Password / Auth Failure Tests
    // ========================================================================

    #[tokio::test]
    async fn test_forgot_password_only_notifies() {
        let (manager, _, _) = manager_with(StubApi::default());
        manager.restore_session().await;
        let before = manager.snapshot();

        manager.forgot_password("test@example.com").await.unwrap();

        assert_eq!(manager.snapshot(), before);
        assert_eq!(
            manager.notifications().latest().map(|n| n.notification_type),
            Some(NotificationType::Success)
        );
    }

    #[tokio::test]
    async fn test_forgot_password_failure_notifies_error() {
        let (manager, _, _) = manager_with(
            StubApi::default().forgot(Err(AuthError::Network("offline".to_string()))),
        );
        manager.restore_session().await;

        assert!(manager.forgot_password("test@example.com").await.is_err());
        assert!(!manager.is_authenticated());
        assert_eq!(
            manager.notifications().latest().map(|n| n.notification_type),
            Some(NotificationType::Error)
        );
    }

    #[tokio::test]
    async fn test_forgot_password_requires_email() {
        let (manager, _, _) = manager_with(StubApi::default());

        assert_eq!(
            manager.forgot_password("   ").await,
            Err(AuthError::Validation("Email is required".to_string()))
        );
    }

    #[tokio::test]
    async fn test_auth_failure_signal_resets_session() {
        let api = StubApi::default().login_ok("test@example.com", "t1", test_user());
        let (manager, _, store) = manager_with(api);
        manager.restore_session().await;
        manager.login("test@example.com", "123456").await.unwrap();

        manager.handle_auth_failure();

        assert_eq!(manager.snapshot().state, AuthState::Anonymous);
        assert!(store.load().unwrap().is_none());
        assert_eq!(
            manager.notifications().latest().map(|n| n.title),
            Some("Session expired".to_string())
        );
    }

    // ========================================================================
    // Loading Flag Tests
    // ========================================================================

    #[test]
    fn test_loading_settles_after_concurrent_requests() {
        let (manager, _, _) = manager_with(StubApi::default());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let _loading = LoadingGuard::acquire(&manager);
                        assert!(manager.is_loading());
                    }
                });
            }
        });

        assert_eq!(manager.in_flight.load(Ordering::SeqCst), 0);
        assert!(!manager.is_loading());
    }
}
