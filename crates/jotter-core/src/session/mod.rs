//! Session store: the single source of truth for the signed-in identity.
//!
//! A [`SessionStore`] owns an [`AuthProvider`] and publishes
//! [`SessionState`] through an [`Observable`]. Screens and the routing gate
//! hold a provider-agnostic [`SessionHandle`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{AuthError, AuthProvider, AuthResult, AuthSession, AuthUser, SignUpOutcome};
use crate::observe::{Observable, Subscription};

/// Snapshot of the authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session: Option<AuthSession>,
    /// True until the persisted session has been restored (or ruled out).
    pub loading: bool,
}

impl SessionState {
    const fn initial() -> Self {
        Self {
            session: None,
            loading: true,
        }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|session| &session.user)
    }

    pub const fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

/// Read side of the session store.
#[derive(Clone)]
pub struct SessionHandle {
    state: Observable<SessionState>,
}

impl SessionHandle {
    /// Current state without any network round-trip.
    pub fn current(&self) -> SessionState {
        self.state.get()
    }

    /// Cached session, used by write paths to confirm identity up front.
    pub fn current_session(&self) -> Option<AuthSession> {
        self.state.get().session
    }

    /// Cached session or [`AuthError::NotSignedIn`].
    pub fn require_session(&self) -> AuthResult<AuthSession> {
        self.current_session().ok_or(AuthError::NotSignedIn)
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.current_session().map(|session| session.user)
    }

    /// Observe every transition; the current state is replayed immediately.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.state.subscribe(callback)
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.watch()
    }

    /// Wait until the initial restore has finished and return that state.
    pub async fn wait_until_resolved(&self) -> SessionState {
        let mut receiver = self.watch();
        let resolved = match receiver.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            // The store was dropped; nothing will resolve it any more.
            Err(_) => self.current(),
        };
        resolved
    }
}

/// Owner of the session lifecycle.
pub struct SessionStore<P: AuthProvider> {
    provider: Arc<P>,
    handle: SessionHandle,
}

impl<P: AuthProvider> Clone for SessionStore<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            handle: self.handle.clone(),
        }
    }
}

impl<P: AuthProvider> SessionStore<P> {
    /// Create a store in the loading state; call [`Self::restore`] next.
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            handle: SessionHandle {
                state: Observable::new(SessionState::initial()),
            },
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn current(&self) -> SessionState {
        self.handle.current()
    }

    pub fn current_session(&self) -> Option<AuthSession> {
        self.handle.current_session()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.handle.subscribe(callback)
    }

    /// Restore the persisted session and leave the loading state.
    ///
    /// A storage or refresh failure resolves to "signed out" so startup
    /// never blocks on it.
    pub async fn restore(&self) -> Option<AuthUser> {
        let session = match self.provider.restore_session().await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!("Failed to restore session: {}", error);
                None
            }
        };
        match &session {
            Some(session) => tracing::info!("Restored session for user {}", session.user.id),
            None => tracing::info!("No persisted session"),
        }
        let user = session.as_ref().map(|session| session.user.clone());
        self.publish(session);
        user
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        let session = self.provider.sign_in(email, password).await?;
        let user = session.user.clone();
        self.publish(Some(session));
        Ok(user)
    }

    /// Register a new account.
    ///
    /// Only [`SignUpOutcome::SignedIn`] changes the session; a pending email
    /// confirmation leaves the user signed out.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        let outcome = self.provider.sign_up(email, password).await?;
        match &outcome {
            SignUpOutcome::SignedIn(session) => self.publish(Some(session.clone())),
            SignUpOutcome::ConfirmationRequired => {
                tracing::info!("Sign-up pending email confirmation");
            }
        }
        Ok(outcome)
    }

    /// Sign out. The local session is always cleared, even when the remote
    /// invalidation call fails.
    pub async fn sign_out(&self) {
        if let Some(session) = self.current_session() {
            if let Err(error) = self.provider.sign_out(&session.access_token).await {
                tracing::warn!("Remote sign-out failed, clearing local session: {}", error);
                if let Err(error) = self.provider.clear_local_session() {
                    tracing::warn!("Failed to clear persisted session: {}", error);
                }
            }
        } else if let Err(error) = self.provider.clear_local_session() {
            tracing::warn!("Failed to clear persisted session: {}", error);
        }
        self.publish(None);
        tracing::info!("Signed out");
    }

    /// Refresh the access token when it is about to expire.
    ///
    /// Returns whether a refresh happened. A rejected refresh token signs the
    /// user out locally.
    pub async fn refresh_if_expiring(&self) -> AuthResult<bool> {
        let Some(session) = self.current_session() else {
            return Ok(false);
        };
        if !session.is_expired() {
            return Ok(false);
        }

        match self.provider.refresh_session(&session.refresh_token).await {
            Ok(refreshed) => {
                tracing::debug!("Refreshed access token for user {}", refreshed.user.id);
                self.publish(Some(refreshed));
                Ok(true)
            }
            Err(AuthError::Api(message)) => {
                tracing::warn!("Refresh token rejected, signing out: {}", message);
                if let Err(error) = self.provider.clear_local_session() {
                    tracing::warn!("Failed to clear persisted session: {}", error);
                }
                self.publish(None);
                Err(AuthError::Api(message))
            }
            Err(error) => Err(error),
        }
    }

    /// Periodically refresh the access token in the background.
    pub fn spawn_auto_refresh(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = store.refresh_if_expiring().await {
                    tracing::warn!("Background session refresh failed: {}", error);
                }
            }
        })
    }

    fn publish(&self, session: Option<AuthSession>) {
        self.handle.state.set(SessionState {
            session,
            loading: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::{InMemoryAuthProvider, SessionPersistence};
    use crate::util::unix_timestamp_now;

    fn store_with_account() -> SessionStore<InMemoryAuthProvider> {
        SessionStore::new(InMemoryAuthProvider::default().with_account("a@example.com", "pw"))
    }

    #[tokio::test]
    async fn starts_loading_and_resolves_without_session() {
        let store = store_with_account();
        assert!(store.current().loading);

        assert!(store.restore().await.is_none());
        let state = store.current();
        assert!(!state.loading);
        assert!(state.session.is_none());
    }

    #[tokio::test]
    async fn restore_uses_persisted_session() {
        let provider = InMemoryAuthProvider::default();
        let persisted = provider.issue_session("a@example.com", unix_timestamp_now() + 600);
        provider.persistence().save_session(&persisted).unwrap();
        let store = SessionStore::new(provider);

        let user = store.restore().await.unwrap();
        assert_eq!(user, persisted.user);
    }

    #[tokio::test]
    async fn sign_in_notifies_subscribers() {
        let store = store_with_account();
        store.restore().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(move |state| {
            sink.lock().unwrap().push(state.is_signed_in());
        });

        store.sign_in("a@example.com", "pw").await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn invalid_credentials_leave_state_untouched() {
        let store = store_with_account();
        store.restore().await;

        let error = store.sign_in("a@example.com", "wrong").await.unwrap_err();
        assert!(matches!(error, AuthError::Api(_)));
        assert!(!store.current().is_signed_in());
    }

    #[tokio::test]
    async fn late_subscriber_receives_terminal_state() {
        let store = store_with_account();
        store.restore().await;
        store.sign_in("a@example.com", "pw").await.unwrap();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(move |state| {
            *sink.lock().unwrap() = Some(state.clone());
        });

        let replayed = seen.lock().unwrap().clone().unwrap();
        assert!(!replayed.loading);
        assert!(replayed.is_signed_in());
    }

    #[tokio::test]
    async fn sign_up_requiring_confirmation_stays_signed_out() {
        let store = store_with_account();
        store.restore().await;
        store.provider().require_email_confirmation(true);

        let outcome = store.sign_up("new@example.com", "pw").await.unwrap();
        assert_eq!(outcome, SignUpOutcome::ConfirmationRequired);
        assert!(!store.current().is_signed_in());
    }

    #[tokio::test]
    async fn sign_out_clears_session_when_remote_call_fails() {
        let store = store_with_account();
        store.restore().await;
        store.sign_in("a@example.com", "pw").await.unwrap();
        store.provider().fail_remote_sign_out(true);

        store.sign_out().await;

        assert!(store.current_session().is_none());
        assert!(store.provider().persistence().stored().is_none());
    }

    #[tokio::test]
    async fn require_session_fails_when_signed_out() {
        let store = store_with_account();
        store.restore().await;
        assert!(matches!(
            store.handle().require_session(),
            Err(AuthError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn wait_until_resolved_returns_after_restore() {
        let store = store_with_account();
        let handle = store.handle();
        let waiter = tokio::spawn(async move { handle.wait_until_resolved().await });

        store.restore().await;

        let state = waiter.await.unwrap();
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn wait_until_resolved_returns_restored_session() {
        let provider = InMemoryAuthProvider::default();
        let persisted = provider.issue_session("a@example.com", unix_timestamp_now() + 600);
        provider.persistence().save_session(&persisted).unwrap();
        let store = SessionStore::new(provider);
        store.restore().await;

        let state = store.handle().wait_until_resolved().await;
        assert_eq!(state.session, Some(persisted));
    }

    #[tokio::test]
    async fn rejected_refresh_signs_out_locally() {
        let provider = InMemoryAuthProvider::default();
        let expiring = provider.issue_session("a@example.com", unix_timestamp_now() + 5);
        provider.persistence().save_session(&expiring).unwrap();
        let store = SessionStore::new(provider);
        store.handle.state.set(SessionState {
            session: Some(expiring),
            loading: false,
        });
        store.provider().fail_refresh(true);

        assert!(store.refresh_if_expiring().await.is_err());
        assert!(store.current_session().is_none());
    }

    #[tokio::test]
    async fn expiring_session_is_refreshed() {
        let provider = InMemoryAuthProvider::default();
        let expiring = provider.issue_session("a@example.com", unix_timestamp_now() + 5);
        let store = SessionStore::new(provider);
        store.handle.state.set(SessionState {
            session: Some(expiring.clone()),
            loading: false,
        });

        assert!(store.refresh_if_expiring().await.unwrap());
        let refreshed = store.current_session().unwrap();
        assert_ne!(refreshed.access_token, expiring.access_token);
        assert!(!store.refresh_if_expiring().await.unwrap());
    }
}
