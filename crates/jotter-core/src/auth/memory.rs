//! In-process auth provider used by tests and offline demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use super::{
    validate_credentials, AuthError, AuthProvider, AuthResult, AuthSession, AuthUser,
    SessionPersistence, SignUpOutcome,
};
use crate::util::unix_timestamp_now;

const SESSION_LIFETIME_SECONDS: i64 = 3_600;

/// Session persistence backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionPersistence {
    slot: Arc<Mutex<Option<AuthSession>>>,
}

impl MemorySessionPersistence {
    pub fn with_session(session: AuthSession) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(session))),
        }
    }

    pub fn stored(&self) -> Option<AuthSession> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionPersistence for MemorySessionPersistence {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self.stored())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user_id: String,
}

#[derive(Debug, Default)]
struct Flags {
    require_confirmation: AtomicBool,
    fail_remote_sign_out: AtomicBool,
    fail_refresh: AtomicBool,
}

/// Auth provider that keeps accounts in memory and mimics GoTrue responses.
#[derive(Clone)]
pub struct InMemoryAuthProvider<S: SessionPersistence = MemorySessionPersistence> {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    flags: Arc<Flags>,
    token_counter: Arc<AtomicU64>,
    store: S,
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new(MemorySessionPersistence::default())
    }
}

impl<S: SessionPersistence> InMemoryAuthProvider<S> {
    pub fn new(store: S) -> Self {
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            flags: Arc::new(Flags::default()),
            token_counter: Arc::new(AtomicU64::new(1)),
            store,
        }
    }

    /// Register a confirmed account.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.insert_account(email, password);
        self
    }

    /// Make sign-ups succeed without returning a session.
    pub fn require_email_confirmation(&self, required: bool) {
        self.flags
            .require_confirmation
            .store(required, Ordering::Relaxed);
    }

    /// Make the remote part of sign-out fail.
    pub fn fail_remote_sign_out(&self, fail: bool) {
        self.flags
            .fail_remote_sign_out
            .store(fail, Ordering::Relaxed);
    }

    /// Make token refresh fail.
    pub fn fail_refresh(&self, fail: bool) {
        self.flags.fail_refresh.store(fail, Ordering::Relaxed);
    }

    pub const fn persistence(&self) -> &S {
        &self.store
    }

    /// Build a session for `email` with a custom expiry, bypassing the password.
    pub fn issue_session(&self, email: &str, expires_at: i64) -> AuthSession {
        let user_id = self.insert_account(email, "");
        self.session_for(email, user_id, expires_at)
    }

    fn insert_account(&self, email: &str, password: &str) -> String {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        accounts
            .entry(normalize_email(email))
            .or_insert_with(|| Account {
                password: password.to_string(),
                user_id: Uuid::new_v4().to_string(),
            })
            .user_id
            .clone()
    }

    fn session_for(&self, email: &str, user_id: String, expires_at: i64) -> AuthSession {
        let serial = self.token_counter.fetch_add(1, Ordering::Relaxed);
        AuthSession {
            access_token: format!("access-{serial}"),
            refresh_token: format!("refresh-{serial}:{}", normalize_email(email)),
            expires_at,
            user: AuthUser {
                id: user_id,
                email: Some(normalize_email(email)),
                last_sign_in_at: Some(Utc::now()),
            },
        }
    }
}

impl<S: SessionPersistence> AuthProvider for InMemoryAuthProvider<S> {
    async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };
        if !stored.is_expired() {
            return Ok(Some(stored));
        }
        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        let account = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_email(email))
            .cloned();
        let account = match account {
            Some(account) if account.password == password => account,
            _ => return Err(AuthError::Api("Invalid login credentials (400)".to_string())),
        };

        let session = self.session_for(
            email,
            account.user_id,
            unix_timestamp_now() + SESSION_LIFETIME_SECONDS,
        );
        self.store.save_session(&session)?;
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;
        let key = normalize_email(email);
        let user_id = {
            let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(&key) {
                return Err(AuthError::Api("User already registered (422)".to_string()));
            }
            let user_id = Uuid::new_v4().to_string();
            accounts.insert(
                key,
                Account {
                    password: password.to_string(),
                    user_id: user_id.clone(),
                },
            );
            user_id
        };

        if self.flags.require_confirmation.load(Ordering::Relaxed) {
            return Ok(SignUpOutcome::ConfirmationRequired);
        }

        let session = self.session_for(
            email,
            user_id,
            unix_timestamp_now() + SESSION_LIFETIME_SECONDS,
        );
        self.store.save_session(&session)?;
        Ok(SignUpOutcome::SignedIn(session))
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if self.flags.fail_refresh.load(Ordering::Relaxed) {
            return Err(AuthError::Api("Invalid Refresh Token (400)".to_string()));
        }
        let email = refresh_token
            .split_once(':')
            .map(|(_, email)| email.to_string())
            .ok_or_else(|| AuthError::Api("Invalid Refresh Token (400)".to_string()))?;
        let user_id = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&email)
            .map(|account| account.user_id.clone())
            .ok_or_else(|| AuthError::Api("User not found (404)".to_string()))?;

        let session = self.session_for(
            &email,
            user_id,
            unix_timestamp_now() + SESSION_LIFETIME_SECONDS,
        );
        self.store.save_session(&session)?;
        Ok(session)
    }

    async fn sign_out(&self, _access_token: &str) -> AuthResult<()> {
        if self.flags.fail_remote_sign_out.load(Ordering::Relaxed) {
            return Err(AuthError::Api("HTTP 503".to_string()));
        }
        self.store.clear_session()
    }

    fn clear_local_session(&self) -> AuthResult<()> {
        self.store.clear_session()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_checks_password_and_persists() {
        let provider = InMemoryAuthProvider::default().with_account("a@example.com", "pw");

        assert!(provider.sign_in("a@example.com", "nope").await.is_err());
        let session = provider.sign_in(" A@example.com ", "pw").await.unwrap();

        assert_eq!(session.user.email.as_deref(), Some("a@example.com"));
        assert_eq!(provider.persistence().stored(), Some(session));
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let provider = InMemoryAuthProvider::default().with_account("a@example.com", "pw");
        let error = provider.sign_up("a@example.com", "pw2").await.unwrap_err();
        assert!(error.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_on_restore() {
        let provider = InMemoryAuthProvider::default();
        let expired = provider.issue_session("a@example.com", unix_timestamp_now() - 10);
        provider.persistence().save_session(&expired).unwrap();

        let restored = provider.restore_session().await.unwrap().unwrap();
        assert!(!restored.is_expired());
        assert_eq!(restored.user.id, expired.user.id);
    }

    #[tokio::test]
    async fn failed_refresh_clears_persisted_session() {
        let provider = InMemoryAuthProvider::default();
        let expired = provider.issue_session("a@example.com", unix_timestamp_now() - 10);
        provider.persistence().save_session(&expired).unwrap();
        provider.fail_refresh(true);

        assert!(provider.restore_session().await.unwrap().is_none());
        assert!(provider.persistence().stored().is_none());
    }
}
