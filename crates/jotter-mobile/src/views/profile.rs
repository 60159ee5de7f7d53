use chrono::Local;
use jotter_core::auth::{AuthProvider, AuthUser};
use jotter_core::session::SessionStore;

use crate::ui::{ActionOutcome, Prompt};

pub const NOT_AVAILABLE: &str = "Not available";

/// Account details for the signed-in user.
pub struct ProfileView<P: AuthProvider> {
    session: SessionStore<P>,
}

impl<P: AuthProvider> ProfileView<P> {
    pub const fn new(session: SessionStore<P>) -> Self {
        Self { session }
    }

    fn user(&self) -> Option<AuthUser> {
        self.session.handle().user()
    }

    pub fn email(&self) -> String {
        self.user()
            .and_then(|user| user.email)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn user_id(&self) -> String {
        self.user()
            .map_or_else(|| NOT_AVAILABLE.to_string(), |user| user.id)
    }

    /// Last sign-in in local time.
    pub fn last_sign_in(&self) -> String {
        self.user()
            .and_then(|user| user.last_sign_in_at)
            .map_or_else(
                || NOT_AVAILABLE.to_string(),
                |at| {
                    at.with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                },
            )
    }

    pub async fn log_out<Q: Prompt>(&self, prompt: &Q) -> ActionOutcome {
        super::confirm_sign_out(&self.session, prompt).await
    }
}
