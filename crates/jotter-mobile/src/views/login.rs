use jotter_core::auth::{AuthProvider, SignUpOutcome};
use jotter_core::session::SessionStore;

use crate::ui::Alert;

const MISSING_FIELDS: &str = "Please fill in all fields";
const SIGN_UP_SENT: &str = "Check your email if confirmation is required";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginMode {
    #[default]
    SignIn,
    SignUp,
}

impl LoginMode {
    pub const fn submit_label(self) -> &'static str {
        match self {
            Self::SignIn => "Sign In",
            Self::SignUp => "Sign Up",
        }
    }

    pub const fn toggle_label(self) -> &'static str {
        match self {
            Self::SignIn => "Don't have an account? Sign Up",
            Self::SignUp => "Already have an account? Sign In",
        }
    }
}

/// Email/password form for signing in or creating an account.
///
/// A successful sign-in changes the session; the routing gate then moves
/// the app to the note list, so the view itself never navigates.
pub struct LoginView<P: AuthProvider> {
    session: SessionStore<P>,
    pub email: String,
    pub password: String,
    mode: LoginMode,
    busy: bool,
}

impl<P: AuthProvider> LoginView<P> {
    pub fn new(session: SessionStore<P>) -> Self {
        Self {
            session,
            email: String::new(),
            password: String::new(),
            mode: LoginMode::default(),
            busy: false,
        }
    }

    pub const fn mode(&self) -> LoginMode {
        self.mode
    }

    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            LoginMode::SignIn => LoginMode::SignUp,
            LoginMode::SignUp => LoginMode::SignIn,
        };
    }

    /// Submit the form. Returns the message to show, if any.
    pub async fn submit(&mut self) -> Option<Alert> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Some(Alert::error(MISSING_FIELDS));
        }

        self.busy = true;
        let email = self.email.trim().to_string();
        let alert = match self.mode {
            LoginMode::SignIn => match self.session.sign_in(&email, &self.password).await {
                Ok(user) => {
                    tracing::info!("Signed in as {}", user.id);
                    self.password.clear();
                    None
                }
                Err(error) => {
                    tracing::warn!("Sign-in failed: {}", error);
                    Some(Alert::error(error.to_string()))
                }
            },
            LoginMode::SignUp => match self.session.sign_up(&email, &self.password).await {
                Ok(outcome) => {
                    self.password.clear();
                    if outcome == SignUpOutcome::ConfirmationRequired {
                        self.mode = LoginMode::SignIn;
                    }
                    Some(Alert::success(SIGN_UP_SENT))
                }
                Err(error) => {
                    tracing::warn!("Sign-up failed: {}", error);
                    Some(Alert::error(error.to_string()))
                }
            },
        };
        self.busy = false;
        alert
    }
}
