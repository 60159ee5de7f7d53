//! Shared screen primitives: alerts, confirmation prompts, navigation
//! requests, and screen lifetimes.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jotter_core::routing::Screen;
use jotter_core::Error;

/// Blocking message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new("Success", message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn from_error(error: &Error) -> Self {
        Self::new(error.alert_title(), error.to_string())
    }
}

/// Blocking yes/no confirmation.
pub trait Prompt: Send + Sync {
    fn confirm(&self, title: &str, message: &str) -> impl Future<Output = bool> + Send;
}

/// Navigation requested by a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Replace the current screen.
    Replace(Screen),
    /// Open a screen on top of the current one.
    Push(Screen),
    /// Return to the previous screen.
    Back,
}

/// Result of a user action that may need confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Cancelled,
    Done {
        alert: Option<Alert>,
        navigation: Option<Navigation>,
    },
    Failed(Alert),
}

impl ActionOutcome {
    pub const fn navigation(&self) -> Option<&Navigation> {
        match self {
            Self::Done { navigation, .. } => navigation.as_ref(),
            Self::Cancelled | Self::Failed(_) => None,
        }
    }

    pub const fn alert(&self) -> Option<&Alert> {
        match self {
            Self::Done { alert, .. } => alert.as_ref(),
            Self::Failed(alert) => Some(alert),
            Self::Cancelled => None,
        }
    }
}

/// Marks whether a screen is still mounted.
///
/// Fetches check it once they settle; results for a dismissed screen are
/// dropped instead of being applied.
#[derive(Debug, Clone)]
pub struct ScreenLifetime {
    alive: Arc<AtomicBool>,
}

impl Default for ScreenLifetime {
    fn default() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl ScreenLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn dismiss(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use jotter_core::NoteId;

    use super::*;

    #[test]
    fn alert_titles_follow_error_kind() {
        let alert = Alert::from_error(&Error::NotFound("x".to_string()));
        assert_eq!(alert.title, "Note not found");

        let alert = Alert::from_error(&Error::Validation("Title is required".to_string()));
        assert_eq!(alert.title, "Invalid input");
        assert_eq!(alert.message, "Title is required");
    }

    #[test]
    fn dismissing_a_clone_dismisses_the_screen() {
        let lifetime = ScreenLifetime::new();
        let handle = lifetime.clone();
        assert!(lifetime.is_alive());
        handle.dismiss();
        assert!(!lifetime.is_alive());
    }

    #[test]
    fn cancelled_actions_neither_alert_nor_navigate() {
        assert_eq!(ActionOutcome::Cancelled.alert(), None);
        assert_eq!(ActionOutcome::Cancelled.navigation(), None);

        let done = ActionOutcome::Done {
            alert: None,
            navigation: Some(Navigation::Push(Screen::NoteViewer(
                "4f1c3c9e-55c9-4a8f-9a52-0d6b7e1f2a10".parse::<NoteId>().unwrap(),
            ))),
        };
        assert!(done.navigation().is_some());
    }
}
