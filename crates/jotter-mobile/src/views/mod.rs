//! Headless screen models. Each screen owns its UI state and talks to the
//! shared services through handles.
#![cfg_attr(not(test), allow(dead_code, unused_imports))]

mod banner;
mod editor;
mod list;
mod login;
mod profile;
mod splash;
mod viewer;

pub use banner::{OfflineBanner, OFFLINE_MESSAGE};
pub use editor::NoteEditorView;
pub use list::{ListEntry, NoteListView, EMPTY_LIST_MESSAGE};
pub use login::{LoginMode, LoginView};
pub use profile::{ProfileView, NOT_AVAILABLE};
pub use splash::{SplashView, APP_TITLE};
pub use viewer::{NoteViewerView, ViewerState, NOT_FOUND_MESSAGE};

use jotter_core::auth::AuthProvider;
use jotter_core::routing::Screen;
use jotter_core::session::SessionStore;

use crate::ui::{ActionOutcome, Navigation, Prompt};

/// Confirm, then sign out and return to the login screen.
///
/// Sign-out always clears the local session, so this never fails.
pub async fn confirm_sign_out<P, Q>(session: &SessionStore<P>, prompt: &Q) -> ActionOutcome
where
    P: AuthProvider,
    Q: Prompt,
{
    if !prompt
        .confirm("Log Out", "Are you sure you want to log out?")
        .await
    {
        return ActionOutcome::Cancelled;
    }

    session.sign_out().await;
    ActionOutcome::Done {
        alert: None,
        navigation: Some(Navigation::Replace(Screen::Login)),
    }
}
