//! Error types for jotter-core

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias using jotter-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in jotter-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected input such as an empty title or a malformed note id
    #[error("{0}")]
    Validation(String),

    /// Authentication failure, including a missing session at write time
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Network or service failure talking to the note backend
    #[error("Remote error: {0}")]
    Remote(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// The backend refused the request for the current identity
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An identical request is already running
    #[error("Request already in progress: {0}")]
    InFlight(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Title for the blocking message a screen shows for this error.
    pub const fn alert_title(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid input",
            Self::Auth(_) => "Authentication required",
            Self::NotFound(_) => "Note not found",
            Self::PermissionDenied(_) => "Permission denied",
            Self::InFlight(_) => "Please wait",
            Self::Remote(_) | Self::Http(_) | Self::Serialization(_) => "Error",
        }
    }

    /// Whether this error means the note no longer exists remotely.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_titles_follow_error_kind() {
        assert_eq!(
            Error::Validation("Title is required".into()).alert_title(),
            "Invalid input"
        );
        assert_eq!(
            Error::Auth(AuthError::NotSignedIn).alert_title(),
            "Authentication required"
        );
        assert_eq!(Error::Remote("boom".into()).alert_title(), "Error");
        assert!(Error::NotFound("x".into()).is_not_found());
    }

    #[test]
    fn validation_message_is_shown_verbatim() {
        let error = Error::Validation("Title is required".into());
        assert_eq!(error.to_string(), "Title is required");
    }
}
