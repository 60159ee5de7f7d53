//! Note model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A server-assigned note identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Parse an id handed to a screen (route parameter, list selection).
    ///
    /// A blank or malformed id is a caller contract violation and is
    /// reported as [`Error::Validation`].
    pub fn parse_route_param(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Validation("Note id is missing".to_string()));
        }
        raw.parse()
            .map_err(|_| Error::Validation(format!("Invalid note id: {raw}")))
    }
}

impl From<Uuid> for NoteId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A note as stored by the remote backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Server-assigned identifier
    pub id: NoteId,
    /// Required title
    pub title: String,
    /// Plain text body
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    /// Creation timestamp, set by the server
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Timestamp used for recency ordering.
    #[must_use]
    pub fn recency(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Body text for display, with a placeholder for empty notes.
    #[must_use]
    pub fn display_content(&self) -> &str {
        if self.content.trim().is_empty() {
            "No content"
        } else {
            &self.content
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Editable note payload submitted by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Check the draft and return it with a trimmed title.
    pub fn validated(self) -> Result<Self> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Title is required".to_string()));
        }
        Ok(Self {
            title: title.to_string(),
            content: self.content,
        })
    }
}

impl From<&Note> for NoteDraft {
    fn from(note: &Note) -> Self {
        Self::new(note.title.clone(), note.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_route_param_rejects_blank_and_malformed() {
        assert!(matches!(
            NoteId::parse_route_param("  "),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            NoteId::parse_route_param("new"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_parse_route_param_accepts_uuid() {
        let id = NoteId::from(Uuid::new_v4());
        let parsed = NoteId::parse_route_param(&format!(" {id} ")).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_draft_validation_trims_title() {
        let draft = NoteDraft::new("  Groceries ", "milk").validated().unwrap();
        assert_eq!(draft.title, "Groceries");
        assert_eq!(draft.content, "milk");
    }

    #[test]
    fn test_draft_validation_rejects_whitespace_titles() {
        for title in ["", " ", "\n\t", "   \r\n"] {
            let result = NoteDraft::new(title, "body").validated();
            assert!(matches!(result, Err(Error::Validation(_))), "{title:?}");
        }
    }

    #[test]
    fn test_note_deserializes_backend_row() {
        let row = r#"{
            "id": "6c1b1a52-8f3e-4d8e-9a0e-2f0f4c7d9b11",
            "title": "Hello",
            "content": null,
            "created_at": "2025-03-01T10:00:00+00:00",
            "updated_at": null,
            "user_id": "f1d2d2f9-0000-0000-0000-000000000000"
        }"#;
        let note: Note = serde_json::from_str(row).unwrap();
        assert_eq!(note.title, "Hello");
        assert_eq!(note.content, "");
        assert_eq!(note.recency(), note.created_at);
        assert_eq!(note.display_content(), "No content");
    }
}
