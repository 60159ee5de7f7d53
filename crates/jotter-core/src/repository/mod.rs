//! Remote note repository contract.
//!
//! Every call carries the caller's [`AuthSession`]; the backend scopes rows
//! to that identity, so the client never sends an ownership filter.

mod memory;
mod postgrest;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::auth::AuthSession;
use crate::error::Result;
use crate::models::{Note, NoteDraft, NoteId};

pub use memory::InMemoryNoteRepository;
pub use postgrest::PostgrestNoteRepository;

/// CRUD over the caller's `notes` collection.
///
/// Errors distinguish [`crate::Error::NotFound`], [`crate::Error::PermissionDenied`],
/// and transport/service failures ([`crate::Error::Remote`], [`crate::Error::Http`]).
pub trait NoteRepository: Send + Sync + 'static {
    /// All notes of the caller, most recently updated first.
    fn list_recent(&self, session: &AuthSession) -> impl Future<Output = Result<Vec<Note>>> + Send;

    fn get(&self, session: &AuthSession, id: NoteId) -> impl Future<Output = Result<Note>> + Send;

    /// Insert a note; the backend assigns id and timestamps.
    fn insert(
        &self,
        session: &AuthSession,
        draft: &NoteDraft,
    ) -> impl Future<Output = Result<Note>> + Send;

    fn update(
        &self,
        session: &AuthSession,
        id: NoteId,
        draft: &NoteDraft,
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Note>> + Send;

    fn delete(&self, session: &AuthSession, id: NoteId) -> impl Future<Output = Result<()>> + Send;
}
