//! Note service: the one path screens use to reach the remote repository.
//!
//! It validates input before any remote call, confirms a session is present
//! for every request, rejects duplicate in-flight requests, and announces
//! successful writes so list views can re-fetch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::models::{Note, NoteDraft, NoteId};
use crate::repository::NoteRepository;
use crate::session::SessionHandle;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Change announced after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    Created(NoteId),
    Updated(NoteId),
    Deleted(NoteId),
}

impl NoteEvent {
    pub const fn note_id(self) -> NoteId {
        match self {
            Self::Created(id) | Self::Updated(id) | Self::Deleted(id) => id,
        }
    }
}

/// Operation kinds used to key in-flight requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteOperation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

type InFlightKey = (NoteOperation, Option<NoteId>);

/// Removes its key from the in-flight set when the request settles.
struct InFlightGuard {
    registry: Arc<Mutex<HashSet<InFlightKey>>>,
    key: InFlightKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct NoteService<R: NoteRepository> {
    repository: Arc<R>,
    session: SessionHandle,
    events: broadcast::Sender<NoteEvent>,
    in_flight: Arc<Mutex<HashSet<InFlightKey>>>,
}

impl<R: NoteRepository> Clone for NoteService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            session: self.session.clone(),
            events: self.events.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<R: NoteRepository> NoteService<R> {
    pub fn new(repository: R, session: SessionHandle) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            repository: Arc::new(repository),
            session,
            events,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Receive an event for every successful create, update, and delete.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<NoteEvent> {
        self.events.subscribe()
    }

    /// All of the caller's notes, most recently updated first.
    pub async fn list(&self) -> Result<Vec<Note>> {
        let session = self.session.require_session()?;
        let _guard = self.begin(NoteOperation::List, None)?;
        let notes = self.repository.list_recent(&session).await?;
        tracing::debug!("Fetched {} notes", notes.len());
        Ok(notes)
    }

    pub async fn get(&self, id: NoteId) -> Result<Note> {
        let session = self.session.require_session()?;
        let _guard = self.begin(NoteOperation::Get, Some(id))?;
        self.repository.get(&session, id).await
    }

    /// Fetch by a raw route parameter.
    pub async fn get_by_route_param(&self, raw_id: &str) -> Result<Note> {
        let id = NoteId::parse_route_param(raw_id)?;
        self.get(id).await
    }

    pub async fn create(&self, draft: NoteDraft) -> Result<Note> {
        let draft = draft.validated()?;
        let session = self.session.require_session()?;
        let _guard = self.begin(NoteOperation::Create, None)?;

        let note = self.repository.insert(&session, &draft).await?;
        tracing::info!("Created note {}", note.id);
        self.announce(NoteEvent::Created(note.id));
        Ok(note)
    }

    /// Update the note behind `raw_id`, stamping `updated_at` with the
    /// submission time.
    ///
    /// A missing or malformed id is a caller bug and fails before any
    /// remote call.
    pub async fn update(&self, raw_id: &str, draft: NoteDraft) -> Result<Note> {
        let draft = draft.validated()?;
        let id = NoteId::parse_route_param(raw_id)?;
        let session = self.session.require_session()?;
        let _guard = self.begin(NoteOperation::Update, Some(id))?;

        let note = self
            .repository
            .update(&session, id, &draft, Utc::now())
            .await?;
        tracing::info!("Updated note {}", note.id);
        self.announce(NoteEvent::Updated(note.id));
        Ok(note)
    }

    /// Delete a note. Callers confirm with the user before calling this.
    pub async fn delete(&self, id: NoteId) -> Result<()> {
        let session = self.session.require_session()?;
        let _guard = self.begin(NoteOperation::Delete, Some(id))?;

        self.repository.delete(&session, id).await?;
        tracing::info!("Deleted note {}", id);
        self.announce(NoteEvent::Deleted(id));
        Ok(())
    }

    /// Whether an identical request is currently running.
    pub fn is_in_flight(&self, operation: NoteOperation, id: Option<NoteId>) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(operation, id))
    }

    fn begin(&self, operation: NoteOperation, id: Option<NoteId>) -> Result<InFlightGuard> {
        let key = (operation, id);
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        if !inserted {
            tracing::debug!("Rejected duplicate {:?} request for {:?}", operation, id);
            return Err(Error::InFlight(match id {
                Some(id) => format!("{operation:?} {id}"),
                None => format!("{operation:?}"),
            }));
        }
        Ok(InFlightGuard {
            registry: Arc::clone(&self.in_flight),
            key,
        })
    }

    fn announce(&self, event: NoteEvent) {
        // No receivers just means no list screen is mounted.
        let _ = self.events.send(event);
    }
}
