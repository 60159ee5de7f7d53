//! In-memory [`NoteRepository`] that behaves like the hosted backend.
//!
//! Rows are scoped to the session's user id, ids and timestamps are assigned
//! on insert, and missing rows report [`Error::NotFound`]. Primarily for
//! tests and offline demos.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use super::NoteRepository;
use crate::auth::AuthSession;
use crate::error::{Error, Result};
use crate::models::{Note, NoteDraft, NoteId};

#[derive(Default)]
struct Rows {
    notes: Vec<(String, Note)>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Rows {
    /// Server clock; strictly increasing so inserts never tie.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + TimeDelta::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn find_mut(&mut self, owner: &str, id: NoteId) -> Option<&mut Note> {
        self.notes
            .iter_mut()
            .find(|(row_owner, note)| row_owner == owner && note.id == id)
            .map(|(_, note)| note)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNoteRepository {
    rows: Arc<Mutex<Rows>>,
    calls: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl InMemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remote calls issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Simulate the backend being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every call, to keep requests in flight.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Total rows across all owners.
    pub fn row_count(&self) -> usize {
        self.lock().notes.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Rows> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn begin_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Remote("network request failed".to_string()));
        }
        Ok(())
    }
}

impl NoteRepository for InMemoryNoteRepository {
    async fn list_recent(&self, session: &AuthSession) -> Result<Vec<Note>> {
        self.begin_call().await?;
        let rows = self.lock();
        let mut notes: Vec<Note> = rows
            .notes
            .iter()
            .filter(|(owner, _)| *owner == session.user.id)
            .map(|(_, note)| note.clone())
            .collect();
        notes.sort_by_key(|note| std::cmp::Reverse(note.recency()));
        Ok(notes)
    }

    async fn get(&self, session: &AuthSession, id: NoteId) -> Result<Note> {
        self.begin_call().await?;
        self.lock()
            .find_mut(&session.user.id, id)
            .map(|note| note.clone())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn insert(&self, session: &AuthSession, draft: &NoteDraft) -> Result<Note> {
        self.begin_call().await?;
        let mut rows = self.lock();
        let now = rows.now();
        let note = Note {
            id: NoteId::from(Uuid::new_v4()),
            title: draft.title.clone(),
            content: draft.content.clone(),
            created_at: now,
            updated_at: Some(now),
        };
        rows.notes.push((session.user.id.clone(), note.clone()));
        Ok(note)
    }

    async fn update(
        &self,
        session: &AuthSession,
        id: NoteId,
        draft: &NoteDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<Note> {
        self.begin_call().await?;
        let mut rows = self.lock();
        let note = rows
            .find_mut(&session.user.id, id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        note.title.clone_from(&draft.title);
        note.content.clone_from(&draft.content);
        note.updated_at = Some(updated_at);
        Ok(note.clone())
    }

    async fn delete(&self, session: &AuthSession, id: NoteId) -> Result<()> {
        self.begin_call().await?;
        let mut rows = self.lock();
        let before = rows.notes.len();
        rows.notes
            .retain(|(owner, note)| !(*owner == session.user.id && note.id == id));
        if rows.notes.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}
