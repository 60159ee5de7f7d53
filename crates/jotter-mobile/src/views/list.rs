use jotter_core::models::{Note, NoteId};
use jotter_core::repository::NoteRepository;
use jotter_core::routing::{EditorTarget, Screen};
use jotter_core::services::{NoteEvent, NoteService};
use jotter_core::util::preview_text;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::ui::{ActionOutcome, Alert, Navigation, Prompt, ScreenLifetime};

pub const EMPTY_LIST_MESSAGE: &str = "No notes yet. Create one!";
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub id: NoteId,
    pub title: String,
    pub preview: String,
}

/// The signed-in user's notes, most recently updated first.
pub struct NoteListView<R: NoteRepository> {
    notes: NoteService<R>,
    changes: broadcast::Receiver<NoteEvent>,
    lifetime: ScreenLifetime,
    items: Vec<Note>,
    loaded: bool,
    loading: bool,
    refreshing: bool,
    alert: Option<Alert>,
}

impl<R: NoteRepository> NoteListView<R> {
    pub fn new(notes: NoteService<R>) -> Self {
        let changes = notes.subscribe_changes();
        Self {
            notes,
            changes,
            lifetime: ScreenLifetime::new(),
            items: Vec::new(),
            loaded: false,
            loading: false,
            refreshing: false,
            alert: None,
        }
    }

    pub fn lifetime(&self) -> ScreenLifetime {
        self.lifetime.clone()
    }

    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    pub const fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn notes(&self) -> &[Note] {
        &self.items
    }

    pub fn take_alert(&mut self) -> Option<Alert> {
        self.alert.take()
    }

    pub fn entries(&self) -> Vec<ListEntry> {
        self.items
            .iter()
            .map(|note| ListEntry {
                id: note.id,
                title: note.title.clone(),
                preview: preview_text(note.display_content(), PREVIEW_CHARS),
            })
            .collect()
    }

    /// Placeholder shown once a fetch returned no notes.
    pub fn empty_message(&self) -> Option<&'static str> {
        (self.loaded && self.items.is_empty()).then_some(EMPTY_LIST_MESSAGE)
    }

    /// Fetch when the screen gains focus.
    pub async fn load(&mut self) {
        self.loading = true;
        self.fetch().await;
        self.loading = false;
    }

    /// Pull-to-refresh.
    pub async fn refresh(&mut self) {
        self.refreshing = true;
        self.fetch().await;
        self.refreshing = false;
    }

    /// Re-fetch when notes changed elsewhere since the last check.
    ///
    /// Returns whether a fetch ran.
    pub async fn sync_changes(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.changes.try_recv() {
                Ok(event) => {
                    tracing::debug!("Note list invalidated by {:?}", event);
                    changed = true;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("Note list missed {} change events", skipped);
                    changed = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if changed {
            self.fetch().await;
        }
        changed
    }

    /// Ask for confirmation, then delete the note and refresh.
    pub async fn delete<Q: Prompt>(&mut self, id: NoteId, prompt: &Q) -> ActionOutcome {
        if !prompt
            .confirm("Delete Note", "Are you sure you want to delete this note?")
            .await
        {
            return ActionOutcome::Cancelled;
        }

        match self.notes.delete(id).await {
            Ok(()) => {
                // Our own delete event is handled by the fetch below.
                self.drain_changes();
                self.fetch().await;
                ActionOutcome::Done {
                    alert: None,
                    navigation: None,
                }
            }
            Err(error) => {
                tracing::warn!("Failed to delete note {}: {}", id, error);
                ActionOutcome::Failed(Alert::from_error(&error))
            }
        }
    }

    pub const fn open(id: NoteId) -> Navigation {
        Navigation::Push(Screen::NoteViewer(id))
    }

    pub const fn new_note() -> Navigation {
        Navigation::Push(Screen::NoteEditor(EditorTarget::New))
    }

    pub const fn open_profile() -> Navigation {
        Navigation::Push(Screen::Profile)
    }

    async fn fetch(&mut self) {
        let result = self.notes.list().await;
        if !self.lifetime.is_alive() {
            tracing::debug!("Note list dismissed; dropping fetch result");
            return;
        }
        match result {
            Ok(notes) => {
                self.items = notes;
                self.loaded = true;
            }
            Err(error) => {
                tracing::warn!("Failed to load notes: {}", error);
                self.alert = Some(Alert::from_error(&error));
            }
        }
    }

    fn drain_changes(&mut self) {
        while !matches!(
            self.changes.try_recv(),
            Err(TryRecvError::Empty | TryRecvError::Closed)
        ) {}
    }
}
