use jotter_core::models::{Note, NoteId};
use jotter_core::repository::NoteRepository;
use jotter_core::routing::{EditorTarget, Screen};
use jotter_core::services::NoteService;

use crate::ui::{ActionOutcome, Alert, Navigation, Prompt, ScreenLifetime};

pub const NOT_FOUND_MESSAGE: &str = "Note not found";
const DELETED_MESSAGE: &str = "Note deleted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerState {
    Loading,
    Loaded(Note),
    NotFound,
    Failed(Alert),
}

/// Read-only view of a single note.
pub struct NoteViewerView<R: NoteRepository> {
    notes: NoteService<R>,
    id: NoteId,
    lifetime: ScreenLifetime,
    state: ViewerState,
}

impl<R: NoteRepository> NoteViewerView<R> {
    pub fn new(notes: NoteService<R>, id: NoteId) -> Self {
        Self {
            notes,
            id,
            lifetime: ScreenLifetime::new(),
            state: ViewerState::Loading,
        }
    }

    pub const fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn lifetime(&self) -> ScreenLifetime {
        self.lifetime.clone()
    }

    /// Body text, with a placeholder for empty notes.
    pub fn body(&self) -> Option<&str> {
        match &self.state {
            ViewerState::Loaded(note) => Some(note.display_content()),
            _ => None,
        }
    }

    /// Fetch the note; runs on every focus.
    pub async fn load(&mut self) {
        self.state = ViewerState::Loading;
        let result = self.notes.get(self.id).await;
        if !self.lifetime.is_alive() {
            tracing::debug!("Viewer dismissed; dropping fetch result");
            return;
        }
        self.state = match result {
            Ok(note) => ViewerState::Loaded(note),
            Err(error) if error.is_not_found() => ViewerState::NotFound,
            Err(error) => {
                tracing::warn!("Failed to load note {}: {}", self.id, error);
                ViewerState::Failed(Alert::from_error(&error))
            }
        };
    }

    pub fn edit(&self) -> Navigation {
        Navigation::Push(Screen::NoteEditor(EditorTarget::existing(self.id)))
    }

    /// Ask for confirmation, delete, then go back.
    pub async fn delete<Q: Prompt>(&mut self, prompt: &Q) -> ActionOutcome {
        if !prompt
            .confirm("Delete Note", "Are you sure you want to delete this note?")
            .await
        {
            return ActionOutcome::Cancelled;
        }

        match self.notes.delete(self.id).await {
            Ok(()) => ActionOutcome::Done {
                alert: Some(Alert::success(DELETED_MESSAGE)),
                navigation: Some(Navigation::Back),
            },
            Err(error) => {
                tracing::warn!("Failed to delete note {}: {}", self.id, error);
                ActionOutcome::Failed(Alert::from_error(&error))
            }
        }
    }
}
