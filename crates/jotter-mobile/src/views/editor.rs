use jotter_core::models::{Note, NoteDraft};
use jotter_core::repository::NoteRepository;
use jotter_core::routing::{EditorTarget, Screen};
use jotter_core::services::NoteService;

use crate::ui::{ActionOutcome, Alert, Navigation, ScreenLifetime};

const SAVED_MESSAGE: &str = "Note saved!";

/// Create or edit a note.
pub struct NoteEditorView<R: NoteRepository> {
    notes: NoteService<R>,
    target: EditorTarget,
    lifetime: ScreenLifetime,
    pub title: String,
    pub content: String,
    loading: bool,
    saving: bool,
}

impl<R: NoteRepository> NoteEditorView<R> {
    pub fn new(notes: NoteService<R>, target: EditorTarget) -> Self {
        Self {
            notes,
            target,
            lifetime: ScreenLifetime::new(),
            title: String::new(),
            content: String::new(),
            loading: false,
            saving: false,
        }
    }

    pub const fn target(&self) -> &EditorTarget {
        &self.target
    }

    pub fn lifetime(&self) -> ScreenLifetime {
        self.lifetime.clone()
    }

    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    pub const fn is_saving(&self) -> bool {
        self.saving
    }

    pub const fn heading(&self) -> &'static str {
        match self.target {
            EditorTarget::New => "New Note",
            EditorTarget::Existing(_) => "Edit Note",
        }
    }

    /// Fill the form from the stored note when editing.
    pub async fn load(&mut self) -> Option<Alert> {
        let EditorTarget::Existing(raw_id) = &self.target else {
            return None;
        };

        self.loading = true;
        let result = self.notes.get_by_route_param(raw_id).await;
        self.loading = false;

        if !self.lifetime.is_alive() {
            tracing::debug!("Editor dismissed; dropping fetch result");
            return None;
        }
        match result {
            Ok(note) => {
                let draft = NoteDraft::from(&note);
                self.title = draft.title;
                self.content = draft.content;
                None
            }
            Err(error) => {
                tracing::warn!("Failed to load note for editing: {}", error);
                Some(Alert::from_error(&error))
            }
        }
    }

    /// Validate and persist the form, then return to the list.
    pub async fn save(&mut self) -> ActionOutcome {
        let draft = NoteDraft::new(self.title.clone(), self.content.clone());

        self.saving = true;
        let result: jotter_core::Result<Note> = match &self.target {
            EditorTarget::New => self.notes.create(draft).await,
            EditorTarget::Existing(raw_id) => self.notes.update(raw_id, draft).await,
        };
        self.saving = false;

        match result {
            Ok(note) => {
                tracing::debug!("Saved note {}", note.id);
                ActionOutcome::Done {
                    alert: Some(Alert::success(SAVED_MESSAGE)),
                    navigation: Some(Navigation::Replace(Screen::NoteList)),
                }
            }
            Err(error) => ActionOutcome::Failed(Alert::from_error(&error)),
        }
    }
}
