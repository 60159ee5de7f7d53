//! Services shared by the app screens.

mod notes;

pub use notes::{NoteEvent, NoteOperation, NoteService};
