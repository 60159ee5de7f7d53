//! jotter-core - Core library for Jotter
//!
//! This crate contains the shared models, the auth session store, the
//! connectivity monitor, the routing gate, and the remote note repository
//! used by the Jotter app shell.

pub mod auth;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod observe;
pub mod repository;
pub mod routing;
pub mod services;
pub mod session;
pub mod util;

pub use error::{Error, Result};
pub use models::{Note, NoteDraft, NoteId};
