use jotter_core::auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] jotter_core::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Supabase is not configured. Set JOTTER_SUPABASE_URL and JOTTER_SUPABASE_ANON_KEY or add them to the config file."
    )]
    BackendNotConfigured,
}
