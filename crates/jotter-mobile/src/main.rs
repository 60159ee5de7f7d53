//! Jotter app shell
//!
//! Boots the session, connectivity, and routing services against the hosted
//! backend and renders the screens in the terminal.

mod app;
mod config;
mod error;
mod navigation;
mod session_storage;
mod terminal;
mod ui;
mod views;


use crate::error::AppError;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "jotter=info"
                    .parse()
                    .map_err(|error| AppError::Config(format!("invalid log directive: {error}")))?,
            ),
        )
        .init();

    let config = config::load_config()?;
    tracing::info!("Starting Jotter...");

    let app = app::bootstrap_live(&config)?;
    let result = Terminal::new(&app).run().await;
    app.shutdown();
    result
}
