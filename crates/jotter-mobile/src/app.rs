//! App bootstrap: creates the long-lived services once and tears them down
//! on exit.

use std::time::Duration;

use jotter_core::auth::{AuthProvider, SupabaseAuthClient};
use jotter_core::config::ClientConfig;
use jotter_core::connectivity::{ConnectivityMonitor, HttpReachabilityProbe, ReachabilityProbe};
use jotter_core::repository::{NoteRepository, PostgrestNoteRepository};
use jotter_core::routing::RoutingGate;
use jotter_core::services::NoteService;
use jotter_core::session::SessionStore;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::session_storage::SessionStorage;

pub type LiveApp = App<SupabaseAuthClient<SessionStorage>, PostgrestNoteRepository>;

#[derive(Debug, Clone, Copy)]
pub struct AppOptions {
    pub splash_duration: Duration,
    pub session_refresh_interval: Duration,
}

impl AppOptions {
    pub const fn from_config(config: &ClientConfig) -> Self {
        Self {
            splash_duration: config.splash_duration(),
            session_refresh_interval: config.session_refresh_interval(),
        }
    }
}

pub struct App<P: AuthProvider, R: NoteRepository> {
    session: SessionStore<P>,
    connectivity: ConnectivityMonitor,
    gate: RoutingGate,
    notes: NoteService<R>,
    tasks: Vec<JoinHandle<()>>,
}

impl<P: AuthProvider, R: NoteRepository> App<P, R> {
    /// Create the services and start the routing gate, session restore, and
    /// background token refresh. Must be called inside a Tokio runtime.
    pub fn bootstrap(provider: P, repository: R, options: AppOptions) -> Self {
        let session = SessionStore::new(provider);
        let connectivity = ConnectivityMonitor::new();
        let gate = RoutingGate::new(session.handle(), options.splash_duration);
        let notes = NoteService::new(repository, session.handle());

        let restoring = session.clone();
        let tasks = vec![
            gate.spawn(),
            tokio::spawn(async move {
                restoring.restore().await;
            }),
            session.spawn_auto_refresh(options.session_refresh_interval),
        ];

        tracing::info!("Jotter services started");
        Self {
            session,
            connectivity,
            gate,
            notes,
            tasks,
        }
    }

    /// Poll `probe` for reachability until shutdown.
    pub fn monitor_connectivity<Q: ReachabilityProbe>(&mut self, probe: Q, interval: Duration) {
        self.tasks
            .push(self.connectivity.spawn_polling(probe, interval));
    }

    /// Keep `task` running until shutdown.
    pub fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub const fn session(&self) -> &SessionStore<P> {
        &self.session
    }

    pub const fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub const fn gate(&self) -> &RoutingGate {
        &self.gate
    }

    pub const fn notes(&self) -> &NoteService<R> {
        &self.notes
    }

    /// Stop every background task started by the app.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("Jotter services stopped");
    }
}

/// Build the app against the hosted backend described by `config`.
pub fn bootstrap_live(config: &ClientConfig) -> Result<LiveApp, AppError> {
    let Some((url, anon_key)) = config.supabase()? else {
        return Err(AppError::BackendNotConfigured);
    };

    let storage = SessionStorage::for_kind(config.session_store)?;
    let auth = SupabaseAuthClient::new(&url, anon_key.clone(), storage)?;
    let repository = PostgrestNoteRepository::new(&url, anon_key)?;

    let settings_client = auth.clone();
    let mut app = App::bootstrap(auth, repository, AppOptions::from_config(config));
    app.track(tokio::spawn(async move {
        match settings_client.fetch_settings().await {
            Ok(settings) if settings.disable_signup => {
                tracing::info!("Sign-ups are disabled for this project");
            }
            Ok(settings) => tracing::debug!("Auth settings: {:?}", settings),
            Err(error) => tracing::warn!("Failed to fetch auth settings: {}", error),
        }
    }));
    if let Some(probe_url) = config.connectivity_probe_url() {
        let probe = HttpReachabilityProbe::new(probe_url)?;
        app.monitor_connectivity(probe, config.connectivity_interval());
    } else {
        tracing::warn!("No connectivity probe URL configured; offline banner disabled");
    }
    Ok(app)
}
