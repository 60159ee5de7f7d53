//! Routing gate: maps session transitions to the reachable screen set.
//!
//! The gate starts on [`Route::Splash`]. It leaves the splash only once both
//! the minimum splash duration has elapsed and the session has resolved,
//! then follows every later sign-in/sign-out immediately.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::NoteId;
use crate::observe::{Observable, Subscription};
use crate::session::{SessionHandle, SessionState};

/// Default minimum splash display time.
pub const DEFAULT_SPLASH_DURATION: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Splash,
    Unauthenticated,
    Authenticated,
}

impl Route {
    fn for_session(state: &SessionState) -> Option<Self> {
        if state.loading {
            None
        } else if state.is_signed_in() {
            Some(Self::Authenticated)
        } else {
            Some(Self::Unauthenticated)
        }
    }

    /// Whether `screen` may be shown while this route is active.
    pub const fn permits(self, screen: &Screen) -> bool {
        match self {
            Self::Splash => matches!(screen, Screen::Splash),
            Self::Unauthenticated => matches!(screen, Screen::Login),
            Self::Authenticated => matches!(
                screen,
                Screen::NoteList
                    | Screen::NoteEditor(_)
                    | Screen::NoteViewer(_)
                    | Screen::Profile
            ),
        }
    }

    /// Screen the app lands on when this route becomes active.
    pub const fn landing_screen(self) -> Screen {
        match self {
            Self::Splash => Screen::Splash,
            Self::Unauthenticated => Screen::Login,
            Self::Authenticated => Screen::NoteList,
        }
    }
}

fn first_route(state: &SessionState) -> Route {
    Route::for_session(state).unwrap_or_else(|| {
        tracing::warn!("Session store went away while loading; treating as signed out");
        Route::Unauthenticated
    })
}

/// Which note the editor is opened for.
///
/// Existing targets keep the raw id as handed over by navigation; the note
/// service rejects malformed ids before any remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorTarget {
    New,
    Existing(String),
}

impl EditorTarget {
    pub fn existing(id: NoteId) -> Self {
        Self::Existing(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Splash,
    Login,
    NoteList,
    NoteEditor(EditorTarget),
    NoteViewer(NoteId),
    Profile,
}

/// Session-driven navigation state machine.
#[derive(Clone)]
pub struct RoutingGate {
    session: SessionHandle,
    splash_duration: Duration,
    route: Observable<Route>,
}

impl RoutingGate {
    pub fn new(session: SessionHandle, splash_duration: Duration) -> Self {
        Self {
            session,
            splash_duration,
            route: Observable::new(Route::Splash),
        }
    }

    pub fn current(&self) -> Route {
        self.route.get()
    }

    /// Observe route changes; the current route is replayed immediately.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Route) + Send + Sync + 'static,
    {
        self.route.subscribe(move |route| callback(*route))
    }

    pub fn watch(&self) -> watch::Receiver<Route> {
        self.route.watch()
    }

    /// Whether `screen` is reachable right now.
    pub fn permits(&self, screen: &Screen) -> bool {
        self.current().permits(screen)
    }

    /// Wait for `max(splash timer, session resolved)` and decide the first
    /// route from the session state at that moment.
    pub async fn resolve_splash(&self) -> Route {
        self.hold_splash().await;
        first_route(&self.session.current())
    }

    async fn hold_splash(&self) {
        tokio::join!(
            tokio::time::sleep(self.splash_duration),
            self.session.wait_until_resolved()
        );
    }

    /// Drive the gate for the lifetime of the app.
    ///
    /// Dropping or aborting the returned future cancels cleanly, including
    /// while the splash is still showing.
    pub async fn run(self) {
        let mut session_changes = self.session.watch();

        self.hold_splash().await;
        // Decide from the snapshot marked as seen so a change published in
        // between is still delivered by `changed()`.
        let first = first_route(&session_changes.borrow_and_update());
        tracing::info!("Splash finished, routing to {:?}", first);
        self.route.set_if_changed(first);

        while session_changes.changed().await.is_ok() {
            let next = Route::for_session(&session_changes.borrow_and_update());
            if let Some(next) = next {
                if self.route.set_if_changed(next) {
                    tracing::info!("Session changed, routing to {:?}", next);
                }
            }
        }
        tracing::debug!("Session store dropped; routing gate stopped");
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::auth::{InMemoryAuthProvider, SessionPersistence};
    use crate::session::SessionStore;
    use crate::util::unix_timestamp_now;

    fn signed_in_store() -> SessionStore<InMemoryAuthProvider> {
        let provider = InMemoryAuthProvider::default().with_account("a@example.com", "pw");
        let session = provider.issue_session("a@example.com", unix_timestamp_now() + 3_600);
        provider.persistence().save_session(&session).unwrap();
        SessionStore::new(provider)
    }

    fn restore_after(store: &SessionStore<InMemoryAuthProvider>, delay: Duration) {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.restore().await;
        });
    }

    #[tokio::test(start_paused = true)]
    async fn early_session_waits_for_splash_timer() {
        let store = signed_in_store();
        let gate = RoutingGate::new(store.handle(), DEFAULT_SPLASH_DURATION);
        let started = Instant::now();
        restore_after(&store, Duration::from_millis(50));

        let route = gate.resolve_splash().await;

        assert_eq!(route, Route::Authenticated);
        assert!(started.elapsed() >= Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn late_session_routes_as_soon_as_it_resolves() {
        let store = SessionStore::new(InMemoryAuthProvider::default());
        let gate = RoutingGate::new(store.handle(), DEFAULT_SPLASH_DURATION);
        let started = Instant::now();
        restore_after(&store, Duration::from_millis(3_000));

        let route = gate.resolve_splash().await;

        assert_eq!(route, Route::Unauthenticated);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3_000));
        assert!(elapsed < Duration::from_millis(3_010));
    }

    #[tokio::test(start_paused = true)]
    async fn gate_holds_splash_then_follows_session() {
        let store = signed_in_store();
        let gate = RoutingGate::new(store.handle(), DEFAULT_SPLASH_DURATION);
        let task = gate.spawn();
        restore_after(&store, Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(1_999)).await;
        assert_eq!(gate.current(), Route::Splash);

        let mut routes = gate.watch();
        routes
            .wait_for(|route| *route == Route::Authenticated)
            .await
            .unwrap();

        let signed_out_at = Instant::now();
        store.sign_out().await;
        routes
            .wait_for(|route| *route == Route::Unauthenticated)
            .await
            .unwrap();
        assert!(signed_out_at.elapsed() < Duration::from_millis(10));

        store.sign_in("a@example.com", "pw").await.unwrap();
        routes
            .wait_for(|route| *route == Route::Authenticated)
            .await
            .unwrap();

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn sign_in_at_splash_deadline_is_routed() {
        let store = SessionStore::new(
            InMemoryAuthProvider::default().with_account("a@example.com", "pw"),
        );
        let gate = RoutingGate::new(store.handle(), DEFAULT_SPLASH_DURATION);
        let task = gate.spawn();
        restore_after(&store, Duration::from_millis(50));

        let signing_in = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DEFAULT_SPLASH_DURATION).await;
            signing_in.sign_in("a@example.com", "pw").await.unwrap();
        });

        let mut routes = gate.watch();
        tokio::time::timeout(
            Duration::from_millis(2_100),
            routes.wait_for(|route| *route == Route::Authenticated),
        )
        .await
        .expect("sign-in at the splash deadline was not routed")
        .unwrap();

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn aborting_during_splash_leaves_route_untouched() {
        let store = signed_in_store();
        let gate = RoutingGate::new(store.handle(), DEFAULT_SPLASH_DURATION);
        let task = gate.spawn();
        store.restore().await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        task.abort();
        tokio::time::sleep(Duration::from_millis(3_000)).await;

        assert_eq!(gate.current(), Route::Splash);
    }

    #[test]
    fn routes_gate_screens() {
        let viewer = Screen::NoteViewer(uuid::Uuid::new_v4().into());
        assert!(Route::Authenticated.permits(&viewer));
        assert!(!Route::Unauthenticated.permits(&viewer));
        assert!(!Route::Splash.permits(&Screen::Login));
        assert!(Route::Unauthenticated.permits(&Screen::Login));
        assert!(!Route::Authenticated.permits(&Screen::Login));
        assert_eq!(Route::Authenticated.landing_screen(), Screen::NoteList);
    }
}
