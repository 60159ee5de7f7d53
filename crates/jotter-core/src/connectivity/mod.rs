//! Device reachability tracking.
//!
//! The monitor starts in [`ConnectivityState::Unknown`] and only flips to
//! online/offline once a reachability report or probe has resolved, so the
//! first paint never shows a false "offline" banner.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::observe::{Observable, Subscription};
use crate::util::is_http_url;

const PROBE_TIMEOUT_SECS: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl ConnectivityState {
    pub const fn from_reachable(reachable: bool) -> Self {
        if reachable {
            Self::Online
        } else {
            Self::Offline
        }
    }

    /// Only a confirmed offline state shows the banner.
    pub const fn shows_offline_banner(self) -> bool {
        matches!(self, Self::Offline)
    }
}

/// One-shot reachability check.
pub trait ReachabilityProbe: Send + Sync + 'static {
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// Probe that treats any HTTP response from `url` as reachable.
#[derive(Clone)]
pub struct HttpReachabilityProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpReachabilityProbe {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        if !is_http_url(&url) {
            return Err(Error::Validation(format!(
                "connectivity probe URL must include http:// or https://: {url}"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;
        Ok(Self { url, client })
    }
}

impl ReachabilityProbe for HttpReachabilityProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                tracing::debug!("Reachability probe answered HTTP {}", response.status());
                true
            }
            Err(error) => {
                tracing::debug!("Reachability probe failed: {}", error);
                false
            }
        }
    }
}

/// Tracks the last known reachability and notifies observers on change.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Observable<ConnectivityState>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self {
            state: Observable::new(ConnectivityState::Unknown),
        }
    }

    pub fn current(&self) -> ConnectivityState {
        self.state.get()
    }

    /// Register for changes; the current state is replayed immediately.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ConnectivityState) + Send + Sync + 'static,
    {
        self.state.subscribe(move |state| callback(*state))
    }

    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.state.watch()
    }

    /// Record a platform reachability report.
    pub fn report(&self, reachable: bool) {
        let next = ConnectivityState::from_reachable(reachable);
        if self.state.set_if_changed(next) {
            tracing::info!("Connectivity changed: {:?}", next);
        }
    }

    /// Run `probe` once and record the result.
    pub async fn check_now<R: ReachabilityProbe>(&self, probe: &R) -> ConnectivityState {
        self.report(probe.is_reachable().await);
        self.current()
    }

    /// Re-check reachability every `interval` until the task is aborted.
    pub fn spawn_polling<R: ReachabilityProbe>(&self, probe: R, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.check_now(&probe).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    struct ToggleProbe(Arc<AtomicBool>);

    impl ReachabilityProbe for ToggleProbe {
        async fn is_reachable(&self) -> bool {
            self.0.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn unknown_never_shows_banner() {
        assert!(!ConnectivityState::Unknown.shows_offline_banner());
        assert!(!ConnectivityState::Online.shows_offline_banner());
        assert!(ConnectivityState::Offline.shows_offline_banner());
    }

    #[test]
    fn banner_follows_state_transitions() {
        let monitor = ConnectivityMonitor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = monitor.subscribe(move |state| {
            sink.lock().unwrap().push(state.shows_offline_banner());
        });

        monitor.report(false);
        monitor.report(false);
        monitor.report(true);

        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }

    #[test]
    fn dropped_subscription_stops_updates() {
        let monitor = ConnectivityMonitor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = monitor.subscribe(move |state| sink.lock().unwrap().push(state));
        drop(subscription);

        monitor.report(true);
        assert_eq!(*seen.lock().unwrap(), vec![ConnectivityState::Unknown]);
    }

    #[tokio::test]
    async fn check_now_records_probe_result() {
        let monitor = ConnectivityMonitor::new();
        let flag = Arc::new(AtomicBool::new(false));
        let probe = ToggleProbe(Arc::clone(&flag));

        assert_eq!(monitor.check_now(&probe).await, ConnectivityState::Offline);
        flag.store(true, Ordering::Relaxed);
        assert_eq!(monitor.check_now(&probe).await, ConnectivityState::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_picks_up_changes() {
        let monitor = ConnectivityMonitor::new();
        let flag = Arc::new(AtomicBool::new(true));
        let task = monitor.spawn_polling(ToggleProbe(Arc::clone(&flag)), Duration::from_secs(5));
        let mut receiver = monitor.watch();

        receiver
            .wait_for(|state| *state == ConnectivityState::Online)
            .await
            .unwrap();
        flag.store(false, Ordering::Relaxed);
        receiver
            .wait_for(|state| *state == ConnectivityState::Offline)
            .await
            .unwrap();

        task.abort();
    }

    #[test]
    fn http_probe_requires_scheme() {
        assert!(matches!(
            HttpReachabilityProbe::new("example.com"),
            Err(Error::Validation(_))
        ));
    }
}
