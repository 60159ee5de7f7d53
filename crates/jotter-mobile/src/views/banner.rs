use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jotter_core::connectivity::ConnectivityMonitor;
use jotter_core::observe::Subscription;

pub const OFFLINE_MESSAGE: &str = "No Internet Connection";

/// Banner shown on every screen while the device is known to be offline.
pub struct OfflineBanner {
    visible: Arc<AtomicBool>,
    _subscription: Subscription,
}

impl OfflineBanner {
    pub fn attach(monitor: &ConnectivityMonitor) -> Self {
        let visible = Arc::new(AtomicBool::new(false));
        let observer = Arc::clone(&visible);
        let subscription = monitor.subscribe(move |state| {
            observer.store(state.shows_offline_banner(), Ordering::Release);
        });
        Self {
            visible,
            _subscription: subscription,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn text(&self) -> Option<&'static str> {
        self.is_visible().then_some(OFFLINE_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_tracks_connectivity() {
        let monitor = ConnectivityMonitor::new();
        let banner = OfflineBanner::attach(&monitor);
        assert_eq!(banner.text(), None);

        monitor.report(false);
        assert_eq!(banner.text(), Some(OFFLINE_MESSAGE));

        monitor.report(true);
        assert!(!banner.is_visible());
    }
}
