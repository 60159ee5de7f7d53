use jotter_core::routing::{Route, RoutingGate};

use crate::ui::Navigation;

pub const APP_TITLE: &str = "Jotter";

/// Splash screen shown until the routing gate leaves [`Route::Splash`].
pub struct SplashView {
    gate: RoutingGate,
}

impl SplashView {
    pub const fn new(gate: RoutingGate) -> Self {
        Self { gate }
    }

    pub const fn title(&self) -> &'static str {
        APP_TITLE
    }

    /// Wait for the gate to pick the first route and navigate there.
    pub async fn wait(&self) -> Navigation {
        let mut routes = self.gate.watch();
        let route = match routes.wait_for(|route| *route != Route::Splash).await {
            Ok(route) => *route,
            Err(_) => {
                tracing::warn!("Routing gate stopped during splash");
                Route::Unauthenticated
            }
        };
        Navigation::Replace(route.landing_screen())
    }
}
