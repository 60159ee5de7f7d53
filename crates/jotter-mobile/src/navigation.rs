//! Screen stack kept in step with the routing gate.

use jotter_core::routing::{Route, Screen};

use crate::ui::Navigation;

/// Back stack of screens. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavStack {
    screens: Vec<Screen>,
}

impl Default for NavStack {
    fn default() -> Self {
        Self {
            screens: vec![Screen::Splash],
        }
    }
}

impl NavStack {
    pub fn top(&self) -> Screen {
        self.screens.last().cloned().unwrap_or(Screen::Splash)
    }

    /// Reset to the landing screen of `route` when it no longer permits the
    /// top screen. Returns whether the stack was reset.
    pub fn sync_route(&mut self, route: Route) -> bool {
        if self.screens.last().is_some_and(|screen| route.permits(screen)) {
            return false;
        }
        tracing::debug!("Route {:?} resets navigation", route);
        self.screens = vec![route.landing_screen()];
        true
    }

    pub fn apply(&mut self, navigation: Navigation) {
        match navigation {
            Navigation::Replace(screen) => {
                self.screens.pop();
                self.screens.push(screen);
            }
            Navigation::Push(screen) => self.screens.push(screen),
            Navigation::Back => {
                if self.screens.len() > 1 {
                    self.screens.pop();
                }
            }
        }
    }
}
