//! Route changes requested by the views.

use std::sync::Mutex;

use crate::types::view::Route;

pub trait Navigator: Send + Sync {
    fn navigate_to(&self, route: Route);
}

/// Navigator that remembers every route it was sent to. Hosts without a real
/// router (the CLI) read the current route back from it.
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<Route>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Route> {
        self.history().last().copied()
    }

    pub fn history(&self) -> Vec<Route> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Navigator for HistoryNavigator {
    fn navigate_to(&self, route: Route) {
        tracing::info!(path = route.path(), "navigate");
        match self.history.lock() {
            Ok(mut history) => history.push(route),
            Err(poisoned) => poisoned.into_inner().push(route),
        }
    }
}
