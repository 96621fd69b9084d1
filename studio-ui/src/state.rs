//! Shared application state for the UI server.

use std::sync::Arc;

use studio::app::Studio;
use studio::router::RequestRouter;
use studio::session::SessionStore;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The project the server was started for.
    pub studio: Arc<Studio>,
}

impl AppState {
    pub fn new(studio: Studio) -> Self {
        Self {
            studio: Arc::new(studio),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.studio.store()
    }

    pub fn router(&self) -> &RequestRouter {
        self.studio.router()
    }
}
