use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Semaphore;

use crate::core::config::Settings;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    // Caps simultaneously running sandbox containers across all requests.
    sandbox_permits: Semaphore,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: PgPool) -> Self {
        let permits = settings.sandbox().max_concurrent as usize;
        Self { inner: Arc::new(InnerState { settings, db, sandbox_permits: Semaphore::new(permits) }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn sandbox_permits(&self) -> &Semaphore {
        &self.inner.sandbox_permits
    }
}
