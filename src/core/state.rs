use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::tasks::store::PgStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    store: PgStore,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: PgPool) -> Self {
        let store = PgStore::new(db.clone());
        Self { inner: Arc::new(InnerState { settings, db, store }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn store(&self) -> &PgStore {
        &self.inner.store
    }
}
