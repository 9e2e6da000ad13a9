use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{cache::CacheStore, config::Settings};
use crate::exam::orchestrator::ExamOrchestrator;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    cache: CacheStore,
    orchestrator: ExamOrchestrator,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        cache: CacheStore,
        orchestrator: ExamOrchestrator,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, cache, orchestrator }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    pub(crate) fn orchestrator(&self) -> &ExamOrchestrator {
        &self.inner.orchestrator
    }
}
