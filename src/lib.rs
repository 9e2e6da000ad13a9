pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod exam;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{cache::CacheStore, config::Settings, state::AppState, telemetry};
use crate::exam::orchestrator::ExamOrchestrator;
use crate::services::generation::GenerationTrigger;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let cache = CacheStore::new(settings.redis().redis_url());
    if let Err(err) = cache.connect().await {
        tracing::error!(error = %err, "Failed to connect to cache store; continuing degraded");
    } else {
        tracing::info!("Cache store connected successfully");
    }

    let trigger = GenerationTrigger::from_settings(&settings)?;
    let orchestrator =
        ExamOrchestrator::new(cache.clone(), trigger, db_pool.clone(), settings.exam());
    let state = AppState::new(settings, db_pool, cache.clone(), orchestrator);

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Certifications Coach API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    cache.disconnect().await;
    tracing::info!("Cache store disconnected");

    result?;

    Ok(())
}
