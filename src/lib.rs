pub(crate) mod admin;
pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use anyhow::Context;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::storage::StorageService;
use crate::tasks::store::PgStore;

pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let storage = StorageService::from_settings(&settings)
        .await?
        .context("S3 credentials are required to run the worker")?;
    let state = AppState::new(settings, db_pool);

    tracing::info!(
        environment = %state.settings().runtime().environment.as_str(),
        concurrency = state.settings().worker().concurrency,
        "Grader queue worker starting"
    );

    tasks::scheduler::run(state, storage).await
}

pub async fn run_queue_admin() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let command = admin::parse_args(std::env::args().skip(1))?;
    if command == admin::Command::Help {
        println!("{}", admin::USAGE);
        return Ok(());
    }

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let store = PgStore::new(db_pool);
    let mut stdout = std::io::stdout();
    admin::execute(command, &store, &mut stdout).await
}
