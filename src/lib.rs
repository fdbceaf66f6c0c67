pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod harness;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use clap::Parser;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::harness::runner::RunnerConfig;

/// Entry point of the grading service binary.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let state = AppState::new(settings, db_pool);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Gradecell API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}

/// Entry point of the in-container harness binary. Prints exactly one JSON
/// result document on stdout; anything that prevents that exits nonzero so
/// the dispatcher records an infrastructure error instead of a grade.
pub async fn run_harness() -> anyhow::Result<()> {
    let args = harness::HarnessArgs::parse();
    telemetry::init_stderr_tracing(&args.log_level)?;

    let config = RunnerConfig {
        student_dir: args.student_dir,
        tests_dir: args.tests_dir,
        test_timeout: Duration::from_secs(args.test_timeout_secs),
    };

    let report = harness::runner::run_language(&args.language, &config).await?;
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}
