pub mod api;
pub mod auth;
pub mod authorization;
pub mod config;
pub mod consumption;
pub mod core_state;
pub mod db;
pub mod doctors;
pub mod error;
pub mod medications;
pub mod models;
pub mod patients;
pub mod reporting;
pub mod schedules;
pub mod seed;
pub mod validation;

#[cfg(test)]
mod test_fixtures;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::CoreState;
use crate::error::StartupError;

/// Start the service and block until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    tracing::info!(db = %config.db_path.display(), bind = %config.bind, "Configuration loaded");

    let core = Arc::new(CoreState::from_config(&config));
    prepare_database(core.clone(), config.seed_demo).await?;

    let mut server = api::start_api_server(core, config.bind).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await.map_err(StartupError::Signal)?;
    server.shutdown();
    server.stopped().await;
    Ok(())
}

/// Run migrations and, when asked, load the demo data. Seeding hashes
/// the demo passwords, so it runs on the blocking pool.
async fn prepare_database(core: Arc<CoreState>, seed_demo: bool) -> Result<(), StartupError> {
    tokio::task::spawn_blocking(move || -> Result<(), StartupError> {
        let mut conn = core.open_db()?;
        if seed_demo {
            let today = chrono::Local::now().date_naive();
            if let Some(summary) = seed::seed_demo_data(&mut conn, today)? {
                tracing::info!(
                    accounts = summary.accounts,
                    patients = summary.patients,
                    "Demo accounts ready"
                );
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| StartupError::Task(e.to_string()))?
}
