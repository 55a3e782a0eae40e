pub mod api;
pub mod auth;
pub mod authorization;
pub mod calendar;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod dashboard;
pub mod db;
pub mod models;
pub mod scheduling;
pub mod search;
pub mod validation;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// How often the audit buffer is flushed and expired sessions purged.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("Cannot create data directory {path}: {source}")]
    DataDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Core(#[from] core_state::CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Start the clinic service and block until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::ClinicConfig::from_env()?;
    std::fs::create_dir_all(&config.data_dir).map_err(|source| StartupError::DataDir {
        path: config.data_dir.clone(),
        source,
    })?;

    let bind_addr = config.bind_addr;
    let core = Arc::new(core_state::CoreState::new(config));

    // Migrations run on first open; fail fast on a broken database.
    let conn = core.open_db()?;
    let tables = db::count_tables(&conn).unwrap_or_default();
    let schema = db::schema_version(&conn).unwrap_or_default();
    drop(conn);
    tracing::info!(path = %core.db_path().display(), tables, schema, "Database ready");

    let server = api::start_server_on(core.clone(), bind_addr).await?;
    tracing::info!(addr = %server.addr(), "Listening");

    let maintenance = spawn_maintenance(core.clone());

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }
    tracing::info!("Shutting down");

    maintenance.abort();
    server.stop().await;
    if let Err(e) = core.flush_and_prune_audit() {
        tracing::warn!("Final audit flush failed: {e}");
    }
    Ok(())
}

fn spawn_maintenance(core: Arc<core_state::CoreState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
        // First tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let core = core.clone();
            match tokio::task::spawn_blocking(move || core.run_maintenance(chrono::Utc::now())).await {
                Ok(Ok(purged)) if purged > 0 => {
                    tracing::debug!(purged, "Expired sessions removed");
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!("Maintenance failed: {e}"),
                Err(e) => tracing::error!("Maintenance task panicked: {e}"),
            }
        }
    })
}
