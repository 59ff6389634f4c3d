//! USSD gateway binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialise tracing
//! 3. Open the SQLite database (migrations + geography seed)
//! 4. Wire the orchestrator with its registration, geography and
//!    session-log collaborators
//! 5. Start the callback worker and the axum server

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use ussd_api::callbacks::spawn_callback_worker;
use ussd_api::state::AppState;
use ussd_core::config::UssdConfig;
use ussd_engine::{CachedGeography, Orchestrator, SqliteGeography, SqliteRegistry, SqliteSessionLog};
use ussd_storage::Database;

use cli::{expand_home, CliArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = UssdConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting ussd-gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), dialect = %config.gateway.dialect, "Configuration ready");

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("ussd.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Engine.
    let geography = CachedGeography::new(
        SqliteGeography::new(Arc::clone(&db)),
        Duration::from_secs(config.session.geography_cache_secs),
    );
    let orchestrator = Orchestrator::new(
        config.clone(),
        Arc::new(SqliteRegistry::new(
            Arc::clone(&db),
            config.party.membership_prefix.clone(),
        )),
        Arc::new(geography),
    )?
    .with_session_log(Arc::new(SqliteSessionLog::new(Arc::clone(&db))));
    tracing::info!(
        nodes = orchestrator.graph().len(),
        max_attempts = config.session.max_invalid_attempts,
        "Orchestrator ready"
    );

    // Callback worker.
    let (callbacks, _worker) = spawn_callback_worker(Arc::clone(&db), config.limits.callback_queue);

    // API server.
    let state = AppState::new(orchestrator, db, callbacks);
    ussd_api::start_server(&config, state).await?;

    Ok(())
}
