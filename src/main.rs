use std::process::ExitCode;

use tracing::{error, info};

use folio::{Config, Database, HierarchyManager};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = folio::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        folio::logging::init_console_only(&config.logging.level);
    }

    info!("Folio - hierarchical document store");

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.code(), "startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> folio::Result<()> {
    config.validate()?;

    let db = Database::open(&config.database.path, config.database.max_connections).await?;
    let manager = HierarchyManager::from_config(db, config)?;
    let root = manager.ensure_root().await?;

    info!(
        root = %root.id,
        storage = %config.storage.path,
        delete_policy = config.folders.delete_policy.as_str(),
        "document store ready"
    );
    Ok(())
}
