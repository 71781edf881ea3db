use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use feedkeeper::config::Config;
use feedkeeper::core::ports::{Enricher, FeedParser, NoopEnricher, Store};
use feedkeeper::core::{Core, CoreConfig};
use feedkeeper::feed::RssAtomParser;
use feedkeeper::storage::{Database, StoreError};

/// Get the config directory path (~/.config/feedkeeper/).
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedkeeper"))
}

#[derive(Parser, Debug)]
#[command(name = "feedkeeperd", about = "Feed refresh and maintenance daemon")]
struct Args {
    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Run a single refresh-all sweep and exit, instead of running as a
    /// long-lived daemon. Useful for cron-style invocation.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    eprintln!("warning: failed to set config directory permissions: {e}");
                }
            }
            Err(e) => {
                eprintln!("warning: failed to read config directory metadata: {e}");
            }
        }
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    let args = Args::parse();

    let db_path = if config.database_path.starts_with('/') {
        PathBuf::from(&config.database_path)
    } else {
        config_dir.join(&config.database_path)
    };

    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        tracing::info!("database reset");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(StoreError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedkeeperd appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    if db.get_setting("max_concurrent_refreshes").await?.is_none() {
        db.set_setting(
            "max_concurrent_refreshes",
            &config.default_max_concurrent_refreshes.to_string(),
        )
        .await?;
    }

    let store: Arc<dyn Store> = Arc::new(db);
    let parser: Arc<dyn FeedParser> = Arc::new(RssAtomParser);
    let enricher: Arc<dyn Enricher> = Arc::new(NoopEnricher);

    let core_config = CoreConfig {
        user_agent: config.user_agent.clone(),
        max_concurrent_refreshes: config.default_max_concurrent_refreshes.max(1) as usize,
        shutdown_grace_period: std::time::Duration::from_secs(config.shutdown_grace_period_secs),
    };
    let core = Core::new(store, parser, enricher, core_config);

    if args.once {
        core.refresh_all().await;
        let snapshot = core.progress().await.context("failed to read progress after sweep")?;
        println!("{}", serde_json::to_string(&snapshot).context("failed to serialize progress")?);
        tracing::info!("single sweep complete");
        return Ok(());
    }

    core.start().await;
    tracing::info!("feedkeeperd running, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutdown signal received");
    core.stop().await;

    Ok(())
}
