//! RoleKeeper Provisioning
//!
//! Connects to the authorization database, creates the schema, and
//! provisions the resource types, scopes and roles from configuration.
//! The resulting report is printed to stdout as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use rk_authz::{Db, ProvisionReport, Provisioner};
use rk_config::{AppConfig, ConfigLoader};

/// RoleKeeper provisioning tool
#[derive(Parser, Debug)]
#[command(name = "rk-provision")]
#[command(about = "Create the RoleKeeper schema and well-known roles")]
struct Args {
    /// Configuration file (defaults to the standard search paths)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database URL, overriding the configuration
    #[arg(long)]
    database_url: Option<String>,

    /// Provision inside a transaction and roll it back
    #[arg(long)]
    dry_run: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    example_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    rk_common::logging::init_logging("rk-provision");

    let args = Args::parse();

    if args.example_config {
        print!("{}", AppConfig::example_toml());
        return Ok(());
    }

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("loading configuration")?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    config.validate().context("invalid configuration")?;

    info!(url = %config.database.url, dry_run = args.dry_run, "Starting RoleKeeper provisioning");

    let db = Db::connect(&config.database)
        .await
        .context("connecting to the authorization database")?;
    db.init_schema().await.context("initializing schema")?;

    let report = if args.dry_run {
        dry_run(&db, &config).await?
    } else {
        Provisioner::provision(&db, &config.provisioning)
            .await
            .context("provisioning")?
    };

    if report.is_empty() {
        info!("Everything already provisioned");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn dry_run(db: &Db, config: &AppConfig) -> Result<ProvisionReport> {
    if !config.provisioning.enabled {
        info!("Provisioning disabled, skipping");
        return Ok(ProvisionReport::default());
    }

    let tx = db.begin_transaction().await?;
    let outcome = Provisioner::provision_in(&tx, &config.provisioning).await;
    tx.rollback().await?;

    let report = outcome.context("provisioning (dry run)")?;
    info!(%report, "Dry run complete, nothing was written");
    Ok(report)
}
