//! Opsdeck CLI - scoped backup and restore for tenant dashboards

use clap::{Parser, Subcommand};
use opsdeck_core::api::{handle_backup, handle_list_snapshots, handle_restore, BackupRequest};
use opsdeck_core::config::Config;
use opsdeck_core::domain::backup::{audit, RestoreRequest};
use opsdeck_core::objects::FsObjectStore;
use opsdeck_core::storage::{Database, DatabaseConfig};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "opsdeck")]
#[command(author, version, about = "Scoped backup and restore for tenant dashboards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a new snapshot
    Backup {
        /// Scope: "all" or a team id
        #[arg(short, long, default_value = "all")]
        scope: String,
        /// Operator user id (must be a super admin)
        #[arg(short, long)]
        operator: String,
    },

    /// Restore a snapshot over current data
    Restore {
        /// Snapshot locator, e.g. 2026-01-01/backup-...
        locator: String,
        /// Scope: "all" or a team id (defaults to the snapshot's scope)
        #[arg(short, long)]
        scope: Option<String>,
        /// Confirm that the restore overwrites current data
        #[arg(short, long)]
        yes: bool,
        /// Operator user id (must be a super admin)
        #[arg(short, long)]
        operator: String,
    },

    /// List available snapshots, newest first
    Snapshots {
        /// Operator user id (must be a super admin)
        #[arg(short, long)]
        operator: String,
    },

    /// Show the backup/restore audit trail
    Audit {
        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration
    Show,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("opsdeck=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Backup { scope, operator } => {
            let db = open_database(&config).await?;
            let objects = open_object_store(&config)?;
            cmd_backup(&db, &objects, &config, &scope, &operator, cli.format, cli.quiet).await
        }

        Commands::Restore {
            locator,
            scope,
            yes,
            operator,
        } => {
            let db = open_database(&config).await?;
            let objects = open_object_store(&config)?;
            cmd_restore(
                &db, &objects, &config, &locator, scope, yes, &operator, cli.format, cli.quiet,
            )
            .await
        }

        Commands::Snapshots { operator } => {
            let db = open_database(&config).await?;
            let objects = open_object_store(&config)?;
            cmd_snapshots(&db, &objects, &config, &operator, cli.format).await
        }

        Commands::Audit { limit } => {
            let db = open_database(&config).await?;
            cmd_audit(&db, limit, cli.format).await
        }

        Commands::Config { action } => cmd_config(&config, action),

        Commands::Doctor => {
            let db = open_database(&config).await?;
            cmd_doctor(&db, &config, cli.quiet).await
        }
    }
}

async fn open_database(config: &Config) -> anyhow::Result<Database> {
    let db_config = match &config.storage.database_path {
        Some(path) => DatabaseConfig::with_path(path),
        None => DatabaseConfig::default(),
    };
    Database::new(db_config).await
}

fn open_object_store(config: &Config) -> anyhow::Result<FsObjectStore> {
    let root = match &config.storage.object_root {
        Some(root) => root.clone(),
        None => default_object_root()?,
    };
    std::fs::create_dir_all(&root)?;
    Ok(FsObjectStore::new(root))
}

fn default_object_root() -> anyhow::Result<PathBuf> {
    let dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
        .join("opsdeck")
        .join("objects");
    Ok(dir)
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_backup(
    db: &Database,
    objects: &FsObjectStore,
    config: &Config,
    scope: &str,
    operator: &str,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let request = BackupRequest {
        scope: Some(scope.to_string()),
    };
    let response = handle_backup(db, objects, &config.backup, operator, &request).await;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return exit_status(response.success, response.error.map(|e| e.message));
    }

    match (response.outcome, response.error) {
        (Some(outcome), _) => {
            info!(backup_path = %outcome.backup_path, "Backup created");
            if !quiet {
                println!("Backup created: {}", outcome.backup_path);
                println!("  {}", outcome.summary());
            }
            Ok(())
        }
        (None, error) => exit_status(false, error.map(|e| e.message)),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_restore(
    db: &Database,
    objects: &FsObjectStore,
    config: &Config,
    locator: &str,
    scope: Option<String>,
    yes: bool,
    operator: &str,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let request = RestoreRequest {
        snapshot_locator: locator.to_string(),
        confirm: yes,
        restore_scope: scope,
    };
    let response = handle_restore(db, objects, &config.backup, operator, &request).await;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return exit_status(response.success, response.error.map(|e| e.message));
    }

    match (response.outcome, response.error) {
        (Some(outcome), _) => {
            info!(backup_path = %outcome.backup_path, "Restore complete");
            if !quiet {
                println!("Restore complete: {}", outcome.backup_path);
                println!("  {}", outcome.summary());
                if !outcome.tables_skipped.is_empty() {
                    println!("  Skipped tables: {}", outcome.tables_skipped.join(", "));
                }
            }
            Ok(())
        }
        (None, error) => {
            if let Some(error) = &error {
                if let Some(suggestion) = &error.suggestion {
                    eprintln!("Hint: {}", suggestion);
                }
            }
            exit_status(false, error.map(|e| e.message))
        }
    }
}

async fn cmd_snapshots(
    db: &Database,
    objects: &FsObjectStore,
    config: &Config,
    operator: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let response = handle_list_snapshots(db, objects, &config.backup, operator).await;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return exit_status(response.success, response.error.map(|e| e.message));
    }

    if !response.success {
        return exit_status(false, response.error.map(|e| e.message));
    }
    if response.snapshots.is_empty() {
        println!("No snapshots found.");
    } else {
        for locator in &response.snapshots {
            println!("{}", locator);
        }
    }
    Ok(())
}

async fn cmd_audit(db: &Database, limit: i64, format: OutputFormat) -> anyhow::Result<()> {
    let entries = audit::recent(db.pool(), limit).await?;

    if let OutputFormat::Json = format {
        let value: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "opType": e.op_type,
                    "scope": e.scope,
                    "backupPath": e.backup_path,
                    "triggeredByUserId": e.triggered_by_user_id,
                    "details": e.details,
                    "createdAt": e.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No audit entries.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:7}  scope={}  path={}  by={}",
            entry.created_at, entry.op_type, entry.scope, entry.backup_path,
            entry.triggered_by_user_id
        );
        if let Some(details) = entry.details {
            println!("    {}", details);
        }
    }
    Ok(())
}

fn cmd_config(config: &Config, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("backup_bucket = {}", config.backup.backup_bucket);
            println!("diagram_bucket = {}", config.backup.diagram_bucket);
            println!("document_bucket = {}", config.backup.document_bucket);
            println!(
                "diagram_prefixes = {}",
                config.backup.diagram_prefixes.join(", ")
            );
            println!(
                "business_plan_prefix = {}",
                config.backup.business_plan_prefix
            );
            match &config.storage.database_path {
                Some(path) => println!("database_path = {}", path.display()),
                None => println!("database_path = (default)"),
            }
            match &config.storage.object_root {
                Some(root) => println!("object_root = {}", root.display()),
                None => println!("object_root = (default)"),
            }
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
            Ok(())
        }
    }
}

async fn cmd_doctor(db: &Database, config: &Config, quiet: bool) -> anyhow::Result<()> {
    db.health_check().await?;
    let status = db.migration_status().await?;

    if !quiet {
        println!("Database: ok ({})", db.path().display());
        println!(
            "Schema: v{} (target v{}){}",
            status.current_version,
            status.target_version,
            if status.needs_migration {
                " - migration needed"
            } else {
                ""
            }
        );
        println!("Backup bucket: {}", config.backup.backup_bucket);
    }

    if status.needs_migration {
        anyhow::bail!("database schema is out of date; re-run to apply migrations");
    }
    Ok(())
}

fn exit_status(success: bool, message: Option<String>) -> anyhow::Result<()> {
    if success {
        return Ok(());
    }
    let message = message.unwrap_or_else(|| "operation failed".to_string());
    warn!(error = %message, "Command failed");
    Err(anyhow::anyhow!(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_are_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_restore_parses_flags() {
        let cli = Cli::parse_from([
            "opsdeck", "restore", "2026-01-01/backup-x", "--scope", "team-1", "--yes",
            "--operator", "admin-1",
        ]);
        match cli.command {
            Commands::Restore {
                locator,
                scope,
                yes,
                operator,
            } => {
                assert_eq!(locator, "2026-01-01/backup-x");
                assert_eq!(scope.as_deref(), Some("team-1"));
                assert!(yes);
                assert_eq!(operator, "admin-1");
            }
            _ => panic!("expected restore command"),
        }
    }
}
