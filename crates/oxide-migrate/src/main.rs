//! oxide-migrate CLI
//!
//! Command-line tool for generating and applying schema-driven migrations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate::config::DEFAULT_CONFIG_FILE;
use oxide_migrate::prelude::*;

/// Schema-driven database migrations.
#[derive(Parser)]
#[command(name = "oxide-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Database URL (overrides the configuration file).
    #[arg(short, long, env = "DATABASE_URL")]
    database: Option<String>,

    /// Migrations directory (overrides the configuration file).
    #[arg(short, long)]
    migrations_dir: Option<PathBuf>,

    /// Schema file (overrides the configuration file).
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// SQL dialect: postgres or sqlite (overrides the configuration file).
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the next migration from schema changes.
    Generate {
        /// Migration name/description.
        #[arg(short, long)]
        name: Option<String>,

        /// Show SQL without writing files (dry run).
        #[arg(long)]
        dry_run: bool,

        /// Write a migration even if nothing changed.
        #[arg(short, long)]
        force: bool,
    },

    /// Apply pending migrations.
    Run {
        /// Highest migration number to apply.
        #[arg(short, long)]
        target: Option<u32>,

        /// Apply only the next pending migration.
        #[arg(long)]
        single: bool,

        /// Ignore checksum mismatches of applied migrations.
        #[arg(short, long)]
        force: bool,

        /// List migrations without executing them (dry run).
        #[arg(long)]
        dry_run: bool,

        /// Initialize an empty database from snapshot.sql.
        #[arg(long)]
        bootstrap: bool,
    },

    /// Show migration status.
    Status {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Revert applied migrations.
    Rollback {
        /// Version to roll back to (0 if not specified).
        #[arg(long = "to")]
        to: Option<u32>,

        /// Ignore checksum mismatches of applied migrations.
        #[arg(short, long)]
        force: bool,

        /// List migrations without reverting them (dry run).
        #[arg(long)]
        dry_run: bool,
    },
}

async fn load_config(cli: &Cli) -> anyhow::Result<MigrateConfig> {
    let mut config = MigrateConfig::load_or_default(&cli.config).await?;
    if let Some(url) = &cli.database {
        config = config.with_database_url(url);
    }
    if let Some(dir) = &cli.migrations_dir {
        config = config.with_migrations_dir(dir);
    }
    if let Some(schema) = &cli.schema {
        config = config.with_schema_path(schema);
    }
    if let Some(dialect) = cli.dialect {
        config = config.with_dialect(dialect);
    }
    Ok(config)
}

fn print_status(report: &StatusReport, verbose: bool) {
    if !report.connected {
        println!(
            "Database unreachable: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }
    if !report.ledger_exists {
        println!("Ledger table not found; no migrations have been applied yet.");
    }

    println!("\nMigrations (current version: {}):", report.current);
    println!("{:-<60}", "");
    for entry in &report.applied {
        let mut note = String::new();
        if !entry.file_present {
            note.push_str(" (file missing)");
        } else if !entry.checksum_ok {
            note.push_str(" (checksum mismatch)");
        }
        if verbose {
            println!(
                " [X] {} ({}) {}{}",
                entry.filename,
                entry.applied_at.format("%Y-%m-%d %H:%M:%S"),
                entry.checksum,
                note
            );
        } else {
            println!(" [X] {}{}", entry.filename, note);
        }
    }
    for entry in &report.pending {
        println!(" [ ] {}", entry.filename);
    }
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli).await?;
    let manager = MigrationManager::new(config, JsonSchemaParser)?;

    match cli.command {
        Commands::Generate {
            name,
            dry_run,
            force,
        } => {
            let outcome = manager
                .generate(GenerateOptions {
                    name,
                    dry_run,
                    force,
                })
                .await?;

            match outcome {
                GenerateOutcome::NoChanges => info!("No changes detected."),
                GenerateOutcome::Generated(migration) if migration.dry_run => {
                    println!("Would create migration: {}", migration.filename);
                    for change in &migration.changes {
                        println!("  - {}", change.description);
                    }
                    println!("\n{}", migration.sql);
                }
                GenerateOutcome::Generated(migration) => {
                    info!(
                        "Created migration: {}",
                        manager.store().path(&migration.filename).display()
                    );
                    for change in &migration.changes {
                        info!("  - {}", change.description);
                    }
                }
            }
        }

        Commands::Run {
            target,
            single,
            force,
            dry_run,
            bootstrap,
        } => {
            let outcome = manager
                .run(RunOptions {
                    target,
                    single,
                    force,
                    dry_run,
                    bootstrap,
                })
                .await?;

            for warning in &outcome.warnings {
                warn!("{}", warning);
            }
            if outcome.dry_run {
                info!("Dry run mode - nothing was executed.");
                for number in &outcome.applied {
                    println!(" [ ] {number:04}.sql");
                }
            } else if outcome.bootstrapped {
                info!(
                    "Bootstrapped from snapshot, recorded {} migration(s).",
                    outcome.applied.len()
                );
            } else if outcome.applied.is_empty() {
                info!("No migrations to apply.");
            } else {
                info!("Applied {} migration(s).", outcome.applied.len());
            }
            info!("Current version: {}", outcome.current);
        }

        Commands::Status { json } => {
            let report = manager.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&report, cli.verbose);
            }
            if !report.connected {
                anyhow::bail!("database unreachable");
            }
        }

        Commands::Rollback { to, force, dry_run } => {
            let outcome = manager
                .rollback(RollbackOptions {
                    target: to,
                    dry_run,
                    force,
                })
                .await?;

            if outcome.dry_run {
                info!("Dry run mode - nothing was executed.");
                for number in &outcome.reverted {
                    println!(" [X] {number:04}.sql");
                }
            } else if outcome.reverted.is_empty() {
                info!("No migrations to roll back.");
            } else {
                info!("Rolled back {} migration(s).", outcome.reverted.len());
            }
            info!("Current version: {}", outcome.current);
        }
    }

    Ok(())
}
