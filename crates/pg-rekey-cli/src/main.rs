//! pg-rekey CLI - change the primary key of a PostgreSQL table.

mod wizard;

use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Select};
use pg_rekey::{
    Config, HealthCheckResult, KeyType, MigrateError, MigrationReport, MigrationRequest, Migrator,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "pg-rekey")]
#[command(about = "Replace a PostgreSQL table's primary key, keeping foreign keys and metadata in sync")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "pg-rekey.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    // None opens the action menu
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace a table's primary key with a new int or uuid column
    ChangePrimaryKey {
        /// Table whose primary key is replaced (prompted if omitted)
        #[arg(long)]
        table: Option<String>,

        /// Name of the new primary-key column (prompted if omitted)
        #[arg(long)]
        column: Option<String>,

        /// Type of the new primary-key column: int or uuid (prompted if omitted)
        #[arg(long = "type")]
        key_type: Option<String>,

        /// Keep the old key column instead of dropping it
        #[arg(long)]
        keep_old_key: bool,

        /// Run every step, then roll back
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Test the database connection and look for the metadata catalog
    HealthCheck,

    /// Create or edit a configuration file interactively
    Init {
        /// Output path for configuration file [default: pg-rekey.yaml]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force overwrite existing file without confirmation
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();
    let command = match cli.command {
        Some(command) => command,
        None => prompt_command()?,
    };

    // Handle init command separately (doesn't need existing config)
    if let Commands::Init { output, force } = command {
        // No logging setup for wizard - keeps terminal clean for interactive prompts
        let output_path = output.unwrap_or_else(|| PathBuf::from("pg-rekey.yaml"));
        wizard::run_wizard(&output_path, force)
            .await
            .map_err(|e| MigrateError::Config(e.to_string()))?;
        return Ok(());
    }

    ensure_config_exists(&cli.config)?;

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match command {
        Commands::Init { .. } => unreachable!(), // Handled above
        Commands::ChangePrimaryKey {
            table,
            column,
            key_type,
            keep_old_key,
            dry_run,
            yes,
        } => {
            let table = match table {
                Some(table) => table,
                None => prompt_text("Table name", None)?,
            };
            let column = match column {
                Some(column) => column,
                None => prompt_text("New primary key column name", Some("uuid"))?,
            };
            let key_type = match key_type {
                Some(key_type) => key_type,
                None => prompt_key_type()?,
            };

            let request = MigrationRequest::new(table, column, &key_type)?
                .keep_old_key_column(keep_old_key)
                .with_dry_run(dry_run);

            if !yes && !dry_run && !confirm_migration(&config, &request)? {
                return Err(MigrateError::Config("Migration cancelled".to_string()));
            }

            let migrator = Migrator::connect(config).await?;
            let result = migrator.run(request).await;
            migrator.close();
            let report = result?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_report(&report);
            }
        }

        Commands::HealthCheck => {
            let target = config.database.display_target();
            let result = match Migrator::connect(config).await {
                Ok(migrator) => {
                    let result = migrator.health_check().await;
                    migrator.close();
                    result?
                }
                Err(e) => HealthCheckResult {
                    connected: false,
                    target,
                    latency_ms: 0,
                    catalog_present: false,
                    error: Some(e.to_string()),
                },
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  PostgreSQL ({}): {} ({}ms)",
                    result.target,
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
                if result.connected {
                    println!(
                        "  Metadata catalog: {}",
                        if result.catalog_present { "present" } else { "not found" }
                    );
                }
            }

            if !result.connected {
                return Err(MigrateError::pool(
                    result.error.unwrap_or_default(),
                    "health check",
                ));
            }
        }
    }

    Ok(())
}

fn ensure_config_exists(path: &Path) -> Result<(), MigrateError> {
    if path.exists() {
        return Ok(());
    }
    Err(MigrateError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!(
            "configuration file {} not found; run 'pg-rekey init' to create it",
            path.display()
        ),
    )))
}

fn prompt_command() -> Result<Commands, MigrateError> {
    let actions = [
        "Change a table's primary key",
        "Create or edit the configuration file",
        "Check the database connection",
    ];
    let selection = Select::new()
        .with_prompt("What do you want to do?")
        .items(&actions)
        .default(0)
        .interact()
        .map_err(prompt_error)?;

    Ok(match selection {
        0 => Commands::ChangePrimaryKey {
            table: None,
            column: None,
            key_type: None,
            keep_old_key: false,
            dry_run: false,
            yes: false,
        },
        1 => Commands::Init {
            output: None,
            force: false,
        },
        _ => Commands::HealthCheck,
    })
}

fn prompt_text(prompt: &str, default: Option<&str>) -> Result<String, MigrateError> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_string());
    }
    input.interact_text().map_err(prompt_error)
}

fn prompt_key_type() -> Result<String, MigrateError> {
    let types = [KeyType::Uuid, KeyType::Int];
    let selection = Select::new()
        .with_prompt("New primary key type")
        .items(&types.map(|t| t.as_str()))
        .default(0)
        .interact()
        .map_err(prompt_error)?;
    Ok(types[selection].as_str().to_string())
}

fn confirm_migration(config: &Config, request: &MigrationRequest) -> Result<bool, MigrateError> {
    println!(
        "About to replace the primary key of {}.{} on {} with {} ({}).",
        config.database.schema,
        request.table_name,
        config.database.display_target(),
        request.new_column_name,
        request.new_column_type
    );
    if request.drop_old_key_column {
        println!("The old key column will be dropped.");
    }
    Confirm::new()
        .with_prompt("Continue?")
        .default(false)
        .interact()
        .map_err(prompt_error)
}

fn prompt_error(e: dialoguer::Error) -> MigrateError {
    MigrateError::Config(format!(
        "interactive prompt failed ({}); pass the value as a flag instead",
        e
    ))
}

fn print_report(report: &MigrationReport) {
    let status_msg = if report.dry_run {
        "Dry run completed, all changes rolled back."
    } else {
        "Primary key migration completed!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", report.run_id);
    println!(
        "  Table: {}.{} ({} -> {} {})",
        report.schema,
        report.table,
        report.old_primary_key,
        report.new_primary_key,
        report.new_column_type
    );
    if let Some(ref kept) = report.retained_old_key_column {
        println!("  Old key kept as: {}", kept);
    }
    println!("  Foreign keys: {}", report.foreign_keys.len());
    for fk in &report.foreign_keys {
        println!(
            "    {}.{} -> {} ({} rows)",
            fk.table, fk.old_column, fk.new_column, fk.rows_updated
        );
    }
    if !report.skipped_foreign_keys.is_empty() {
        println!("  Skipped: {}", report.skipped_foreign_keys.join(", "));
    }
    println!("  Rows relinked: {}", report.rows_relinked);
    if report.metadata.catalog_present {
        println!(
            "  Metadata: {} field(s) renamed, {} relation(s) updated",
            report.metadata.fields_renamed, report.metadata.relations_updated
        );
    }
    println!("  Duration: {:.2}s", report.duration_seconds);
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stderr, so --output-json stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
