//! Interactive configuration wizard for creating/editing config files.

use dialoguer::{Confirm, Input, Password, Select};
use pg_rekey::{CatalogConfig, Config, DatabaseConfig, Migrator};
use std::path::Path;

/// Result type for wizard operations.
pub type WizardResult<T> = Result<T, WizardError>;

/// Errors that can occur during wizard execution.
#[derive(Debug)]
pub enum WizardError {
    /// User cancelled the wizard.
    Cancelled,
    /// IO error (file read/write).
    Io(std::io::Error),
    /// Config serialization error.
    Config(String),
    /// Validation error.
    Validation(String),
}

impl std::fmt::Display for WizardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Configuration cancelled"),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Config(msg) => write!(f, "Config error: {}", msg),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for WizardError {}

impl From<std::io::Error> for WizardError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<dialoguer::Error> for WizardError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Io(std::io::Error::other(e.to_string()))
    }
}

/// Action to take when config file already exists.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ExistingFileAction {
    Edit,
    Overwrite,
    Abort,
}

const SSL_MODES: &[&str] = &["disable", "require", "verify-ca", "verify-full"];

/// Run the configuration wizard.
pub async fn run_wizard(output: &Path, force: bool) -> WizardResult<()> {
    println!();
    println!("pg-rekey - Configuration Wizard");
    println!("===============================");
    println!();

    let existing_config = if output.exists() && !force {
        match prompt_existing_file_action(output)? {
            ExistingFileAction::Edit => {
                println!("Loading existing configuration...");
                match Config::load(output) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        println!("Warning: Could not parse existing file: {}", e);
                        println!("Starting with fresh configuration.\n");
                        None
                    }
                }
            }
            ExistingFileAction::Overwrite => {
                println!("Starting with fresh configuration.\n");
                None
            }
            ExistingFileAction::Abort => {
                return Err(WizardError::Cancelled);
            }
        }
    } else {
        None
    };

    let database = prompt_database_config(existing_config.as_ref().map(|c| &c.database))?;
    let catalog = prompt_catalog_config(existing_config.as_ref().map(|c| &c.catalog))?;

    let config = Config { database, catalog };

    if let Err(e) = config.validate() {
        return Err(WizardError::Validation(e.to_string()));
    }

    print_summary(&config);

    if prompt_connection_test()? {
        test_connection(&config).await?;
    }

    if !prompt_save_confirm(output)? {
        return Err(WizardError::Cancelled);
    }

    write_config(&config, output)?;

    println!("\nConfiguration saved to {}", output.display());
    println!("Run 'pg-rekey change-primary-key' to migrate a table.");

    Ok(())
}

fn prompt_existing_file_action(path: &Path) -> WizardResult<ExistingFileAction> {
    println!("File already exists: {}\n", path.display());

    let options = &["Edit existing configuration", "Overwrite with new", "Abort"];
    let selection = Select::new()
        .with_prompt("What would you like to do?")
        .items(options)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => ExistingFileAction::Edit,
        1 => ExistingFileAction::Overwrite,
        _ => ExistingFileAction::Abort,
    })
}

fn prompt_database_config(existing: Option<&DatabaseConfig>) -> WizardResult<DatabaseConfig> {
    println!("Database (PostgreSQL)");
    println!("---------------------");

    let host: String = Input::new()
        .with_prompt("  Host")
        .default(
            existing
                .map(|c| c.host.clone())
                .unwrap_or_else(|| "localhost".to_string()),
        )
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("  Port")
        .default(existing.map(|c| c.port).unwrap_or(5432))
        .interact_text()?;

    let database: String = Input::new()
        .with_prompt("  Database")
        .default(existing.map(|c| c.database.clone()).unwrap_or_default())
        .interact_text()?;

    let user: String = Input::new()
        .with_prompt("  User")
        .default(
            existing
                .map(|c| c.user.clone())
                .unwrap_or_else(|| "postgres".to_string()),
        )
        .interact_text()?;

    let password = prompt_password("  Password", existing.is_some())?;
    let password = if password.is_empty() {
        existing.map(|e| e.password.clone()).unwrap_or(password)
    } else {
        password
    };

    let schema: String = Input::new()
        .with_prompt("  Schema")
        .default(
            existing
                .map(|c| c.schema.clone())
                .unwrap_or_else(|| "public".to_string()),
        )
        .interact_text()?;

    let default_idx = existing
        .and_then(|c| SSL_MODES.iter().position(|&m| m == c.ssl_mode))
        .unwrap_or(0);
    let ssl_mode_idx = Select::new()
        .with_prompt("  SSL Mode")
        .items(SSL_MODES)
        .default(default_idx)
        .interact()?;

    println!();

    Ok(DatabaseConfig {
        host,
        port,
        database,
        user,
        password,
        schema,
        ssl_mode: SSL_MODES[ssl_mode_idx].to_string(),
    })
}

fn prompt_catalog_config(existing: Option<&CatalogConfig>) -> WizardResult<CatalogConfig> {
    println!("Metadata Catalog");
    println!("----------------");

    let defaults = existing.cloned().unwrap_or_default();

    let enabled = Confirm::new()
        .with_prompt("  Keep field/relation metadata in sync")
        .default(defaults.enabled)
        .interact()?;

    let (fields_table, relations_table) = if enabled {
        let fields: String = Input::new()
            .with_prompt("  Fields table")
            .default(defaults.fields_table)
            .interact_text()?;
        let relations: String = Input::new()
            .with_prompt("  Relations table")
            .default(defaults.relations_table)
            .interact_text()?;
        (fields, relations)
    } else {
        (defaults.fields_table, defaults.relations_table)
    };

    println!();

    Ok(CatalogConfig {
        enabled,
        fields_table,
        relations_table,
    })
}

fn prompt_password(prompt: &str, has_existing: bool) -> WizardResult<String> {
    if has_existing {
        let input: String = Password::new()
            .with_prompt(format!("{} (blank to keep existing)", prompt))
            .allow_empty_password(true)
            .interact()?;
        Ok(input)
    } else {
        let input: String = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        Ok(input)
    }
}

fn print_summary(config: &Config) {
    println!("Configuration Summary");
    println!("---------------------");
    println!(
        "  Database: {} (schema {}, ssl {})",
        config.database.display_target(),
        config.database.schema,
        config.database.ssl_mode
    );
    if config.catalog.enabled {
        println!(
            "  Catalog: {} / {}",
            config.catalog.fields_table, config.catalog.relations_table
        );
    } else {
        println!("  Catalog: disabled");
    }
    println!();
}

fn prompt_connection_test() -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt("Test database connection?")
        .default(false)
        .interact()?)
}

async fn test_connection(config: &Config) -> WizardResult<()> {
    use std::time::Duration;
    use tokio::time::timeout;

    println!("\nTesting connection...");

    // Bounded so an unreachable host does not hang the wizard
    let timeout_duration = Duration::from_secs(30);

    let migrator = match timeout(timeout_duration, Migrator::connect(config.clone())).await {
        Ok(Ok(migrator)) => migrator,
        Ok(Err(e)) => {
            println!("  Failed to connect: {}", e);
            println!();
            return Ok(());
        }
        Err(_) => {
            println!("  Connection timed out after 30 seconds");
            println!();
            return Ok(());
        }
    };

    match timeout(timeout_duration, migrator.health_check()).await {
        Ok(Ok(health)) => {
            println!(
                "  PostgreSQL: {} ({}ms)",
                if health.connected { "OK" } else { "FAILED" },
                health.latency_ms
            );
            if let Some(ref err) = health.error {
                println!("    Error: {}", err);
            }
            if config.catalog.enabled && !health.catalog_present {
                println!("  Warning: metadata catalog tables not found; sync will be skipped.");
            }
        }
        Ok(Err(e)) => println!("  Connection test failed: {}", e),
        Err(_) => println!("  Health check timed out after 30 seconds"),
    }
    migrator.close();

    println!();
    Ok(())
}

fn prompt_save_confirm(path: &Path) -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt(format!("Save to {}?", path.display()))
        .default(true)
        .interact()?)
}

fn write_config(config: &Config, path: &Path) -> WizardResult<()> {
    let header = "# pg-rekey configuration\n\
                  # Generated by pg-rekey init\n\
                  # The PGREKEY_PASSWORD environment variable overrides database.password\n\n";

    let yaml = config
        .to_yaml()
        .map_err(|e| WizardError::Config(e.to_string()))?;

    std::fs::write(path, format!("{}{}", header, yaml))?;

    Ok(())
}
