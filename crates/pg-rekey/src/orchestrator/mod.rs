//! Migration coordinator - runs the primary-key state machine in one transaction.
//!
//! ```text
//! INTROSPECT -> DETACH -> DROP_OLD_PK -> CREATE_NEW_PK -> ATTACH_NEW_FK
//!            -> COPY_DATA -> DROP_OLD_COLUMNS -> SYNC_METADATA -> COMMIT
//! ```
//!
//! Any failure before COMMIT rolls the whole transaction back.

mod plan;
mod steps;

pub use plan::{MigrationPlan, MigrationRequest, PlannedForeignKey};

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::schema::{KeyType, MigrationStep};
use crate::core::traits::{MetadataCatalog, MigrationSession};
use crate::drivers::postgres::{PgPool, PgSession};
use crate::error::Result;
use crate::metadata::{self, SyncOutcome};

/// One rewritten foreign key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyChange {
    pub table: String,
    pub old_column: String,
    pub new_column: String,
    pub constraint_name: String,
    pub rows_updated: u64,
}

/// Result of a primary-key migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    pub schema: String,
    pub table: String,
    pub old_primary_key: String,
    pub new_primary_key: String,
    pub new_column_type: KeyType,

    /// Old key column left in place (`None` when it was dropped).
    pub retained_old_key_column: Option<String>,

    pub foreign_keys: Vec<ForeignKeyChange>,

    /// Foreign keys referencing another column of the table; not touched.
    pub skipped_foreign_keys: Vec<String>,

    /// Total referencing rows relinked to the new key.
    pub rows_relinked: u64,

    pub metadata: SyncOutcome,

    /// False for dry runs.
    pub committed: bool,
    pub dry_run: bool,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl MigrationReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Everything the steps produced before the transaction was closed.
struct StepResults {
    plan: MigrationPlan,
    rows_per_fk: Vec<u64>,
    metadata: SyncOutcome,
}

/// Replace the primary key of `request.table_name` using an open session.
///
/// The session is committed on success (or rolled back for a dry run). On
/// failure it is rolled back and the step's error is returned; a failing
/// rollback is logged but does not replace that error.
pub async fn migrate_primary_key<S: MigrationSession>(
    mut session: S,
    schema: &str,
    request: &MigrationRequest,
) -> Result<MigrationReport> {
    let started_at = Utc::now();
    let timer = Instant::now();
    let run_id = uuid::Uuid::new_v4().to_string();
    info!(
        "Starting primary key migration {}: {}.{} -> {} ({})",
        run_id, schema, request.table_name, request.new_column_name, request.new_column_type
    );

    let results = match run_steps(&mut session, schema, request).await {
        Ok(results) => results,
        Err(e) => {
            error!("Migration failed, rolling back: {}", e);
            if let Err(rollback_err) = session.rollback().await {
                error!("Rollback failed: {}", rollback_err);
            }
            return Err(e);
        }
    };

    if request.dry_run {
        info!("[{}] dry run, rolling back", MigrationStep::Commit);
        session.rollback().await?;
    } else {
        info!("[{}]", MigrationStep::Commit);
        session.commit().await?;
    }

    let completed_at = Utc::now();
    let StepResults {
        plan,
        rows_per_fk,
        metadata,
    } = results;

    let foreign_keys: Vec<ForeignKeyChange> = plan
        .foreign_keys
        .iter()
        .zip(rows_per_fk)
        .map(|(fk, rows_updated)| ForeignKeyChange {
            table: fk.constraint.foreign_table.clone(),
            old_column: fk.constraint.foreign_column.clone(),
            new_column: fk.new_column.clone(),
            constraint_name: fk.new_constraint.clone(),
            rows_updated,
        })
        .collect();
    let rows_relinked = foreign_keys.iter().map(|fk| fk.rows_updated).sum();

    let report = MigrationReport {
        run_id,
        schema: plan.schema.clone(),
        table: plan.table.clone(),
        old_primary_key: plan.old_key.column_name.clone(),
        new_primary_key: plan.new_key.clone(),
        new_column_type: plan.key_type,
        retained_old_key_column: (!plan.drop_old_key_column).then(|| plan.old_key_column.clone()),
        foreign_keys,
        skipped_foreign_keys: plan
            .skipped
            .iter()
            .map(|fk| format!("{}.{}", fk.foreign_table, fk.constraint_name))
            .collect(),
        rows_relinked,
        metadata,
        committed: !request.dry_run,
        dry_run: request.dry_run,
        started_at,
        completed_at,
        duration_seconds: timer.elapsed().as_secs_f64(),
    };

    info!(
        "Migration {} {}: {} foreign key(s), {} row(s) relinked in {:.2}s",
        report.run_id,
        if report.committed { "committed" } else { "rolled back (dry run)" },
        report.foreign_keys.len(),
        report.rows_relinked,
        report.duration_seconds
    );
    Ok(report)
}

async fn run_steps<S: MigrationSession>(
    session: &mut S,
    schema: &str,
    request: &MigrationRequest,
) -> Result<StepResults> {
    let plan = steps::introspect(session, schema, request).await?;
    steps::detach(session, &plan).await?;
    steps::drop_old_primary_key(session, &plan).await?;
    steps::create_new_primary_key(session, &plan).await?;
    steps::attach_new_foreign_keys(session, &plan).await?;
    let rows_per_fk = steps::copy_data(session, &plan).await?;
    steps::drop_old_columns(session, &plan).await?;

    let metadata = if plan.sync_metadata {
        metadata::synchronize(session, &plan).await?
    } else {
        info!("[{}] disabled", MigrationStep::SyncMetadata);
        SyncOutcome::default()
    };

    Ok(StepResults {
        plan,
        rows_per_fk,
        metadata,
    })
}

/// Connection health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub connected: bool,
    pub target: String,
    pub latency_ms: u64,
    /// Whether the metadata catalog tables exist in the configured schema.
    pub catalog_present: bool,
    pub error: Option<String>,
}

/// Runs migrations against the configured database.
pub struct Migrator {
    config: Config,
    pool: PgPool,
}

impl Migrator {
    /// Connect to the configured database.
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = PgPool::connect(&config.database).await?;
        Ok(Self { config, pool })
    }

    /// Run one migration in its own transaction.
    pub async fn run(&self, request: MigrationRequest) -> Result<MigrationReport> {
        let sync = self.config.catalog.enabled && request.sync_metadata;
        let request = request.with_metadata_sync(sync);

        let mut conn = self.pool.get().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await?;
        let session = PgSession::new(tx, &self.config.database.schema, &self.config.catalog)?;

        migrate_primary_key(session, &self.config.database.schema, &request).await
    }

    /// Check connectivity and look for the metadata catalog.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let target = self.pool.target().to_string();
        let latency = match self.pool.ping().await {
            Ok(latency) => latency,
            Err(e) => {
                return Ok(HealthCheckResult {
                    connected: false,
                    target,
                    latency_ms: 0,
                    catalog_present: false,
                    error: Some(e.to_string()),
                })
            }
        };

        let mut conn = self.pool.get().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let tx = client.transaction().await?;
        let mut session = PgSession::new(tx, &self.config.database.schema, &self.config.catalog)?;
        let catalog_present = session.catalog_available().await?;
        session.rollback().await?;

        if !catalog_present {
            warn!(
                "Metadata catalog tables {} / {} not found in schema {}",
                self.config.catalog.fields_table,
                self.config.catalog.relations_table,
                self.config.database.schema
            );
        }

        Ok(HealthCheckResult {
            connected: true,
            target,
            latency_ms: latency.as_millis() as u64,
            catalog_present,
            error: None,
        })
    }

    pub fn close(&self) {
        self.pool.close();
    }
}
