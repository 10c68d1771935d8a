//! The schema steps of a primary-key migration, in execution order.
//!
//! Each function runs one state of the coordinator's state machine against
//! the open session. None of them commits or rolls back.

use tracing::{debug, info};

use crate::core::schema::MigrationStep;
use crate::core::traits::SchemaSession;
use crate::drivers::postgres::PostgresDialect;
use crate::error::Result;

use super::plan::{MigrationPlan, MigrationRequest};

/// INTROSPECT: read the current key and its dependents, then derive the plan.
pub async fn introspect<S: SchemaSession + ?Sized>(
    session: &mut S,
    schema: &str,
    request: &MigrationRequest,
) -> Result<MigrationPlan> {
    info!("[{}] {}.{}", MigrationStep::Introspect, schema, request.table_name);
    let primary_keys = session.primary_keys(schema, &request.table_name).await?;
    let foreign_keys = session
        .referencing_foreign_keys(schema, &request.table_name)
        .await?;
    debug!(
        "Found {} primary key column(s) and {} referencing foreign key(s)",
        primary_keys.len(),
        foreign_keys.len()
    );
    MigrationPlan::build(schema, request, primary_keys, foreign_keys)
}

/// DETACH: drop each foreign key, move its column aside and index the shadow.
pub async fn detach<S: SchemaSession + ?Sized>(session: &mut S, plan: &MigrationPlan) -> Result<()> {
    let dialect = PostgresDialect::new();
    let step = MigrationStep::Detach;
    info!("[{}] {} foreign key(s)", step, plan.foreign_keys.len());

    for fk in &plan.foreign_keys {
        let c = &fk.constraint;
        let sql = dialect.drop_constraint(&c.foreign_schema, &c.foreign_table, &c.constraint_name)?;
        session.execute(step, &sql).await?;

        let sql = dialect.rename_column(
            &c.foreign_schema,
            &c.foreign_table,
            &c.foreign_column,
            &fk.shadow_column,
        )?;
        session.execute(step, &sql).await?;

        let sql = dialect.create_index(&c.foreign_schema, &c.foreign_table, &fk.shadow_column)?;
        session.execute(step, &sql).await?;
    }
    Ok(())
}

/// DROP_OLD_PK: remove the key constraint, moving the column aside when the
/// new key reuses its name.
pub async fn drop_old_primary_key<S: SchemaSession + ?Sized>(
    session: &mut S,
    plan: &MigrationPlan,
) -> Result<()> {
    let dialect = PostgresDialect::new();
    let step = MigrationStep::DropOldPk;
    info!("[{}] {}", step, plan.old_key.constraint_name);

    let sql = dialect.drop_constraint(&plan.schema, &plan.table, &plan.old_key.constraint_name)?;
    session.execute(step, &sql).await?;

    if plan.renames_old_key() {
        let sql = dialect.rename_column(
            &plan.schema,
            &plan.table,
            &plan.old_key.column_name,
            &plan.old_key_column,
        )?;
        session.execute(step, &sql).await?;
    }
    Ok(())
}

/// CREATE_NEW_PK: add the new key column; existing rows get generated values.
pub async fn create_new_primary_key<S: SchemaSession + ?Sized>(
    session: &mut S,
    plan: &MigrationPlan,
) -> Result<()> {
    let dialect = PostgresDialect::new();
    let step = MigrationStep::CreateNewPk;
    info!("[{}] {}.{} ({})", step, plan.table, plan.new_key, plan.key_type);

    let sql = dialect.add_primary_key_column(&plan.schema, &plan.table, &plan.new_key, plan.key_type)?;
    session.execute(step, &sql).await?;
    Ok(())
}

/// ATTACH_NEW_FK: add each replacement column and its constraint to the new key.
pub async fn attach_new_foreign_keys<S: SchemaSession + ?Sized>(
    session: &mut S,
    plan: &MigrationPlan,
) -> Result<()> {
    let dialect = PostgresDialect::new();
    let step = MigrationStep::AttachNewFk;
    info!("[{}] {} foreign key(s)", step, plan.foreign_keys.len());

    for fk in &plan.foreign_keys {
        let c = &fk.constraint;
        let sql = dialect.add_foreign_column(
            &c.foreign_schema,
            &c.foreign_table,
            &fk.new_column,
            plan.key_type,
        )?;
        session.execute(step, &sql).await?;

        let sql = dialect.add_foreign_key(
            &c.foreign_schema,
            &c.foreign_table,
            &fk.new_column,
            &fk.new_constraint,
            &plan.schema,
            &plan.table,
            &plan.new_key,
            &c.on_delete,
            &c.on_update,
        )?;
        session.execute(step, &sql).await?;
    }
    Ok(())
}

/// COPY_DATA: correlate old identities to new keys with one update per foreign key.
///
/// Returns the number of rows relinked per foreign key, in plan order.
pub async fn copy_data<S: SchemaSession + ?Sized>(
    session: &mut S,
    plan: &MigrationPlan,
) -> Result<Vec<u64>> {
    let dialect = PostgresDialect::new();
    let step = MigrationStep::CopyData;
    let mut counts = Vec::with_capacity(plan.foreign_keys.len());

    for fk in &plan.foreign_keys {
        let c = &fk.constraint;
        let sql = dialect.copy_references(
            &c.foreign_schema,
            &c.foreign_table,
            &fk.new_column,
            &fk.shadow_column,
            &plan.schema,
            &plan.table,
            &plan.new_key,
            &plan.old_key_column,
        )?;
        let rows = session.execute(step, &sql).await?;
        info!(
            "[{}] {}.{}: {} row(s) relinked",
            step, c.foreign_table, fk.new_column, rows
        );

        if !c.is_nullable {
            let sql = dialect.set_not_null(&c.foreign_schema, &c.foreign_table, &fk.new_column)?;
            session.execute(step, &sql).await?;
        }
        counts.push(rows);
    }
    Ok(counts)
}

/// DROP_OLD_COLUMNS: drop every shadow column, then the old key column if requested.
pub async fn drop_old_columns<S: SchemaSession + ?Sized>(
    session: &mut S,
    plan: &MigrationPlan,
) -> Result<()> {
    let dialect = PostgresDialect::new();
    let step = MigrationStep::DropOldColumns;
    info!("[{}] {} shadow column(s)", step, plan.foreign_keys.len());

    for fk in &plan.foreign_keys {
        let c = &fk.constraint;
        let sql = dialect.drop_column(&c.foreign_schema, &c.foreign_table, &fk.shadow_column)?;
        session.execute(step, &sql).await?;
    }

    if plan.drop_old_key_column {
        let sql = dialect.drop_column(&plan.schema, &plan.table, &plan.old_key_column)?;
        session.execute(step, &sql).await?;
    }
    Ok(())
}
