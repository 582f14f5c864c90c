use tracing::{info, warn};
use crate::core::error::Result;
use crate::relational::database::Database;
use crate::relational::schema::{Column, Table};
use crate::resolve::resolver::resolve_chain;
use crate::resolve::spill::SpillFile;
use crate::storage::error_report::ErrorReport;
use crate::storage::kv_store::KeyValueStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnResolution {
    /// Distinct non-null ids read from the column
    pub ids: usize,
    /// Ids with at least one redirect
    pub redirected: usize,
    pub rows_updated: usize,
    pub cycles: usize,
}

/// `UPDATE table SET to = from`, so rows that are never redirected keep their id.
pub fn copy_column(db: &Database, table: Table, from: Column, to: Column) -> Result<usize> {
    table.check_column(from)?;
    table.check_column(to)?;
    let copied = db.execute(&format!("UPDATE {} SET {} = {}", table, to, from), [])?;
    db.commit()?;
    Ok(copied)
}

/// Resolve every id in `read` and write the terminal id into `write` for
/// every row holding that id or any id met along its chain.
///
/// Ids are staged to a temp file before the first update. Running it twice
/// leaves the table as the first run did.
pub fn update_redirected_ids<S: KeyValueStore + ?Sized>(
    db: &Database,
    table: Table,
    read: Column,
    write: Column,
    store: &S,
    batch_size: usize,
    errors: &ErrorReport,
) -> Result<ColumnResolution> {
    table.check_column(read)?;
    table.check_column(write)?;

    let staged = SpillFile::stage_query(
        db,
        &format!("SELECT DISTINCT {} FROM {} WHERE {} IS NOT NULL", read, table, read),
        [],
    )?;
    info!("Resolving {} ids from {}.{}", staged.rows, table, read);

    let update = format!("UPDATE {} SET {} = ?1 WHERE {} IS ?2", table, write, read);
    let mut summary = ColumnResolution::default();
    let mut pending: Vec<(String, String)> = Vec::with_capacity(batch_size);

    for row in staged.into_rows()? {
        let row = row?;
        let Some(id) = row.first() else { continue };
        summary.ids += 1;

        let resolution = match resolve_chain(store, id) {
            Ok(resolution) => resolution,
            Err(e) if e.is_cycle() => {
                summary.cycles += 1;
                warn!("{}", e);
                errors.record(&e.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };

        if resolution.is_redirected() {
            summary.redirected += 1;
            pending.extend(resolution.update_pairs());
        }
        if pending.len() >= batch_size {
            summary.rows_updated += flush(db, &update, &mut pending)?;
        }
    }
    summary.rows_updated += flush(db, &update, &mut pending)?;
    db.commit()?;

    info!(
        "{}.{}: {} of {} ids redirected, {} rows updated",
        table, write, summary.redirected, summary.ids, summary.rows_updated
    );
    Ok(summary)
}

fn flush(db: &Database, sql: &str, pending: &mut Vec<(String, String)>) -> Result<usize> {
    if pending.is_empty() {
        return Ok(0);
    }
    let updated = db.execute_many(sql, pending.drain(..).map(|(terminal, id)| [terminal, id]))?;
    Ok(updated)
}
