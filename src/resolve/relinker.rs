use tracing::{info, warn};
use crate::core::error::Result;
use crate::relational::database::Database;
use crate::relational::schema::{Column, Table};
use crate::resolve::edition_work_map::get_resolved_work_from_edition;
use crate::resolve::spill::SpillFile;
use crate::storage::error_report::ErrorReport;
use crate::storage::kv_store::KeyValueStore;

/// Which rows to re-link: the row key, the edition each row names, and the
/// column that receives the edition's resolved work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelinkTarget {
    pub table: Table,
    pub id_column: Column,
    pub edition_column: Column,
    pub write_column: Column,
}

impl RelinkTarget {
    /// Archive items, keyed by item id, through the edition they claim.
    pub fn archive() -> Self {
        RelinkTarget {
            table: Table::Ia,
            id_column: Column::IaId,
            edition_column: Column::IaOlEditionId,
            write_column: Column::ResolvedIaOlWorkFromEdition,
        }
    }

    fn check(&self) -> Result<()> {
        self.table.check_column(self.id_column)?;
        self.table.check_column(self.edition_column)?;
        self.table.check_column(self.write_column)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelinkSummary {
    pub rows: usize,
    pub linked: usize,
    /// Editions with no mapped work; their rows keep a NULL
    pub unmapped: usize,
    pub cycles: usize,
}

/// Write each row's work, as derived from its edition, into `target.write_column`.
pub fn build_archive_work_from_edition_column<R, M>(
    db: &Database,
    redirects: &R,
    map: &M,
    target: RelinkTarget,
    batch_size: usize,
    errors: &ErrorReport,
) -> Result<RelinkSummary>
where
    R: KeyValueStore + ?Sized,
    M: KeyValueStore + ?Sized,
{
    target.check()?;

    let staged = SpillFile::stage_query(
        db,
        &format!(
            "SELECT {}, {} FROM {} WHERE {} IS NOT NULL",
            target.id_column, target.edition_column, target.table, target.edition_column
        ),
        [],
    )?;
    // Keyed by row id and edition, so rows sharing an id keep their own work.
    let update = format!(
        "UPDATE {} SET {} = ?1 WHERE {} = ?2 AND {} IS ?3",
        target.table, target.write_column, target.id_column, target.edition_column
    );

    let mut summary = RelinkSummary::default();
    let mut pending: Vec<[String; 3]> = Vec::with_capacity(batch_size);
    for row in staged.into_rows()? {
        let mut row = row?;
        let (Some(edition), Some(id)) = (row.pop(), row.pop()) else { continue };
        summary.rows += 1;

        match get_resolved_work_from_edition(redirects, map, &edition) {
            Ok(work) => {
                summary.linked += 1;
                pending.push([work, id, edition]);
            }
            Err(e) if e.is_not_found() => summary.unmapped += 1,
            Err(e) if e.is_cycle() => {
                summary.cycles += 1;
                warn!("{}", e);
                errors.record(&e.to_string());
            }
            Err(e) => return Err(e),
        }

        if pending.len() >= batch_size {
            db.execute_many(&update, pending.drain(..))?;
        }
    }
    db.execute_many(&update, pending.drain(..))?;
    db.commit()?;

    info!(
        "{}.{}: linked {} of {} rows, {} editions without a work",
        target.table, target.write_column, summary.linked, summary.rows, summary.unmapped
    );
    Ok(summary)
}
