use std::collections::HashMap;
use tracing::{info, warn};
use crate::core::batch::batcher;
use crate::core::error::{Error, Result};
use crate::relational::database::Database;
use crate::resolve::resolver::resolve;
use crate::storage::error_report::ErrorReport;
use crate::storage::kv_store::KeyValueStore;

/// Distinct resolved pairs, ordered so the same input always maps the same way.
const RESOLVED_PAIRS_SQL: &str = "SELECT DISTINCT resolved_ol_edition_id, resolved_ol_work_id FROM ol \
     WHERE resolved_ol_edition_id IS NOT NULL AND resolved_ol_work_id IS NOT NULL \
     ORDER BY resolved_ol_edition_id, resolved_ol_work_id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSummary {
    pub pairs: usize,
    /// Editions seen with more than one distinct work; the last one wins
    pub conflicts: usize,
}

/// Fill `map` with resolved edition -> resolved work from the `ol` table.
///
/// Expects `resolved_ol_edition_id` and `resolved_ol_work_id` to be resolved
/// already. The query only reads `ol`, so rows stream straight into the map.
pub fn create_resolved_edition_work_mapping<M: KeyValueStore + ?Sized>(
    db: &Database,
    map: &M,
    batch_size: usize,
    errors: &ErrorReport,
) -> Result<MappingSummary> {
    let mut summary = MappingSummary::default();
    let mut batch: Vec<(String, String)> = Vec::with_capacity(batch_size);

    db.stream_rows(RESOLVED_PAIRS_SQL, [], |row| {
        let mut values = row.into_iter();
        let (Some(Some(edition)), Some(Some(work))) = (values.next(), values.next()) else {
            return Ok(());
        };
        batch.push((edition, work));
        if batch.len() >= batch_size {
            write_batch(map, &mut batch, &mut summary, errors)?;
        }
        Ok(())
    })?;
    write_batch(map, &mut batch, &mut summary, errors)?;

    if summary.conflicts > 0 {
        warn!("{} editions map to more than one work", summary.conflicts);
    }
    info!("Mapped {} resolved editions to works", summary.pairs);
    Ok(summary)
}

fn write_batch<M: KeyValueStore + ?Sized>(
    map: &M,
    batch: &mut Vec<(String, String)>,
    summary: &mut MappingSummary,
    errors: &ErrorReport,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let mut in_batch: HashMap<&str, &str> = HashMap::with_capacity(batch.len());
    for (edition, work) in batch.iter() {
        let previous = match in_batch.get(edition.as_str()) {
            Some(previous) => Some(previous.to_string()),
            None => map.get(edition)?,
        };
        if let Some(previous) = previous {
            if previous != *work {
                summary.conflicts += 1;
                let message = format!("edition {} maps to {} and {}", edition, previous, work);
                warn!("{}", message);
                errors.record(&message);
            }
        }
        in_batch.insert(edition, work);
    }

    map.bulk_update(batch)?;
    summary.pairs += batch.len();
    batch.clear();
    Ok(())
}

/// Seed `map` directly from pairs that are already resolved.
pub fn insert_resolved_pairs<M, I>(map: &M, pairs: I, batch_size: usize) -> Result<usize>
where
    M: KeyValueStore + ?Sized,
    I: IntoIterator<Item = (String, String)>,
{
    let mut written = 0;
    for batch in batcher(pairs, batch_size) {
        map.bulk_update(&batch)?;
        written += batch.len();
    }
    Ok(written)
}

/// The resolved work of `edition`, chasing edition redirects first.
///
/// `NotFound` when the terminal edition has no mapped work.
pub fn get_resolved_work_from_edition<R, M>(redirects: &R, map: &M, edition: &str) -> Result<String>
where
    R: KeyValueStore + ?Sized,
    M: KeyValueStore + ?Sized,
{
    let terminal = resolve(redirects, edition)?;
    map.get(&terminal)?
        .ok_or_else(|| Error::not_found(format!("no work mapped for edition {} (resolved to {})", edition, terminal)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::loader::create_table;
    use crate::relational::schema::Table;
    use crate::storage::kv_store::MemoryStore;

    fn report() -> (tempfile::TempDir, ErrorReport) {
        let dir = tempfile::tempdir().unwrap();
        let report = ErrorReport::open(dir.path().join("errors.txt")).unwrap();
        (dir, report)
    }

    #[test]
    fn lookups_follow_the_map() {
        let map = MemoryStore::new();
        let pairs = [("E1", "W1"), ("E2", "W1"), ("E3", "W2")]
            .map(|(e, w)| (e.to_string(), w.to_string()));
        assert_eq!(insert_resolved_pairs(&map, pairs, 2).unwrap(), 3);

        let redirects = MemoryStore::new();
        assert_eq!(get_resolved_work_from_edition(&redirects, &map, "E1").unwrap(), "W1");
        assert_eq!(get_resolved_work_from_edition(&redirects, &map, "E2").unwrap(), "W1");
        assert_eq!(get_resolved_work_from_edition(&redirects, &map, "E3").unwrap(), "W2");
        assert!(get_resolved_work_from_edition(&redirects, &map, "E4").unwrap_err().is_not_found());
    }

    #[test]
    fn editions_are_resolved_before_lookup() {
        let redirects = MemoryStore::from_pairs([("OL001M", "OL002M"), ("OL002M", "OL003M")]);
        let map = MemoryStore::from_pairs([("OL003M", "OL003W")]);
        assert_eq!(get_resolved_work_from_edition(&redirects, &map, "OL001M").unwrap(), "OL003W");
    }

    #[test]
    fn mapping_is_built_from_resolved_columns() {
        let db = Database::in_memory().unwrap();
        create_table(&db, Table::Ol).unwrap();
        db.execute_batch(
            "INSERT INTO ol (ol_edition_id, resolved_ol_edition_id, resolved_ol_work_id) VALUES
                ('OL001M', 'OL003M', 'OL003W'),
                ('OL003M', 'OL003M', 'OL003W'),
                ('OL004M', 'OL004M', NULL),
                ('OL005M', 'OL005M', 'OL005W'),
                ('OL006M', 'OL006M', 'OL006W'),
                ('OL007M', 'OL006M', 'OL007W');",
        )
        .unwrap();

        let (_dir, errors) = report();
        let map = MemoryStore::new();
        let summary = create_resolved_edition_work_mapping(&db, &map, 2, &errors).unwrap();

        assert_eq!(summary, MappingSummary { pairs: 4, conflicts: 1 });
        assert_eq!(map.get("OL003M").unwrap().as_deref(), Some("OL003W"));
        assert_eq!(map.get("OL004M").unwrap(), None);
        // Ordered by work, so the greater work id is written last.
        assert_eq!(map.get("OL006M").unwrap().as_deref(), Some("OL007W"));
        assert_eq!(errors.recorded(), 1);
    }
}
