use std::path::Path;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tracing::{info, warn};
use crate::core::batch::batcher;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{ParsedEdition, ShardKind};
use crate::ingest::chunk_reader::ChunkReader;
use crate::ingest::shard::read_shard_rows;
use crate::parse::line_parser::nuller;
use crate::relational::database::Database;
use crate::relational::schema::Table;
use crate::storage::error_report::ErrorReport;
use crate::storage::layout::{require_file, StorageLayout};

/// Fields in an archive dump row: row id, item id, edition ref, work ref.
pub const ARCHIVE_FIELD_COUNT: usize = 4;

// Edition shard columns, see `ParsedEdition::to_fields`.
const SHARD_EDITION_ID: usize = 0;
const SHARD_OCAID: usize = 2;
const SHARD_HAS_COVER: usize = 6;
const SHARD_ISBN_13S: usize = 7;

/// `TableAlreadyExists` if an earlier run left `table` behind.
pub fn ensure_table_absent(db: &Database, table: Table) -> Result<()> {
    if db.table_exists(table.as_str())? {
        let location = db
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string());
        return Err(Error::new(
            ErrorKind::TableAlreadyExists,
            format!("table {} already exists; you may need to delete {}", table, location),
        ));
    }
    Ok(())
}

/// Create `table`, refusing to reuse one left by an earlier run.
pub fn create_table(db: &Database, table: Table) -> Result<()> {
    ensure_table_absent(db, table)?;
    db.execute(&table.create_sql(), [])?;
    Ok(())
}

fn create_indexes(db: &Database, table: Table) -> Result<()> {
    for sql in table.index_sql() {
        db.execute(sql, [])?;
    }
    Ok(())
}

/// Empty strings are stored as NULL.
fn text(value: &str) -> Value {
    match nuller(value) {
        Some(v) => Value::Text(v.to_string()),
        None => Value::Null,
    }
}

fn flag(value: &str) -> Value {
    Value::Integer(if value == "1" { 1 } else { 0 })
}

/// Create and fill `ia` from the tab-delimited archive dump.
///
/// Rows with fewer than four fields are skipped. Returns the number inserted.
pub fn create_ia_table(db: &Database, dump: &Path, batch_size: usize, errors: &ErrorReport) -> Result<usize> {
    create_table(db, Table::Ia)?;
    require_file(dump, "ia_physical_direct_dump")?;

    info!("Inserting archive records from {}", dump.display());
    let reader = ChunkReader::whole_file(dump)?;
    let rows = reader.lines().filter_map(|line| match line {
        Ok(fields) if fields.len() >= ARCHIVE_FIELD_COUNT => Some(vec![
            text(fields[1]),
            text(fields[2]),
            text(fields[3]),
            Value::Null,
            Value::Null,
            Value::Null,
        ]),
        Ok(_) => None,
        Err(e) => {
            errors.record(&e.to_string());
            None
        }
    });

    let mut inserted = 0;
    for batch in batcher(rows, batch_size) {
        inserted += db.execute_many("INSERT INTO ia VALUES (?1, ?2, ?3, ?4, ?5, ?6)", batch.into_iter().map(params_from_iter))?;
    }

    create_indexes(db, Table::Ia)?;
    db.commit()?;
    info!("Inserted {} archive records", inserted);
    Ok(inserted)
}

/// Every edition shard row, with malformed rows recorded and dropped.
fn edition_rows<'a>(layout: &StorageLayout, errors: &'a ErrorReport) -> Result<impl Iterator<Item = Result<Vec<String>>> + 'a> {
    let mut readers = Vec::new();
    for path in layout.shard_files(ShardKind::Edition)? {
        readers.push(read_shard_rows(&path, ParsedEdition::FIELD_COUNT)?);
    }

    Ok(readers.into_iter().flatten().filter_map(move |row| match row {
        Ok(row) => Some(Ok(row)),
        Err(e) if !e.is_fatal() => {
            warn!("{}", e);
            errors.record(&e.to_string());
            None
        }
        Err(e) => Some(Err(e)),
    }))
}

/// Create `ol`, fill it from the edition shards, then index it.
pub fn create_ol_table(db: &Database, layout: &StorageLayout, batch_size: usize, errors: &ErrorReport) -> Result<usize> {
    create_table(db, Table::Ol)?;
    let inserted = insert_ol_data_in_ol_table(db, layout, batch_size, errors)?;
    create_indexes(db, Table::Ol)?;
    db.commit()?;
    Ok(inserted)
}

pub fn insert_ol_data_in_ol_table(db: &Database, layout: &StorageLayout, batch_size: usize, errors: &ErrorReport) -> Result<usize> {
    info!("Inserting catalog editions from parsed shards");
    let mut inserted = 0;
    for batch in batcher(edition_rows(layout, errors)?, batch_size) {
        let rows = batch.into_iter().collect::<Result<Vec<_>>>()?;
        inserted += db.execute_many(
            "INSERT INTO ol VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rows.iter().map(|row| {
                params_from_iter([
                    text(&row[0]),
                    text(&row[1]),
                    text(&row[2]),
                    text(&row[3]),
                    flag(&row[4]),
                    flag(&row[5]),
                    flag(&row[6]),
                    text(&row[7]),
                    Value::Null,
                    Value::Null,
                ])
            }),
        )?;
    }
    info!("Inserted {} editions", inserted);
    Ok(inserted)
}

/// Record on each archive row which catalog edition names it as its ocaid.
pub fn update_ia_editions_from_parsed_shards(db: &Database, layout: &StorageLayout, batch_size: usize, errors: &ErrorReport) -> Result<usize> {
    info!("Updating archive rows with catalog editions");
    let pairs = edition_rows(layout, errors)?.filter_map(|row| match row {
        Ok(row) => {
            let edition = nuller(&row[SHARD_EDITION_ID])?.to_string();
            let ocaid = nuller(&row[SHARD_OCAID])?.to_string();
            Some(Ok((edition, ocaid)))
        }
        Err(e) => Some(Err(e)),
    });

    let mut updated = 0;
    for batch in batcher(pairs, batch_size) {
        let batch = batch.into_iter().collect::<Result<Vec<_>>>()?;
        updated += db.execute_many(
            "UPDATE ia SET ol_edition_id = ?1 WHERE ia_id = ?2",
            batch.into_iter().map(|(edition, ocaid)| [edition, ocaid]),
        )?;
    }
    db.commit()?;
    Ok(updated)
}

/// Fill `edition_cover_data` with every ISBN-13 of an edition that has a cover.
pub fn insert_cover_data(db: &Database, layout: &StorageLayout, batch_size: usize, errors: &ErrorReport) -> Result<usize> {
    create_table(db, Table::EditionCoverData)?;

    let isbns = edition_rows(layout, errors)?.flat_map(|row| -> Vec<Result<String>> {
        match row {
            Ok(row) if row[SHARD_HAS_COVER] == "1" => row[SHARD_ISBN_13S]
                .split(',')
                .filter(|isbn| !isbn.is_empty())
                .map(|isbn| Ok(isbn.to_string()))
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => vec![Err(e)],
        }
    });

    let mut inserted = 0;
    for batch in batcher(isbns, batch_size) {
        let batch = batch.into_iter().collect::<Result<Vec<_>>>()?;
        inserted += db.execute_many(
            "INSERT OR IGNORE INTO edition_cover_data (isbn_13, cover_exists) VALUES (?1, 1)",
            batch.iter().map(|isbn| [isbn]),
        )?;
    }
    db.commit()?;
    info!("Recorded covers for {} ISBNs", inserted);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::ingest::shard::ShardWriter;

    fn edition(id: &str, work: &str, ocaid: &str, has_cover: bool, isbns: &str) -> ParsedEdition {
        ParsedEdition {
            edition_id: id.to_string(),
            work_id: nuller(work).map(str::to_string),
            ocaid: nuller(ocaid).map(str::to_string),
            isbn_13: isbns.split(',').next_back().and_then(nuller).map(str::to_string),
            has_cover,
            isbn_13s: isbns.to_string(),
            ..Default::default()
        }
    }

    fn setup() -> (tempfile::TempDir, Config, StorageLayout, ErrorReport) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::rooted_at(dir.path());
        let layout = StorageLayout::new(&config).unwrap();
        let errors = ErrorReport::open(&config.report_errors).unwrap();

        std::fs::write(
            &config.ia_physical_direct_dump,
            "1\tjohnmuirtrail\tOL001M\tOL001W\n2\tshort\n3\tnoedition\t\tOL005W\n",
        )
        .unwrap();

        let mut shard = ShardWriter::create(&layout, ShardKind::Edition).unwrap();
        for e in [
            edition("OL001M", "OL001W", "johnmuirtrail", true, "9781933060224"),
            edition("OL002M", "", "", false, "9780465052998"),
        ] {
            shard.write_row(&e.to_fields()).unwrap();
        }
        shard.finish().unwrap();

        let mut shard = ShardWriter::create(&layout, ShardKind::Edition).unwrap();
        shard.write_row(&edition("OL003M", "OL003W", "", true, "9781933060224,9780000000002").to_fields()).unwrap();
        shard.write_row(&["truncated"]).unwrap();
        shard.finish().unwrap();

        (dir, config, layout, errors)
    }

    #[test]
    fn archive_rows_load_with_nulls_for_empty_fields() {
        let (_dir, config, _layout, errors) = setup();
        let db = Database::in_memory().unwrap();

        assert_eq!(create_ia_table(&db, &config.ia_physical_direct_dump, 2, &errors).unwrap(), 2);
        let rows = db.query("SELECT ia_id, ia_ol_edition_id, ia_ol_work_id FROM ia ORDER BY ia_id", []).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Some("johnmuirtrail".to_string()), Some("OL001M".to_string()), Some("OL001W".to_string())],
                vec![Some("noedition".to_string()), None, Some("OL005W".to_string())],
            ]
        );
    }

    #[test]
    fn existing_table_is_fatal() {
        let (_dir, config, _layout, errors) = setup();
        let db = Database::in_memory().unwrap();
        create_ia_table(&db, &config.ia_physical_direct_dump, 10, &errors).unwrap();

        let err = create_ia_table(&db, &config.ia_physical_direct_dump, 10, &errors).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TableAlreadyExists);
        assert!(err.is_fatal());
    }

    #[test]
    fn missing_archive_dump_is_fatal() {
        let (dir, _config, _layout, errors) = setup();
        let db = Database::in_memory().unwrap();
        let err = create_ia_table(&db, &dir.path().join("nope.tsv"), 10, &errors).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingInputFile);
    }

    #[test]
    fn editions_load_and_backfill_archive_rows() {
        let (_dir, config, layout, errors) = setup();
        let db = Database::in_memory().unwrap();
        create_ia_table(&db, &config.ia_physical_direct_dump, 10, &errors).unwrap();

        assert_eq!(create_ol_table(&db, &layout, 2, &errors).unwrap(), 3);
        assert_eq!(errors.recorded(), 1);

        let rows = db
            .query("SELECT ol_work_id, ol_ocaid, has_cover FROM ol WHERE ol_edition_id = 'OL002M'", [])
            .unwrap();
        assert_eq!(rows, vec![vec![None, None, Some("0".to_string())]]);

        assert_eq!(update_ia_editions_from_parsed_shards(&db, &layout, 10, &errors).unwrap(), 1);
        let rows = db.query("SELECT ol_edition_id FROM ia WHERE ia_id = 'johnmuirtrail'", []).unwrap();
        assert_eq!(rows, vec![vec![Some("OL001M".to_string())]]);
    }

    #[test]
    fn cover_data_ignores_duplicate_isbns() {
        let (_dir, _config, layout, errors) = setup();
        let db = Database::in_memory().unwrap();

        assert_eq!(insert_cover_data(&db, &layout, 10, &errors).unwrap(), 2);
        let rows = db.query("SELECT isbn_13, cover_exists FROM edition_cover_data ORDER BY isbn_13", []).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Some("9780000000002".to_string()), Some("1".to_string())],
                vec![Some("9781933060224".to_string()), Some("1".to_string())],
            ]
        );
    }
}
