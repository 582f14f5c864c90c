use std::path::PathBuf;
use tracing::{info, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::ShardKind;
use crate::ingest::chunk_reader::make_chunk_ranges;
use crate::ingest::pipeline::{remove_stale_shards, ChunkContext, IngestSummary, IngestionPipeline};
use crate::relational::database::Database;
use crate::relational::loader::{
    create_ia_table, create_ol_table, ensure_table_absent, insert_cover_data,
    update_ia_editions_from_parsed_shards,
};
use crate::relational::schema::{Column, Table};
use crate::report::reports::{Report, ReportOutcome};
use crate::resolve::column_resolver::{copy_column, update_redirected_ids, ColumnResolution};
use crate::resolve::edition_work_map::{create_resolved_edition_work_mapping, MappingSummary};
use crate::resolve::redirect_store::create_redirects_db;
use crate::resolve::relinker::{build_archive_work_from_edition_column, RelinkSummary, RelinkTarget};
use crate::storage::error_report::ErrorReport;
use crate::storage::kv_store::{KvStore, OpenMode};
use crate::storage::layout::{require_file, StorageLayout};

/// Raw columns and the resolved companions they are copied to and resolved in.
const RESOLVED_COLUMNS: [(Table, Column, Column); 3] = [
    (Table::Ia, Column::IaOlWorkId, Column::ResolvedIaOlWorkId),
    (Table::Ol, Column::OlWorkId, Column::ResolvedOlWorkId),
    (Table::Ol, Column::OlEditionId, Column::ResolvedOlEditionId),
];

#[derive(Debug, Clone, Default)]
pub struct CreateDbSummary {
    pub archive_rows: usize,
    pub ingest: IngestSummary,
    pub editions: usize,
    pub backfilled: usize,
    pub covers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveSummary {
    pub redirects: usize,
    pub columns: Vec<(Table, Column, ColumnResolution)>,
    pub mapping: MappingSummary,
    pub relink: RelinkSummary,
}

/// Runs the phases in order: `create_db`, then `resolve_redirects`, then `all_reports`.
pub struct Reconciler {
    pub config: Config,
    pub layout: StorageLayout,
}

impl Reconciler {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let layout = StorageLayout::new(&config)?;
        Ok(Reconciler { config, layout })
    }

    fn errors(&self) -> Result<ErrorReport> {
        ErrorReport::open(&self.config.report_errors)
    }

    /// Open the staging database of an earlier `create_db`.
    fn existing_db(&self) -> Result<Database> {
        require_file(&self.config.sqlite_db, "sqlite_db")?;
        let db = Database::open(&self.config.sqlite_db)?;
        for table in [Table::Ia, Table::Ol] {
            if !db.table_exists(table.as_str())? {
                return Err(Error::new(
                    ErrorKind::Database,
                    format!("no table {} in {}; run create-db first", table, self.config.sqlite_db.display()),
                ));
            }
        }
        Ok(db)
    }

    /// Load the archive dump, ingest the catalog dump, and build the staging tables.
    pub fn create_db(&self) -> Result<CreateDbSummary> {
        let config = &self.config;
        let db = Database::open(&config.sqlite_db)?;
        let errors = self.errors()?;

        for table in [Table::Ol, Table::EditionCoverData] {
            ensure_table_absent(&db, table)?;
        }
        require_file(&config.ol_all_dump, "ol_all_dump")?;

        let archive_rows = create_ia_table(&db, &config.ia_physical_direct_dump, config.batch_size, &errors)?;

        let bad_isbns: Option<PathBuf> = config.scrub_data.then(|| config.report_bad_isbns.clone());
        remove_stale_shards(&self.layout, bad_isbns.as_ref())?;

        let ranges = make_chunk_ranges(&config.ol_all_dump, config.chunk_size)?;
        let pipeline = IngestionPipeline::new(config.workers)?;
        let ingest = pipeline.run(ranges, ChunkContext::from_config(config, self.layout.clone()))?;

        let editions = create_ol_table(&db, &self.layout, config.batch_size, &errors)?;
        let backfilled = update_ia_editions_from_parsed_shards(&db, &self.layout, config.batch_size, &errors)?;
        let covers = insert_cover_data(&db, &self.layout, config.batch_size, &errors)?;

        info!(
            "Staging database ready: {} archive rows, {} editions, {} redirects parsed",
            archive_rows, editions, ingest.redirects
        );
        Ok(CreateDbSummary { archive_rows, ingest, editions, backfilled, covers })
    }

    /// Build both key-value stores and every resolved column.
    ///
    /// The redirect store is fully loaded before any resolution starts.
    pub fn resolve_redirects(&self) -> Result<ResolveSummary> {
        let config = &self.config;
        let db = self.existing_db()?;
        let errors = self.errors()?;

        let redirect_shards = self.layout.shard_files(ShardKind::Redirect)?;
        if redirect_shards.is_empty() {
            warn!("No redirect shards under {}; ids will resolve to themselves", self.layout.shard_dir.display());
        }

        let redirect_db = KvStore::open(&config.redirect_db, OpenMode::Truncate)?;
        let map_db = KvStore::open(&config.mapping_db, OpenMode::Truncate)?;

        info!("Creating the redirect store");
        let redirects = create_redirects_db(&redirect_db, &self.layout, config.batch_size, &errors)?;
        redirect_db.sync()?;

        info!("Copying raw columns to their resolved companions");
        for (table, raw, resolved) in RESOLVED_COLUMNS {
            copy_column(&db, table, raw, resolved)?;
        }

        info!("Resolving redirects");
        let mut columns = Vec::with_capacity(RESOLVED_COLUMNS.len());
        for (table, raw, resolved) in RESOLVED_COLUMNS {
            let summary = update_redirected_ids(&db, table, raw, resolved, &redirect_db, config.batch_size, &errors)?;
            columns.push((table, resolved, summary));
        }

        info!("Creating the edition -> work mapping");
        let mapping = create_resolved_edition_work_mapping(&db, &map_db, config.batch_size, &errors)?;
        map_db.sync()?;

        info!("Deriving archive works from their editions");
        let relink = build_archive_work_from_edition_column(
            &db,
            &redirect_db,
            &map_db,
            RelinkTarget::archive(),
            config.batch_size,
            &errors,
        )?;

        Ok(ResolveSummary { redirects, columns, mapping, relink })
    }

    /// Run every report against the staging database.
    pub fn all_reports(&self) -> Result<Vec<ReportOutcome>> {
        let db = self.existing_db()?;
        Report::ALL
            .iter()
            .map(|report| report.run(&db, &self.config.reports_dir))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_phases_need_a_database() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = Reconciler::new(Config::rooted_at(dir.path())).unwrap();

        let err = reconciler.all_reports().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingInputFile);
        assert!(err.context.contains("sqlite_db"));
    }

    #[test]
    fn create_db_requires_the_catalog_dump() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::rooted_at(dir.path());
        std::fs::create_dir_all(&config.files_dir).unwrap();
        std::fs::write(&config.ia_physical_direct_dump, "1\titem\tOL1M\tOL1W\n").unwrap();

        let err = Reconciler::new(config).unwrap().create_db().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingInputFile);
        assert!(err.context.contains("ol_all_dump"));
    }
}
