use std::path::{Path, PathBuf};
use tracing::info;
use crate::core::error::Result;
use crate::relational::database::Database;
use crate::report::tsv::{dedupe_count, write_tsv};

/// The fixed backlink reports. Each one is a single read-only query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    BacklinkDifferences,
    EditionsWithMultipleWorks,
    OlHasOcaidIaHasNoEdition,
    OlHasOcaidIaHasNoEditionJoin,
    IaLinksToEditionWithoutOcaid,
    OcaidWithoutIaSourceRecord,
    IaItemsSharingEdition,
    BrokenBacklinksAfterResolution,
    ResolvedWorkFromEdition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub report: Report,
    pub count: usize,
    pub dedupe_count: usize,
    pub path: PathBuf,
}

impl Report {
    pub const ALL: [Report; 9] = [
        Report::BacklinkDifferences,
        Report::EditionsWithMultipleWorks,
        Report::OlHasOcaidIaHasNoEdition,
        Report::OcaidWithoutIaSourceRecord,
        Report::OlHasOcaidIaHasNoEditionJoin,
        Report::IaLinksToEditionWithoutOcaid,
        Report::IaItemsSharingEdition,
        Report::BrokenBacklinksAfterResolution,
        Report::ResolvedWorkFromEdition,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Report::BacklinkDifferences => "report_ol_ia_backlinks.tsv",
            Report::EditionsWithMultipleWorks => "report_edition_with_multiple_works.tsv",
            Report::OlHasOcaidIaHasNoEdition => "report_ol_has_ocaid_ia_has_no_ol_edition.tsv",
            Report::OlHasOcaidIaHasNoEditionJoin => "report_ol_has_ocaid_ia_has_no_ol_edition_join.tsv",
            Report::IaLinksToEditionWithoutOcaid => "report_ia_links_to_ol_but_ol_edition_has_no_ocaid.tsv",
            Report::OcaidWithoutIaSourceRecord => "report_ol_edition_has_ocaid_but_no_source_record.tsv",
            Report::IaItemsSharingEdition => "report_ia_with_same_ol_edition.tsv",
            Report::BrokenBacklinksAfterResolution => "report_broken_backlinks_after_edition_to_work_resolution.tsv",
            Report::ResolvedWorkFromEdition => "report_resolved_work_from_edition.tsv",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Report::BacklinkDifferences => "Archive items whose edition differs from the edition naming them",
            Report::EditionsWithMultipleWorks => "Catalog editions with more than one work",
            Report::OlHasOcaidIaHasNoEdition => {
                "Archive items named by a catalog edition but with no edition of their own"
            }
            Report::OlHasOcaidIaHasNoEditionJoin => {
                "Archive items named by a catalog edition but with no edition of their own (join)"
            }
            Report::IaLinksToEditionWithoutOcaid => "Archive items linking to a catalog edition that has no ocaid",
            Report::OcaidWithoutIaSourceRecord => "Catalog editions with an ocaid but no archive source record",
            Report::IaItemsSharingEdition => "Archive items sharing one catalog edition",
            Report::BrokenBacklinksAfterResolution => {
                "Archive items whose resolved work still differs from the catalog's"
            }
            Report::ResolvedWorkFromEdition => "Archive items with a work derived from their edition",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Report::BacklinkDifferences => {
                "SELECT * FROM ia \
                 WHERE (ia_ol_edition_id IS NOT ol_edition_id) \
                 AND (ol_edition_id IS NOT NULL AND ia_ol_edition_id IS NOT NULL) \
                 ORDER BY ia_id"
            }
            Report::EditionsWithMultipleWorks => {
                "SELECT ol_edition_id FROM ol WHERE has_multiple_works IS 1 ORDER BY ol_edition_id"
            }
            Report::OlHasOcaidIaHasNoEdition => {
                "SELECT ia_id, ol_edition_id FROM ia \
                 WHERE (ol_edition_id IS NOT NULL) AND (ia_ol_edition_id IS NULL) \
                 ORDER BY ia_id"
            }
            Report::OlHasOcaidIaHasNoEditionJoin => {
                "SELECT ia.ia_id, ol.ol_edition_id \
                 FROM ia INNER JOIN ol ON ia.ia_id = ol.ol_ocaid \
                 WHERE ia.ia_ol_edition_id IS NULL \
                 ORDER BY ia.ia_id"
            }
            Report::IaLinksToEditionWithoutOcaid => {
                "SELECT ia.ia_id, ia.ia_ol_edition_id \
                 FROM ia INNER JOIN ol ON ia.ia_ol_edition_id = ol.ol_edition_id \
                 WHERE ol.ol_ocaid IS NULL \
                 ORDER BY ia.ia_id"
            }
            Report::OcaidWithoutIaSourceRecord => {
                "SELECT ol_ocaid, ol_edition_id FROM ol \
                 WHERE (ol_ocaid IS NOT NULL) AND (has_ia_source_record IS 0) \
                 ORDER BY ol_edition_id"
            }
            Report::IaItemsSharingEdition => {
                "SELECT ia_id, ia_ol_edition_id FROM ia \
                 WHERE ia_ol_edition_id IN ( \
                     SELECT ia_ol_edition_id FROM ia WHERE ia_ol_edition_id IS NOT NULL \
                     GROUP BY ia_ol_edition_id HAVING COUNT(DISTINCT ia_id) > 1) \
                 ORDER BY ia_ol_edition_id, ia_id"
            }
            Report::BrokenBacklinksAfterResolution => {
                "SELECT ia.ia_id, ia.ia_ol_edition_id, ia.resolved_ia_ol_work_from_edition, \
                        ol.ol_edition_id, ol.resolved_ol_work_id \
                 FROM ia INNER JOIN ol ON ia.ia_id = ol.ol_ocaid \
                 WHERE ia.ia_ol_edition_id IS NOT ol.ol_edition_id \
                 AND ia.resolved_ia_ol_work_from_edition IS NOT NULL \
                 AND ol.resolved_ol_work_id IS NOT NULL \
                 AND ia.resolved_ia_ol_work_from_edition IS NOT ol.resolved_ol_work_id \
                 ORDER BY ia.ia_id"
            }
            Report::ResolvedWorkFromEdition => {
                "SELECT ia_id, resolved_ia_ol_work_from_edition FROM ia \
                 WHERE resolved_ia_ol_work_from_edition IS NOT NULL \
                 ORDER BY ia_id"
            }
        }
    }

    /// Run the query and write its rows to `reports_dir/<file_name>`.
    pub fn run(&self, db: &Database, reports_dir: &Path) -> Result<ReportOutcome> {
        let rows = db.query(self.sql(), [])?;
        let path = reports_dir.join(self.file_name());
        write_tsv(&path, &rows)?;

        let outcome = ReportOutcome {
            report: *self,
            count: rows.len(),
            dedupe_count: dedupe_count(&rows),
            path,
        };
        info!(
            "{}: {} ({} distinct), written to {}",
            self.description(),
            outcome.count,
            outcome.dedupe_count,
            outcome.path.display()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::loader::create_table;
    use crate::relational::schema::Table;

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        create_table(&db, Table::Ia).unwrap();
        create_table(&db, Table::Ol).unwrap();
        db.execute_batch(
            "INSERT INTO ia (ia_id, ia_ol_edition_id, ol_edition_id, resolved_ia_ol_work_from_edition) VALUES
                ('matching', 'OL1M', 'OL1M', 'OL1W'),
                ('differs', 'OL2M', 'OL3M', 'OL2W'),
                ('sameedition', 'OL2M', NULL, NULL),
                ('noedition', NULL, 'OL4M', NULL);
             INSERT INTO ol (ol_edition_id, ol_ocaid, has_multiple_works, has_ia_source_record, resolved_ol_work_id) VALUES
                ('OL1M', 'matching', 0, 1, 'OL1W'),
                ('OL3M', 'differs', 1, 0, 'OL9W'),
                ('OL2M', NULL, 0, 0, 'OL2W'),
                ('OL4M', 'noedition', 0, 1, 'OL4W');",
        )
        .unwrap();
        db
    }

    fn run(report: Report) -> String {
        let dir = tempfile::tempdir().unwrap();
        let outcome = report.run(&seeded(), dir.path()).unwrap();
        std::fs::read_to_string(outcome.path).unwrap()
    }

    #[test]
    fn backlink_differences() {
        assert_eq!(run(Report::BacklinkDifferences), "differs\tOL2M\t\tOL3M\t\tOL2W\n");
    }

    #[test]
    fn catalog_side_reports() {
        assert_eq!(run(Report::EditionsWithMultipleWorks), "OL3M\n");
        assert_eq!(run(Report::OcaidWithoutIaSourceRecord), "differs\tOL3M\n");
        assert_eq!(run(Report::OlHasOcaidIaHasNoEdition), "noedition\tOL4M\n");
        assert_eq!(run(Report::OlHasOcaidIaHasNoEditionJoin), "noedition\tOL4M\n");
        assert_eq!(run(Report::IaLinksToEditionWithoutOcaid), "differs\tOL2M\nsameedition\tOL2M\n");
    }

    #[test]
    fn items_sharing_an_edition() {
        assert_eq!(run(Report::IaItemsSharingEdition), "differs\tOL2M\nsameedition\tOL2M\n");
    }

    #[test]
    fn broken_backlinks_compare_resolved_works() {
        assert_eq!(run(Report::BrokenBacklinksAfterResolution), "differs\tOL2M\tOL2W\tOL3M\tOL9W\n");
        assert_eq!(run(Report::ResolvedWorkFromEdition), "differs\tOL2W\nmatching\tOL1W\n");
    }

    #[test]
    fn counts_include_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = Report::IaItemsSharingEdition.run(&seeded(), dir.path()).unwrap();
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.dedupe_count, 2);
    }
}
