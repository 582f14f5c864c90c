//! Trusted table and column names.
//!
//! SQL identifiers cannot be bound as parameters, so the generic column
//! operations splice them into statement text. Only these enums are ever
//! spliced; nothing read from a dump or the command line reaches an identifier.

use std::fmt;
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Archive items and the catalog ids they claim
    Ia,
    /// Catalog editions
    Ol,
    EditionCoverData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    IaId,
    IaOlEditionId,
    IaOlWorkId,
    OlEditionId,
    ResolvedIaOlWorkId,
    ResolvedIaOlWorkFromEdition,
    OlWorkId,
    OlOcaid,
    Isbn13,
    HasMultipleWorks,
    HasIaSourceRecord,
    HasCover,
    Isbn13s,
    ResolvedOlEditionId,
    ResolvedOlWorkId,
    CoverExists,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Ia => "ia",
            Table::Ol => "ol",
            Table::EditionCoverData => "edition_cover_data",
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        use Column::*;
        match self {
            Table::Ia => &[
                IaId,
                IaOlEditionId,
                IaOlWorkId,
                OlEditionId,
                ResolvedIaOlWorkId,
                ResolvedIaOlWorkFromEdition,
            ],
            Table::Ol => &[
                OlEditionId,
                OlWorkId,
                OlOcaid,
                Isbn13,
                HasMultipleWorks,
                HasIaSourceRecord,
                HasCover,
                Isbn13s,
                ResolvedOlEditionId,
                ResolvedOlWorkId,
            ],
            Table::EditionCoverData => &[Isbn13, CoverExists],
        }
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns().contains(&column)
    }

    /// `Err(InvalidArgument)` unless `column` belongs to this table.
    pub fn check_column(&self, column: Column) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("table {} has no column {}", self, column),
            ))
        }
    }

    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns()
            .iter()
            .map(|c| match (self, c) {
                (Table::EditionCoverData, Column::Isbn13) => format!("{} TEXT PRIMARY KEY", c),
                _ => format!("{} {}", c, c.sql_type()),
            })
            .collect();
        format!("CREATE TABLE {} ({})", self, columns.join(", "))
    }

    /// Created after the bulk insert; building them first slows inserts.
    pub fn index_sql(&self) -> &'static [&'static str] {
        match self {
            Table::Ia => &[
                "CREATE INDEX idx_ia_id ON ia(ia_id)",
                "CREATE INDEX idx_ia_ol_work ON ia(ia_ol_work_id)",
            ],
            Table::Ol => &[
                "CREATE INDEX idx_ol_edition ON ol(ol_edition_id)",
                "CREATE INDEX idx_ol_work ON ol(ol_work_id)",
                "CREATE INDEX idx_ol_ocaid ON ol(ol_ocaid)",
            ],
            Table::EditionCoverData => &[],
        }
    }
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::IaId => "ia_id",
            Column::IaOlEditionId => "ia_ol_edition_id",
            Column::IaOlWorkId => "ia_ol_work_id",
            Column::OlEditionId => "ol_edition_id",
            Column::ResolvedIaOlWorkId => "resolved_ia_ol_work_id",
            Column::ResolvedIaOlWorkFromEdition => "resolved_ia_ol_work_from_edition",
            Column::OlWorkId => "ol_work_id",
            Column::OlOcaid => "ol_ocaid",
            Column::Isbn13 => "isbn_13",
            Column::HasMultipleWorks => "has_multiple_works",
            Column::HasIaSourceRecord => "has_ia_source_record",
            Column::HasCover => "has_cover",
            Column::Isbn13s => "isbn_13s",
            Column::ResolvedOlEditionId => "resolved_ol_edition_id",
            Column::ResolvedOlWorkId => "resolved_ol_work_id",
            Column::CoverExists => "cover_exists",
        }
    }

    fn sql_type(&self) -> &'static str {
        match self {
            Column::HasMultipleWorks | Column::HasIaSourceRecord | Column::HasCover | Column::CoverExists => "INTEGER",
            _ => "TEXT",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
