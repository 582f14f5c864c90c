use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// A `/type/redirect` edge as recorded in the catalog dump.
///
/// `destination_id` is where the origin pointed when the dump was cut. It is not
/// necessarily terminal; the destination may itself have been redirected later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedRedirect {
    pub origin_id: String,
    pub destination_id: String,
}

impl ParsedRedirect {
    pub fn new(origin_id: impl Into<String>, destination_id: impl Into<String>) -> Self {
        ParsedRedirect {
            origin_id: origin_id.into(),
            destination_id: destination_id.into(),
        }
    }

    pub fn to_fields(&self) -> Vec<String> {
        vec![self.origin_id.clone(), self.destination_id.clone()]
    }
}

/// A `/type/edition` record reduced to the columns the staging table keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEdition {
    pub edition_id: String,
    pub work_id: Option<String>,
    pub ocaid: Option<String>,
    pub isbn_13: Option<String>,
    pub has_multiple_works: bool,
    pub has_ia_source_record: bool,
    pub has_cover: bool,
    pub isbn_13s: String,  // comma-joined canonical ISBN-13 set
}

impl ParsedEdition {
    pub const FIELD_COUNT: usize = 8;

    /// Shard column order. Absent values become empty strings.
    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.edition_id.clone(),
            self.work_id.clone().unwrap_or_default(),
            self.ocaid.clone().unwrap_or_default(),
            self.isbn_13.clone().unwrap_or_default(),
            flag(self.has_multiple_works),
            flag(self.has_ia_source_record),
            flag(self.has_cover),
            self.isbn_13s.clone(),
        ]
    }

    pub fn isbn_13_list(&self) -> impl Iterator<Item = &str> {
        self.isbn_13s.split(',').filter(|isbn| !isbn.is_empty())
    }
}

fn flag(value: bool) -> String {
    if value { "1".to_string() } else { "0".to_string() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    Redirect(ParsedRedirect),
    Edition(ParsedEdition),
}

/// Kinds of shard file written by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShardKind {
    Edition,
    Redirect,
}

impl ShardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardKind::Edition => "edition",
            ShardKind::Redirect => "redirect",
        }
    }
}

/// Byte range `[start, end)` of a dump. `end` may run past EOF on the last chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
    pub path: PathBuf,
}

impl ChunkRange {
    pub fn new(start: u64, end: u64, path: impl Into<PathBuf>) -> Self {
        ChunkRange { start, end, path: path.into() }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of chasing one id through the redirect store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub terminal: String,
    /// Every id visited before the terminal, starting with the queried id.
    pub intermediates: Vec<String>,
}

impl Resolution {
    pub fn is_redirected(&self) -> bool {
        !self.intermediates.is_empty()
    }

    /// `(terminal, intermediate)` pairs, one per hop, ready for a batch UPDATE.
    pub fn update_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.intermediates
            .iter()
            .map(move |intermediate| (self.terminal.clone(), intermediate.clone()))
    }
}
