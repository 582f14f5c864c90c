use std::fs;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::core::error::{Error, ErrorKind, Result};

/// Rows per bulk write against either store
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub files_dir: PathBuf,
    pub reports_dir: PathBuf,

    pub sqlite_db: PathBuf,
    pub redirect_db: PathBuf,      // origin id -> recorded destination
    pub mapping_db: PathBuf,       // resolved edition -> resolved work

    pub ia_physical_direct_dump: PathBuf,
    pub ol_all_dump: PathBuf,
    pub ol_dump_parse_prefix: PathBuf, // stem + suffix shared by every shard

    pub report_errors: PathBuf,
    pub report_bad_isbns: PathBuf,
    pub scrub_data: bool,

    pub chunk_size: u64,
    pub batch_size: usize,
    pub workers: usize,
}

/// A config file as written; unset keys fall back to defaults derived from
/// whichever directories it does set.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    files_dir: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
    sqlite_db: Option<PathBuf>,
    redirect_db: Option<PathBuf>,
    mapping_db: Option<PathBuf>,
    ia_physical_direct_dump: Option<PathBuf>,
    ol_all_dump: Option<PathBuf>,
    ol_dump_parse_prefix: Option<PathBuf>,
    report_errors: Option<PathBuf>,
    report_bad_isbns: Option<PathBuf>,
    scrub_data: Option<bool>,
    chunk_size: Option<u64>,
    batch_size: Option<usize>,
    workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config::with_dirs(PathBuf::from("./files"), PathBuf::from("./reports"))
    }
}

impl Config {
    /// Every path derived from the two directories.
    pub fn with_dirs(files_dir: PathBuf, reports_dir: PathBuf) -> Self {
        Config {
            sqlite_db: files_dir.join("reconcile.sqlite"),
            redirect_db: files_dir.join("redirects.kv"),
            mapping_db: files_dir.join("edition_to_work.kv"),
            ia_physical_direct_dump: files_dir.join("ia_physical_direct.tsv"),
            ol_all_dump: files_dir.join("ol_dump_all.txt"),
            ol_dump_parse_prefix: files_dir.join("ol_dump_parsed.txt"),
            report_errors: reports_dir.join("report_errors.txt"),
            report_bad_isbns: reports_dir.join("report_bad_isbns.txt"),
            scrub_data: false,
            chunk_size: 1024 * 1024 * 1024,  // 1 GiB per chunk
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
            files_dir,
            reports_dir,
        }
    }

    /// Read a TOML config. Absent paths are derived from `files_dir` and
    /// `reports_dir`, themselves defaulting to `./files` and `./reports`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::new(
                ErrorKind::MissingInputFile,
                format!("config file {} not found", path.display()),
            ));
        }

        let text = fs::read_to_string(path)?;
        let config = Config::from_file(toml::from_str(&text)?);
        config.validate()?;
        Ok(config)
    }

    fn from_file(file: ConfigFile) -> Self {
        let defaults = Config::default();
        let base = Config::with_dirs(
            file.files_dir.unwrap_or(defaults.files_dir),
            file.reports_dir.unwrap_or(defaults.reports_dir),
        );

        Config {
            sqlite_db: file.sqlite_db.unwrap_or(base.sqlite_db),
            redirect_db: file.redirect_db.unwrap_or(base.redirect_db),
            mapping_db: file.mapping_db.unwrap_or(base.mapping_db),
            ia_physical_direct_dump: file.ia_physical_direct_dump.unwrap_or(base.ia_physical_direct_dump),
            ol_all_dump: file.ol_all_dump.unwrap_or(base.ol_all_dump),
            ol_dump_parse_prefix: file.ol_dump_parse_prefix.unwrap_or(base.ol_dump_parse_prefix),
            report_errors: file.report_errors.unwrap_or(base.report_errors),
            report_bad_isbns: file.report_bad_isbns.unwrap_or(base.report_bad_isbns),
            scrub_data: file.scrub_data.unwrap_or(base.scrub_data),
            chunk_size: file.chunk_size.unwrap_or(base.chunk_size),
            batch_size: file.batch_size.unwrap_or(base.batch_size),
            workers: file.workers.unwrap_or(base.workers),
            files_dir: base.files_dir,
            reports_dir: base.reports_dir,
        }
    }

    /// Everything rooted under one directory, used by tests and one-off runs.
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Config::with_dirs(root.join("files"), root.join("reports"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::new(ErrorKind::InvalidArgument, "chunk_size must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::new(ErrorKind::InvalidArgument, "batch_size must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::new(ErrorKind::InvalidArgument, "workers must be positive".to_string()));
        }
        Ok(())
    }
}

/// One core is left for the collecting thread.
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
