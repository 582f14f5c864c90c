use std::path::{Path, PathBuf};
use std::fs;
use regex::Regex;
use uuid::Uuid;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::ShardKind;

/// Directory structure for data files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub files_dir: PathBuf,     // Dumps, shards, stores
    pub reports_dir: PathBuf,   // TSV reports and error reports
    pub shard_dir: PathBuf,     // Where parsed shards land
    pub shard_stem: String,     // e.g. "ol_dump_parsed"
    pub shard_suffix: String,   // e.g. ".txt"
}

impl StorageLayout {
    pub fn new(config: &Config) -> Result<Self> {
        let prefix = &config.ol_dump_parse_prefix;
        let shard_dir = match prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => config.files_dir.clone(),
        };
        let shard_stem = prefix
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::new(
                ErrorKind::InvalidArgument,
                format!("parse prefix {} has no file stem", prefix.display()),
            ))?
            .to_string();
        let shard_suffix = prefix
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        // Create directories
        fs::create_dir_all(&config.files_dir)?;
        fs::create_dir_all(&config.reports_dir)?;
        fs::create_dir_all(&shard_dir)?;

        Ok(StorageLayout {
            files_dir: config.files_dir.clone(),
            reports_dir: config.reports_dir.clone(),
            shard_dir,
            shard_stem,
            shard_suffix,
        })
    }

    /// `{stem}_{kind}_{random hex}{suffix}`; the hex keeps concurrent workers apart.
    pub fn new_shard_path(&self, kind: ShardKind) -> PathBuf {
        self.shard_dir.join(format!(
            "{}_{}_{}{}",
            self.shard_stem,
            kind.as_str(),
            Uuid::new_v4().simple(),
            self.shard_suffix
        ))
    }

    /// Every shard of `kind` currently on disk, sorted by name.
    pub fn shard_files(&self, kind: ShardKind) -> Result<Vec<PathBuf>> {
        let pattern = Regex::new(&format!(
            r"^{}_{}_[0-9a-f]{{32}}{}$",
            regex::escape(&self.shard_stem),
            kind.as_str(),
            regex::escape(&self.shard_suffix)
        ))?;
        self.matching_files(|name| pattern.is_match(name))
    }

    /// Every file sharing the shard stem and suffix, of any kind.
    pub fn stale_shard_files(&self) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_", self.shard_stem);
        self.matching_files(|name| name.starts_with(&prefix) && name.ends_with(&self.shard_suffix))
    }

    fn matching_files<F: Fn(&str) -> bool>(&self, matches: F) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.shard_dir.exists() {
            return Ok(files);
        }

        for entry in fs::read_dir(&self.shard_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                if matches(name) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Fail with `MissingInputFile` unless `path` is a regular file.
pub fn require_file(path: &Path, setting: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::MissingInputFile,
            format!("cannot find {}; fetch the data or check `{}` in the config", path.display(), setting),
        ))
    }
}
