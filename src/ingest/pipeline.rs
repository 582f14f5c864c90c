use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crossbeam::channel;
use tracing::{debug, error, info, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{ChunkRange, ParsedRecord, ShardKind};
use crate::ingest::chunk_reader::ChunkReader;
use crate::ingest::shard::ShardWriter;
use crate::parse::line_parser::{parse_line, ParseOptions};
use crate::storage::error_report::ErrorReport;
use crate::storage::layout::StorageLayout;

/// Everything a worker needs to process a chunk. Store handles are not part
/// of it; each worker opens its own report files.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub layout: StorageLayout,
    pub options: ParseOptions,
    pub errors_path: PathBuf,
    pub bad_isbns_path: Option<PathBuf>,
}

impl ChunkContext {
    pub fn from_config(config: &Config, layout: StorageLayout) -> Self {
        ChunkContext {
            layout,
            options: ParseOptions { scrub_isbns: config.scrub_data },
            errors_path: config.report_errors.clone(),
            bad_isbns_path: config.scrub_data.then(|| config.report_bad_isbns.clone()),
        }
    }
}

/// What one chunk produced.
#[derive(Debug, Clone)]
pub struct ChunkOutput {
    pub range: ChunkRange,
    pub edition_shard: PathBuf,
    pub redirect_shard: PathBuf,
    pub editions: usize,
    pub redirects: usize,
    pub malformed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub chunks: usize,
    pub editions: usize,
    pub redirects: usize,
    pub malformed: usize,
    pub failed: usize,
}

/// Parse one chunk into a fresh edition shard and a fresh redirect shard.
///
/// Malformed lines are recorded and skipped. Only I/O failures end the chunk.
pub fn process_chunk(range: &ChunkRange, ctx: &ChunkContext) -> Result<ChunkOutput> {
    let errors = ErrorReport::open(&ctx.errors_path)?;
    let bad_isbns = match &ctx.bad_isbns_path {
        Some(path) => Some(ErrorReport::open(path)?),
        None => None,
    };

    let reader = ChunkReader::open(range)?;
    let mut editions = ShardWriter::create(&ctx.layout, ShardKind::Edition)?;
    let mut redirects = ShardWriter::create(&ctx.layout, ShardKind::Redirect)?;
    let mut malformed = 0;

    for line in reader.lines() {
        let outcome = line.and_then(|fields| parse_line(&fields, ctx.options));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) if !e.is_fatal() => {
                malformed += 1;
                debug!("Skipping line in {:?}: {}", range, e);
                errors.record(&e.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(bad_isbns) = &bad_isbns {
            for isbn in &outcome.invalid_isbns {
                bad_isbns.record(isbn);
            }
        }

        match outcome.record {
            Some(ParsedRecord::Edition(edition)) => editions.write_row(&edition.to_fields())?,
            Some(ParsedRecord::Redirect(redirect)) => redirects.write_row(&redirect.to_fields())?,
            None => {}
        }
    }

    let (edition_shard, edition_rows) = editions.finish()?;
    let (redirect_shard, redirect_rows) = redirects.finish()?;

    Ok(ChunkOutput {
        range: range.clone(),
        edition_shard,
        redirect_shard,
        editions: edition_rows,
        redirects: redirect_rows,
        malformed,
    })
}

/// Remove shards left behind by an earlier run, and the bad-ISBN report if given.
pub fn remove_stale_shards(layout: &StorageLayout, bad_isbns: Option<&PathBuf>) -> Result<usize> {
    let mut removed = 0;
    for path in layout.stale_shard_files()? {
        fs::remove_file(&path)?;
        removed += 1;
    }
    if let Some(path) = bad_isbns {
        if path.exists() {
            fs::remove_file(path)?;
        }
    }
    if removed > 0 {
        info!("Removed {} stale shard files from {}", removed, layout.shard_dir.display());
    }
    Ok(removed)
}

/// Fans chunks out over a fixed pool; results arrive in completion order.
pub struct IngestionPipeline {
    pub workers: usize,
    pub progress: Arc<AtomicUsize>,
    pool: rayon::ThreadPool,
}

impl IngestionPipeline {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ingest-{}", i))
            .build()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("cannot build worker pool: {}", e)))?;

        Ok(IngestionPipeline {
            workers,
            progress: Arc::new(AtomicUsize::new(0)),
            pool,
        })
    }

    /// Chunks completed so far in the current run
    pub fn get_progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Process every range. A chunk that fails or panics does not stop the
    /// others; once all have finished the run fails if any did.
    pub fn run(&self, ranges: Vec<ChunkRange>, ctx: ChunkContext) -> Result<IngestSummary> {
        self.progress.store(0, Ordering::Relaxed);
        let total = ranges.len();
        let ctx = Arc::new(ctx);
        let (tx, rx) = channel::unbounded();

        info!("Ingesting {} chunks with {} workers", total, self.workers);
        for range in ranges {
            let tx = tx.clone();
            let ctx = Arc::clone(&ctx);
            self.pool.spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| process_chunk(&range, &ctx)));
                // The receiver outlives every worker; a failed send means the run was abandoned.
                let _ = tx.send((range, result));
            });
        }
        drop(tx);

        let mut summary = IngestSummary::default();
        for (range, result) in rx.iter() {
            let done = self.progress.fetch_add(1, Ordering::Relaxed) + 1;
            summary.chunks += 1;

            match result {
                Ok(Ok(output)) => {
                    summary.editions += output.editions;
                    summary.redirects += output.redirects;
                    summary.malformed += output.malformed;
                    info!(
                        "Chunk {}/{} done: bytes {}..{}, {} editions, {} redirects",
                        done, total, range.start, range.end, output.editions, output.redirects
                    );
                }
                Ok(Err(e)) => {
                    summary.failed += 1;
                    error!("Chunk {}..{} of {} failed: {}", range.start, range.end, range.path.display(), e);
                }
                Err(_) => {
                    summary.failed += 1;
                    error!("Chunk {}..{} of {} panicked", range.start, range.end, range.path.display());
                }
            }
        }

        if summary.malformed > 0 {
            warn!("Skipped {} malformed lines; see {}", summary.malformed, ctx.errors_path.display());
        }
        if summary.failed > 0 {
            return Err(Error::new(
                ErrorKind::Internal,
                format!("{} of {} chunks failed during ingestion", summary.failed, total),
            ));
        }

        Ok(summary)
    }
}
