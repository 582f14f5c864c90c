use tracing::{info, warn};
use crate::core::batch::batcher;
use crate::core::error::Result;
use crate::core::types::ShardKind;
use crate::ingest::shard::read_shard_rows;
use crate::storage::error_report::ErrorReport;
use crate::storage::kv_store::KeyValueStore;
use crate::storage::layout::StorageLayout;

/// Load every redirect shard into `store` as `origin -> destination`.
///
/// Must finish before any resolution starts. Returns the number of pairs written.
pub fn create_redirects_db<S: KeyValueStore + ?Sized>(
    store: &S,
    layout: &StorageLayout,
    batch_size: usize,
    errors: &ErrorReport,
) -> Result<usize> {
    let files = layout.shard_files(ShardKind::Redirect)?;
    info!("Loading redirects from {} shards", files.len());

    let mut written = 0;
    for path in files {
        let rows = read_shard_rows(&path, 2)?.filter_map(|row| match row {
            Ok(mut fields) => {
                let destination = fields.pop()?;
                let origin = fields.pop()?;
                Some(Ok((origin, destination)))
            }
            Err(e) if !e.is_fatal() => {
                warn!("{}", e);
                errors.record(&e.to_string());
                None
            }
            Err(e) => Some(Err(e)),
        });

        for batch in batcher(rows, batch_size) {
            let pairs = batch.into_iter().collect::<Result<Vec<_>>>()?;
            store.bulk_update(&pairs)?;
            written += pairs.len();
        }
    }

    info!("Loaded {} redirects", written);
    Ok(written)
}
