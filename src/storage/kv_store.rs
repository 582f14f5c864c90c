use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use crc32fast::Hasher;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::file_lock::FileLock;

const MAGIC: &[u8; 8] = b"RCKVLOG1";
const MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024;

/// The associative-array view every resolver component is written against.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Insert many pairs at once; later pairs win over earlier ones.
    fn bulk_update(&self, pairs: &[(String, String)]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the file if needed, otherwise replay what is there
    CreateOrOpen,
    /// Start from an empty store, discarding any previous contents
    Truncate,
    /// Shared access for readers once the store is built
    ReadOnly,
}

/// Persistent string -> string map.
///
/// On disk it is an append-only log of checksummed `(key, value)` records
/// ([len u32][crc32 u32][bincode payload]) behind an 8-byte magic header.
/// Opening replays the log into an in-memory index, so reads never touch disk.
pub struct KvStore {
    pub path: PathBuf,
    pub mode: OpenMode,
    index: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    writer: Option<Mutex<BufWriter<File>>>,
    _lock: FileLock,
}

impl KvStore {
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let lock = FileLock::acquire(&path, mode != OpenMode::ReadOnly)?;

        if mode == OpenMode::ReadOnly {
            let file = File::open(&path).map_err(|e| Error::new(
                ErrorKind::MissingInputFile,
                format!("cannot open store {}: {}", path.display(), e),
            ))?;
            let (index, _) = Self::replay(file, &path)?;
            return Ok(KvStore {
                path,
                mode,
                index: RwLock::new(index),
                writer: None,
                _lock: lock,
            });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(mode == OpenMode::Truncate)
            .open(&path)?;

        let index = if file.metadata()?.len() == 0 {
            file.write_all(MAGIC)?;
            file.sync_all()?;
            HashMap::new()
        } else {
            let (index, valid_len) = Self::replay(file.try_clone()?, &path)?;
            if valid_len < file.metadata()?.len() {
                warn!(
                    "Truncating {} to {} bytes after an incomplete record",
                    path.display(),
                    valid_len
                );
                file.set_len(valid_len)?;
            }
            index
        };

        file.seek(SeekFrom::End(0))?;
        debug!("Opened store {} with {} entries", path.display(), index.len());

        Ok(KvStore {
            path,
            mode,
            index: RwLock::new(index),
            writer: Some(Mutex::new(BufWriter::with_capacity(1024 * 1024, file))),
            _lock: lock,
        })
    }

    pub fn get_bytes(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.index.read().get(key).cloned()
    }

    pub fn put_bytes(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_many_bytes(std::iter::once((key, value)))
    }

    /// Encode every pair, append them in one write, then publish them to readers.
    ///
    /// A rejected pair rejects the whole batch; nothing reaches the log or the index.
    pub fn put_many_bytes<'a, I>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let writer = self.writer.as_ref().ok_or_else(|| Error::new(
            ErrorKind::InvalidArgument,
            format!("store {} was opened read-only", self.path.display()),
        ))?;

        let mut encoded = Vec::new();
        let mut staged = Vec::new();
        for (key, value) in pairs {
            let payload = bincode::serialize(&(key, value))?;
            if payload.len() > MAX_ENTRY_SIZE {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("entry of {} bytes exceeds store limit", payload.len()),
                ));
            }

            let mut hasher = Hasher::new();
            hasher.update(&payload);

            encoded.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            encoded.extend_from_slice(&hasher.finalize().to_le_bytes());
            encoded.extend_from_slice(&payload);
            staged.push((key.to_vec(), value.to_vec()));
        }

        {
            let mut writer = writer.lock();
            writer.write_all(&encoded)?;
            writer.flush()?;
        }

        let mut index = self.index.write();
        for (key, value) in staged {
            index.insert(key, value);
        }
        Ok(())
    }

    /// Flush buffered records and fsync.
    pub fn sync(&self) -> Result<()> {
        if let Some(writer) = &self.writer {
            let mut writer = writer.lock();
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild the index; returns it with the byte length of the valid prefix.
    fn replay(file: File, path: &Path) -> Result<(HashMap<Vec<u8>, Vec<u8>>, u64)> {
        let mut reader = BufReader::with_capacity(1024 * 1024, file);
        reader.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 8];
        if reader.read_exact(&mut magic).is_err() || &magic != MAGIC {
            return Err(Error::new(
                ErrorKind::Corrupted,
                format!("{} is not a key-value store", path.display()),
            ));
        }

        let mut index = HashMap::new();
        let mut valid_len = MAGIC.len() as u64;

        loop {
            let mut header = [0u8; 8];
            match reader.read_exact(&mut header) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            if len > MAX_ENTRY_SIZE {
                warn!("Oversized record in {} at byte {}", path.display(), valid_len);
                break;
            }

            let mut payload = vec![0u8; len];
            if reader.read_exact(&mut payload).is_err() {
                break;
            }

            let mut hasher = Hasher::new();
            hasher.update(&payload);
            if hasher.finalize() != crc {
                warn!("Checksum mismatch in {} at byte {}", path.display(), valid_len);
                break;
            }

            let (key, value): (Vec<u8>, Vec<u8>) = bincode::deserialize(&payload)?;
            index.insert(key, value);
            valid_len += 8 + len as u64;
        }

        Ok((index, valid_len))
    }
}

impl KeyValueStore for KvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.get_bytes(key.as_bytes()) {
            Some(value) => String::from_utf8(value).map(Some).map_err(|e| Error::new(
                ErrorKind::Corrupted,
                format!("non UTF-8 value for {} in {}: {}", key, self.path.display(), e),
            )),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.put_bytes(key.as_bytes(), value.as_bytes())
    }

    fn bulk_update(&self, pairs: &[(String, String)]) -> Result<()> {
        self.put_many_bytes(pairs.iter().map(|(k, v)| (k.as_bytes(), v.as_bytes())))
    }
}

impl Drop for KvStore {
    fn drop(&mut self) {
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.lock().flush() {
                warn!("Failed to flush {} on close: {}", self.path.display(), e);
            }
        }
    }
}

/// Heap-only store for tests and benchmarks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        MemoryStore { map: RwLock::new(map) }
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn bulk_update(&self, pairs: &[(String, String)]) -> Result<()> {
        let mut map = self.map.write();
        for (key, value) in pairs {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
