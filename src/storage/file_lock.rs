use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use crate::core::error::{Error, ErrorKind, Result};

/// Single writer guarantee for a key-value store file
pub struct FileLock {
    pub file: File,
    pub path: PathBuf,
    pub exclusive: bool,
}

impl FileLock {
    /// Lock `<store>.lock`. Exclusive for writers, shared for readers.
    pub fn acquire(store_path: &Path, exclusive: bool) -> Result<Self> {
        let mut lock_name = store_path.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        // Platform-specific locking
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_SH, LOCK_NB};

            let fd = file.as_raw_fd();
            let operation = if exclusive { LOCK_EX } else { LOCK_SH } | LOCK_NB;

            unsafe {
                if flock(fd, operation) != 0 {
                    return Err(Error {
                        kind: ErrorKind::Io,
                        context: format!("{} is locked by another process", store_path.display()),
                    })
                }
            }
        }

        Ok(FileLock { file, path: lock_path, exclusive })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn second_writer_is_refused_until_first_drops() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("redirects.kv");

        let first = FileLock::acquire(&store, true).unwrap();
        assert!(FileLock::acquire(&store, true).is_err());
        drop(first);
        assert!(FileLock::acquire(&store, true).is_ok());
    }

    #[test]
    fn readers_share_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("map.kv");

        let _a = FileLock::acquire(&store, false).unwrap();
        let _b = FileLock::acquire(&store, false).unwrap();
        assert!(FileLock::acquire(&store, true).is_err());
    }
}
