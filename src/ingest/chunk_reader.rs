use std::path::{Path, PathBuf};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::ChunkRange;
use crate::mmap::mmap_file::{LineIter, MmapFile};

pub const FIELD_DELIMITER: char = '\t';

/// Split `path` into line-aligned byte ranges of roughly `size` bytes.
///
/// Each range ends just past a newline, so no line straddles two ranges.
/// The last range may end beyond EOF; readers stop at EOF anyway.
pub fn make_chunk_ranges<P: AsRef<Path>>(path: P, size: u64) -> Result<Vec<ChunkRange>> {
    let path = path.as_ref();
    if size == 0 {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            "chunk size must be greater than zero".to_string(),
        ));
    }

    let file = MmapFile::open_read_only(path)?;
    let data = file.data();
    let file_len = data.len() as u64;

    let mut ranges = Vec::new();
    let mut cursor = 0u64;
    loop {
        let start = cursor;
        let position = start.saturating_add(size);
        let end = if position >= file_len {
            position
        } else {
            match data[position as usize..].iter().position(|&b| b == b'\n') {
                Some(newline) => position + newline as u64 + 1,
                None => file_len,
            }
        };

        ranges.push(ChunkRange::new(start, end, path));
        if end >= file_len {
            break;
        }
        cursor = end;
    }

    Ok(ranges)
}

/// Tab-split lines of one chunk, read through a memory map.
pub struct ChunkReader {
    pub range: ChunkRange,
    file: MmapFile,
}

impl ChunkReader {
    pub fn open(range: &ChunkRange) -> Result<Self> {
        let file = MmapFile::open_read_only(&range.path)?;
        Ok(ChunkReader { range: range.clone(), file })
    }

    /// The whole of `path` as a single chunk.
    pub fn whole_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let file = MmapFile::open_read_only(&path)?;
        let range = ChunkRange::new(0, file.len as u64, path);
        Ok(ChunkReader { range, file })
    }

    /// Every non-blank line starting before the range end, split on tabs.
    ///
    /// A line that is not UTF-8 yields a `MalformedRecord` item; iteration goes on.
    pub fn lines(&self) -> ChunkLines<'_> {
        ChunkLines {
            inner: self.file.lines_between(self.range.start, self.range.end),
        }
    }
}

pub struct ChunkLines<'a> {
    inner: LineIter<'a>,
}

impl<'a> Iterator for ChunkLines<'a> {
    type Item = Result<Vec<&'a str>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.inner.next()?;
            if line.bytes.is_empty() {
                continue;
            }

            return Some(match std::str::from_utf8(line.bytes) {
                Ok(text) => Ok(text.split(FIELD_DELIMITER).collect()),
                Err(e) => Err(Error::malformed(format!(
                    "line at byte {} is not UTF-8: {}",
                    line.offset, e
                ))),
            });
        }
    }
}
