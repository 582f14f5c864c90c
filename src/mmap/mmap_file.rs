use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;
use crate::core::error::Result;

/// Memory-mapped file for zero-copy reads
pub struct MmapFile {
    mmap: Option<Mmap>,  // None for empty files, which cannot be mapped
    pub len: usize,
}

impl MmapFile {
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let metadata = file.metadata()?;
        let len = metadata.len() as usize;

        if len == 0 {
            return Ok(MmapFile { mmap: None, len });
        }

        // The dumps are written once and only read afterwards, so the mapping
        // cannot observe concurrent truncation from this process.
        let mmap = unsafe { MmapOptions::new().len(len).map(&file)? };

        Ok(MmapFile { mmap: Some(mmap), len })
    }

    pub fn data(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    /// Lines whose first byte lies in `[start, end)`.
    pub fn lines_between(&self, start: u64, end: u64) -> LineIter<'_> {
        let data = self.data();
        LineIter {
            data,
            position: (start as usize).min(data.len()),
            end: (end.min(data.len() as u64)) as usize,
        }
    }

    pub fn lines(&self) -> LineIter<'_> {
        self.lines_between(0, self.len as u64)
    }
}

/// One raw line, without its terminator, plus the offset it started at.
#[derive(Debug, Clone, Copy)]
pub struct RawLine<'a> {
    pub offset: u64,
    pub bytes: &'a [u8],
}

pub struct LineIter<'a> {
    data: &'a [u8],
    position: usize,
    end: usize,
}

impl<'a> Iterator for LineIter<'a> {
    type Item = RawLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }

        let start = self.position;
        let rest = &self.data[start..];
        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(newline) => (&rest[..newline], newline + 1),
            None => (rest, rest.len()),
        };
        self.position = start + consumed;

        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Some(RawLine { offset: start as u64, bytes: line })
    }
}
