use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use crate::core::error::{Error, Result};
use crate::core::types::ShardKind;
use crate::ingest::chunk_reader::FIELD_DELIMITER;
use crate::storage::layout::StorageLayout;

/// Tab-delimited output file for one kind of parsed record.
pub struct ShardWriter {
    pub path: PathBuf,
    pub kind: ShardKind,
    pub rows: usize,
    writer: BufWriter<File>,
}

impl ShardWriter {
    /// A fresh, uniquely named shard under the layout's shard directory.
    pub fn create(layout: &StorageLayout, kind: ShardKind) -> Result<Self> {
        let path = layout.new_shard_path(kind);
        let file = File::create(&path)?;
        Ok(ShardWriter {
            path,
            kind,
            rows: 0,
            writer: BufWriter::new(file),
        })
    }

    pub fn write_row<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.writer.write_all(b"\t")?;
            }
            self.writer.write_all(sanitize(field.as_ref()).as_bytes())?;
        }
        self.writer.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and hand back the path and row count.
    pub fn finish(mut self) -> Result<(PathBuf, usize)> {
        self.writer.flush()?;
        Ok((self.path, self.rows))
    }
}

// Tabs and newlines inside a value would break the row layout.
fn sanitize(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains(['\t', '\n', '\r']) {
        field.replace(['\t', '\n', '\r'], " ").into()
    } else {
        field.into()
    }
}

/// Rows of a shard file, each checked against `expected_fields`.
pub fn read_shard_rows<P: AsRef<Path>>(path: P, expected_fields: usize) -> Result<ShardRows> {
    let path = path.as_ref().to_path_buf();
    let file = File::open(&path)?;
    Ok(ShardRows {
        path,
        expected_fields,
        line_number: 0,
        lines: BufReader::new(file).lines(),
    })
}

pub struct ShardRows {
    pub path: PathBuf,
    expected_fields: usize,
    line_number: usize,
    lines: Lines<BufReader<File>>,
}

impl Iterator for ShardRows {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;
            if line.is_empty() {
                continue;
            }

            let fields: Vec<String> = line.split(FIELD_DELIMITER).map(str::to_string).collect();
            if fields.len() != self.expected_fields {
                return Some(Err(Error::malformed(format!(
                    "{}:{} has {} fields, expected {}",
                    self.path.display(),
                    self.line_number,
                    fields.len(),
                    self.expected_fields
                ))));
            }
            return Some(Ok(fields));
        }
    }
}
