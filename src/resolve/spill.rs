use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Seek, SeekFrom, Write};
use rusqlite::Params;
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::relational::database::Database;

/// Query results parked in an anonymous temp file.
///
/// Updating a table while a cursor over it is still open is not safe, so the
/// ids to update are read out completely before the first write.
pub struct SpillFile {
    writer: BufWriter<File>,
    pub rows: usize,
}

impl SpillFile {
    pub fn new() -> Result<Self> {
        Ok(SpillFile {
            writer: BufWriter::new(tempfile::tempfile()?),
            rows: 0,
        })
    }

    /// Stage every row of `sql` that has no NULL and no empty value.
    pub fn stage_query<P: Params>(db: &Database, sql: &str, params: P) -> Result<Self> {
        let mut spill = SpillFile::new()?;
        let seen = db.stream_rows(sql, params, |row| {
            let fields: Option<Vec<String>> = row
                .into_iter()
                .map(|value| value.filter(|v| !v.is_empty()))
                .collect();
            match fields {
                Some(fields) => spill.push(&fields),
                None => Ok(()),
            }
        })?;
        debug!("Staged {} of {} rows from `{}`", spill.rows, seen, sql);
        Ok(spill)
    }

    pub fn push<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        for (i, field) in fields.iter().enumerate() {
            let field = field.as_ref();
            if field.contains(['\t', '\n']) {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("cannot stage value containing a delimiter: {:?}", field),
                ));
            }
            if i > 0 {
                self.writer.write_all(b"\t")?;
            }
            self.writer.write_all(field.as_bytes())?;
        }
        self.writer.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    /// Rewind and read the staged rows back in order.
    pub fn into_rows(self) -> Result<SpillRows> {
        let mut file = self.writer.into_inner().map_err(|e| Error::from(e.into_error()))?;
        file.seek(SeekFrom::Start(0))?;
        Ok(SpillRows { lines: BufReader::new(file).lines() })
    }
}

pub struct SpillRows {
    lines: Lines<BufReader<File>>,
}

impl Iterator for SpillRows {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        Some(
            line.map(|line| line.split('\t').map(str::to_string).collect())
                .map_err(Error::from),
        )
    }
}
