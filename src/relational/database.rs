use std::fs;
use std::path::{Path, PathBuf};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Params, Row};
use tracing::debug;
use crate::core::error::Result;

/// One staging-table row with every value rendered as text; NULL stays `None`.
pub type TextRow = Vec<Option<String>>;

/// Single-writer connection to the staging store.
///
/// Writes open a transaction lazily; nothing is durable until `commit`.
pub struct Database {
    conn: Connection,
    pub path: Option<PathBuf>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        debug!("Opened staging database {}", path.display());

        Ok(Database { conn, path: Some(path.to_path_buf()) })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        Ok(Database { conn, path: None })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        // journal_mode answers with the mode in effect ("memory" for in-memory databases)
        let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -64000)?;  // 64MB
        conn.busy_timeout(std::time::Duration::from_secs(60))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn begin_if_needed(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// Run one statement, returning the number of rows changed.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.begin_if_needed()?;
        Ok(self.conn.execute(sql, params)?)
    }

    /// Run several `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.begin_if_needed()?;
        Ok(self.conn.execute_batch(sql)?)
    }

    /// Run one prepared statement per parameter set; returns total rows changed.
    pub fn execute_many<P, I>(&self, sql: &str, rows: I) -> Result<usize>
    where
        P: Params,
        I: IntoIterator<Item = P>,
    {
        self.begin_if_needed()?;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut changed = 0;
        for params in rows {
            changed += stmt.execute(params)?;
        }
        Ok(changed)
    }

    /// Fetch every row of a query into memory. Meant for small results.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<TextRow>> {
        let mut rows = Vec::new();
        self.stream_rows(sql, params, |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }

    /// Walk a query with a live cursor, handing each row to `f`.
    ///
    /// Do not write to the same table from `f`; stage the rows first.
    pub fn stream_rows<P, F>(&self, sql: &str, params: P, mut f: F) -> Result<usize>
    where
        P: Params,
        F: FnMut(TextRow) -> Result<()>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query(params)?;
        let mut seen = 0;
        while let Some(row) = rows.next()? {
            f(text_row(row, columns)?)?;
            seen += 1;
        }
        Ok(seen)
    }

    pub fn commit(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn text_row(row: &Row<'_>, columns: usize) -> Result<TextRow> {
    let mut values = Vec::with_capacity(columns);
    for i in 0..columns {
        let value = match row.get_ref(i)? {
            ValueRef::Null => None,
            ValueRef::Integer(n) => Some(n.to_string()),
            ValueRef::Real(f) => Some(f.to_string()),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        };
        values.push(value);
    }
    Ok(values)
}
