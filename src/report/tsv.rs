use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use crate::core::error::Result;
use crate::relational::database::TextRow;

/// Write query output as TSV, NULL as an empty field.
pub fn write_tsv<P: AsRef<Path>>(path: P, rows: &[TextRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for row in rows {
        let line: Vec<&str> = row.iter().map(|v| v.as_deref().unwrap_or("")).collect();
        writer.write_all(line.join("\t").as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Number of distinct rows.
pub fn dedupe_count(rows: &[TextRow]) -> usize {
    rows.iter().collect::<HashSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_become_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("out.tsv");
        let rows = vec![
            vec![Some("itemid".to_string()), Some("OL003W".to_string())],
            vec![Some("other".to_string()), None],
            vec![Some("itemid".to_string()), Some("OL003W".to_string())],
        ];

        write_tsv(&path, &rows).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "itemid\tOL003W\nother\t\nitemid\tOL003W\n"
        );
        assert_eq!(dedupe_count(&rows), 2);
    }
}
