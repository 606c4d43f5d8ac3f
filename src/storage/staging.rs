use crate::normalize::row::{Cell, NormalizedRow, COLUMNS};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Null sentinel of the TSV format
const NULL: &str = "\\N";

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to create staging file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write staging file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StagingError>;

/// Bulk-load command that opens every staging file
pub fn header(table: &str) -> String {
    format!("INSERT INTO {} ({}) FORMAT TSV\n", table, COLUMNS.join(","))
}

/// Escape a text value so it can't break the row or read as `\N`
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn array_item(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// TSV rendering of one cell
pub fn render(cell: &Cell<'_>) -> String {
    match cell {
        Cell::Null => NULL.to_string(),
        Cell::Text(v) => escape(v),
        Cell::Int(v) => v.to_string(),
        Cell::IntArray(items) => {
            let items: Vec<String> = items.iter().map(i64::to_string).collect();
            format!("[{}]", items.join(","))
        }
        Cell::TextArray(items) => {
            let items: Vec<String> = items.iter().map(|s| array_item(s)).collect();
            escape(&format!("[{}]", items.join(",")))
        }
    }
}

/// Staging file produced by one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub rows: usize,
}

/// Writes the bulk-load artifact for one table
pub struct StagingWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: usize,
}

impl StagingWriter {
    /// Create (or truncate) the file and write the header command
    pub fn create(path: impl Into<PathBuf>, table: &str) -> Result<Self> {
        let path = path.into();
        let create_err = |source| StagingError::Create {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(create_err)?;
        }
        let file = File::create(&path).map_err(create_err)?;

        let mut writer = Self {
            path,
            writer: BufWriter::new(file),
            rows: 0,
        };
        let head = header(table);
        writer.write_raw(head.as_bytes())?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn write_row(&mut self, row: &NormalizedRow) -> Result<()> {
        let mut line = row
            .cells()
            .iter()
            .map(render)
            .collect::<Vec<_>>()
            .join("\t");
        line.push('\n');
        self.write_raw(line.as_bytes())?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and sync the file to disk
    pub fn finish(mut self) -> Result<StagedFile> {
        self.writer.flush().map_err(|source| StagingError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|source| StagingError::Write {
                path: self.path.clone(),
                source,
            })?;
        Ok(StagedFile {
            path: self.path,
            rows: self.rows,
        })
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .map_err(|source| StagingError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a\tb\nc\\d\re"), "a\\tb\\nc\\\\d\\re");
        assert_eq!(escape("\\N"), "\\\\N");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_render_cells() {
        assert_eq!(render(&Cell::Null), "\\N");
        assert_eq!(render(&Cell::Int(-3)), "-3");
        assert_eq!(render(&Cell::IntArray(&[])), "[]");
        assert_eq!(render(&Cell::IntArray(&[1, 2])), "[1,2]");
        let items = vec!["a".to_string(), "it's".to_string()];
        assert_eq!(render(&Cell::TextArray(&items)), "['a','it\\\\'s']");
    }

    #[test]
    fn test_header_lists_columns() {
        let head = header("analytics.clickstream");
        assert!(head.starts_with("INSERT INTO analytics.clickstream (event_time,site,is_mobile,"));
        assert!(head.ends_with(",mvt.name,mvt.value) FORMAT TSV\n"));
    }

    #[test]
    fn test_writer_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("stage.tsv");
        let mut writer = StagingWriter::create(&path, "clicks").unwrap();

        let row = NormalizedRow {
            event_time: "2025-12-04 02:42:11".to_string(),
            site: "example".to_string(),
            action_name: Some("tab\there".to_string()),
            ..Default::default()
        };
        writer.write_row(&row).unwrap();
        writer.write_row(&row).unwrap();
        assert_eq!(writer.rows(), 2);

        let staged = writer.finish().unwrap();
        assert_eq!(staged.rows, 2);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("INSERT INTO clicks ("));

        let fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(fields.len(), COLUMNS.len());
        assert_eq!(fields[0], "2025-12-04 02:42:11");
        assert_eq!(fields[3], "\\N");
        assert_eq!(fields[4], "tab\\there");
    }
}
