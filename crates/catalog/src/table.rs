//! Delimited table codec.
//!
//! Thin layer over the `csv` crate in its default RFC-4180 dialect (quoted
//! fields, `""` escapes, CRLF or LF line ends). On top of it:
//! - The first record is the header row
//! - Short rows are padded, long rows are an error
//! - Text that is not UTF-8 is read as Latin-1
//!
//! Exports produced by older training runs were written by different tools,
//! so columns are looked up by a list of accepted aliases instead of a
//! single fixed name.

use crate::error::{CatalogError, Result};
use csv::{ReaderBuilder, Terminator, Writer, WriterBuilder};
use std::fs;
use std::io;
use std::path::Path;

/// An in-memory delimited table: a header row plus string cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DelimitedTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DelimitedTable {
    /// Creates an empty table with the given header row
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Reads a table from disk.
    ///
    /// The file is decoded as UTF-8; if that fails every byte is taken as a
    /// Latin-1 code point, which never fails.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CatalogError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let bytes = fs::read(path)?;
        let text = decode_text(bytes);
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(&text, &file)
    }

    /// Parses table text. `file` is only used in error messages.
    pub fn parse(text: &str, file: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| parse_error(file, &e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            return Ok(Self::default());
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| parse_error(file, &e))?;
            // A lone empty field is a blank line
            if record.len() == 1 && record[0].trim().is_empty() {
                continue;
            }
            if record.len() > headers.len() {
                return Err(CatalogError::ParseError {
                    file: file.to_string(),
                    line: record.position().map_or(0, |p| p.line() as usize),
                    reason: format!(
                        "expected {} fields, found {}",
                        headers.len(),
                        record.len()
                    ),
                });
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            // Short rows are padded; trailing empty cells are often dropped by exporters
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first header matching any alias (case-sensitive)
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.headers.iter().position(|h| h == alias))
    }

    /// Like [`column`](Self::column) but a missing column is an error
    pub fn require_column(&self, file: &str, aliases: &[&str]) -> Result<usize> {
        self.column(aliases).ok_or_else(|| CatalogError::MissingColumn {
            file: file.to_string(),
            column: aliases.join("|"),
        })
    }

    /// Appends a row. Rows of the wrong width are rejected.
    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.headers.len() {
            return Err(CatalogError::ValidationError(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.headers.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Serializes the table to CSV text with a trailing newline
    pub fn to_csv_string(&self) -> Result<String> {
        let mut writer = writer_builder().from_writer(Vec::new());
        self.write_records(&mut writer)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| CatalogError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| CatalogError::ValidationError(e.to_string()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = writer_builder().from_path(path)?;
        self.write_records(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn write_records<W: io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        Ok(())
    }
}

/// UTF-8 first, Latin-1 otherwise
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

/// LF line ends, quoting only where needed
fn writer_builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder.terminator(Terminator::Any(b'\n'));
    builder
}

fn parse_error(file: &str, err: &csv::Error) -> CatalogError {
    CatalogError::ParseError {
        file: file.to_string(),
        line: err.position().map_or(0, |p| p.line() as usize),
        reason: err.to_string(),
    }
}
