//! Delimited table formats
//!
//! The merger only talks to [`TableFormat`]; [`DelimitedFormat`] is the
//! implementation for tab, comma and semicolon separated text.

use crate::error::{Error, Result};
use crate::table::{normalize_column_name, CellValue, Column, Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Field separator of a delimited text file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    #[serde(alias = "tsv", alias = "\t")]
    Tab,
    #[serde(alias = "csv", alias = ",")]
    Comma,
    #[serde(alias = ";")]
    Semicolon,
}

impl Delimiter {
    /// The separator byte
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
            Delimiter::Semicolon => b';',
        }
    }

    /// Short name used on the command line and in batch files
    pub fn name(self) -> &'static str {
        match self {
            Delimiter::Tab => "tab",
            Delimiter::Comma => "comma",
            Delimiter::Semicolon => "semicolon",
        }
    }

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            Delimiter::Tab => "tab",
            Delimiter::Comma => "CSV (comma delimited)",
            Delimiter::Semicolon => "CSV (semicolon delimited)",
        }
    }

    /// The table format reading and writing this delimiter
    pub fn format(self) -> DelimitedFormat {
        DelimitedFormat::new(self)
    }
}

impl FromStr for Delimiter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tab" | "tsv" | "\t" => Ok(Delimiter::Tab),
            "comma" | "csv" | "," => Ok(Delimiter::Comma),
            "semicolon" | ";" => Ok(Delimiter::Semicolon),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Line terminator used when writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// The host platform's line ending
    pub fn native() -> Self {
        if cfg!(windows) {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    fn terminator(self) -> csv::Terminator {
        match self {
            LineEnding::Lf => csv::Terminator::Any(b'\n'),
            LineEnding::CrLf => csv::Terminator::CRLF,
        }
    }
}

/// A file format able to load and write whole tables
pub trait TableFormat {
    /// Human readable name of the format
    fn label(&self) -> &str;

    /// Parse decoded text into a table. `source` is only used for errors
    /// and provenance.
    fn read_table(&self, content: &str, source: &Path) -> Result<Table>;

    /// Write a table, header first
    fn write_table(
        &self,
        writer: &mut dyn Write,
        table: &Table,
        line_ending: LineEnding,
        target: &Path,
    ) -> Result<()>;

    /// Load a table from a file.
    ///
    /// The file is read completely and closed before parsing. Invalid UTF-8
    /// is replaced with U+FFFD and flagged in `Table::lossy_decode`.
    fn load_table(&self, path: &Path) -> Result<Table> {
        let bytes = fs::read(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let content = String::from_utf8_lossy(&bytes);
        let lossy = matches!(content, std::borrow::Cow::Owned(_));

        let mut table = self.read_table(&content, path)?;
        table.lossy_decode = lossy;
        Ok(table)
    }

    /// Write a table to a named file using the platform line ending
    fn save_table(&self, path: &Path, table: &Table) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut writer = BufWriter::new(file);
        self.write_table(&mut writer, table, LineEnding::native(), path)?;
        writer.flush().map_err(|e| Error::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Delimiter-separated text with a header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedFormat {
    delimiter: Delimiter,
}

impl DelimitedFormat {
    /// Create a format for the given delimiter
    pub fn new(delimiter: Delimiter) -> Self {
        Self { delimiter }
    }
}

impl TableFormat for DelimitedFormat {
    fn label(&self) -> &str {
        self.delimiter.label()
    }

    fn read_table(&self, content: &str, source: &Path) -> Result<Table> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter.as_byte())
            .has_headers(true)
            .flexible(false)
            .from_reader(content.as_bytes());

        let headers = csv_reader.headers().map_err(|e| Error::Csv {
            path: source.to_path_buf(),
            source: e,
        })?;

        let columns: Vec<Column> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| Column::new(normalize_column_name(name), i))
            .collect();

        if columns.is_empty() {
            return Err(Error::TableParse {
                path: source.to_path_buf(),
                message: "no header row".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(Error::TableParse {
                    path: source.to_path_buf(),
                    message: format!("duplicate column '{}'", col.name),
                });
            }
        }

        // Rows with a different field count than the header fail here
        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result.map_err(|e| Error::Csv {
                path: source.to_path_buf(),
                source: e,
            })?;
            rows.push(Row::new(record.iter().map(CellValue::parse).collect()));
        }

        let mut table = Table::new(source.to_path_buf());
        table.columns = columns;
        table.rows = rows;
        Ok(table)
    }

    fn write_table(
        &self,
        writer: &mut dyn Write,
        table: &Table,
        line_ending: LineEnding,
        target: &Path,
    ) -> Result<()> {
        let csv_error = |e: csv::Error| Error::CsvWrite {
            path: target.to_path_buf(),
            source: e,
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter.as_byte())
            .terminator(line_ending.terminator())
            .from_writer(writer);

        csv_writer
            .write_record(table.column_names())
            .map_err(csv_error)?;

        for row in &table.rows {
            csv_writer
                .write_record(row.cells.iter().map(|c| c.as_str().unwrap_or_default()))
                .map_err(csv_error)?;
        }

        csv_writer.flush().map_err(|e| Error::OutputWrite {
            path: target.to_path_buf(),
            source: e,
        })
    }
}
