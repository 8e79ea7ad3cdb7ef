use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::encoding::decode_text;
use crate::table::separator::{detect_separator, first_line};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One value of a parsed table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Missing => write!(f, "NaN"),
        }
    }
}

/// How to read a delimited file. `None` fields are detected from the data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// WHATWG encoding label, e.g. `"utf-8"` or `"latin1"`.
    pub encoding: Option<String>,
    /// Field separator byte, e.g. `b';'`.
    pub separator: Option<u8>,
}

impl TableOptions {
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = Some(separator);
        self
    }
}

/// A header row plus data rows of equal width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Rows as `f64`, failing on the first text cell. Missing cells become NaN.
    pub fn to_f64_matrix(&self) -> Result<Vec<Vec<f64>>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .map(|(c, cell)| match cell {
                        Cell::Number(v) => Ok(*v),
                        Cell::Missing => Ok(f64::NAN),
                        Cell::Text(s) => Err(Error::Parse(format!(
                            "row {}, column '{}': '{}' is not a number",
                            r + 1,
                            self.columns[c],
                            s
                        ))),
                    })
                    .collect()
            })
            .collect()
    }

    /// Splits the table into its header list and cell matrix.
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses delimited text with a header row.
///
/// Encoding and separator come from `options` or are detected. A column
/// whose non-empty cells all parse as numbers becomes numeric; otherwise it
/// keeps text. Empty cells are [`Cell::Missing`]. Short rows are padded with
/// missing cells; rows wider than the header are rejected.
pub fn parse_table(bytes: &[u8], options: &TableOptions) -> Result<Table> {
    let text = decode_text(bytes, options.encoding.as_deref())?;
    let separator = options
        .separator
        .unwrap_or_else(|| detect_separator(first_line(&text)));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Parse(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(Error::Parse("table has no header row".into()));
    }

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::Parse(e.to_string()))?;
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        if record.len() > columns.len() {
            return Err(Error::Parse(format!(
                "row {}: {} fields but the header has {}",
                row_idx + 1,
                record.len(),
                columns.len()
            )));
        }
        let mut row: Vec<String> = record.iter().map(|s| s.trim().to_owned()).collect();
        row.resize(columns.len(), String::new());
        raw_rows.push(row);
    }

    let numeric: Vec<bool> = (0..columns.len())
        .map(|c| {
            raw_rows
                .iter()
                .map(|row| row[c].as_str())
                .filter(|s| !s.is_empty())
                .all(|s| s.parse::<f64>().is_ok())
        })
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&numeric)
                .map(|(value, &is_numeric)| to_cell(value, is_numeric))
                .collect()
        })
        .collect();

    Ok(Table { columns, rows })
}

fn to_cell(value: String, numeric: bool) -> Cell {
    if value.is_empty() {
        return Cell::Missing;
    }
    if numeric {
        if let Ok(v) = value.parse::<f64>() {
            return Cell::Number(v);
        }
    }
    Cell::Text(value)
}
