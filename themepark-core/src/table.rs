//! Header-addressed tables read from CSV files and workbook sheets
//!
//! Every source format is first lowered into a [`Table`] so the decoders see
//! one cell model regardless of where the data came from.

use crate::error::SourceError;
use calamine::{open_workbook_auto, DataType, Reader};
use std::path::Path;

/// A single decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    /// Type a raw delimited-text field: blank → `Empty`, numeric → `Number`
    pub fn from_field(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Number(v),
            _ => Cell::Text(raw.to_string()),
        }
    }

    /// String form used for symbol and label columns. Whole numbers print
    /// without a fractional part so numeric codes match their text form.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => b.to_string(),
        }
    }

    /// Numeric value, or `None` for blanks and non-numeric text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if v.is_finite() => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Integer value truncated toward zero
    pub fn as_int(&self) -> Option<i64> {
        self.as_f64().map(|v| v.trunc() as i64)
    }
}

impl From<&DataType> for Cell {
    fn from(value: &DataType) -> Self {
        match value {
            DataType::Int(i) => Cell::Number(*i as f64),
            DataType::Float(f) => Cell::Number(*f),
            DataType::String(s) if s.trim().is_empty() => Cell::Empty,
            DataType::String(s) => Cell::Text(s.clone()),
            DataType::Bool(b) => Cell::Bool(*b),
            _ => Cell::Empty,
        }
    }
}

/// Rectangular table with a header row
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Table {
            name: name.into(),
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    /// Build a table from string literals; every field is typed via
    /// [`Cell::from_field`]
    pub fn from_strings(name: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        Table::new(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|f| Cell::from_field(f)).collect())
                .collect(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a header (exact match after trimming)
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn require_column(&self, header: &str) -> Result<usize, SourceError> {
        self.column(header).ok_or_else(|| SourceError::MissingColumn {
            table: self.name.clone(),
            column: header.to_string(),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { cells })
    }
}

/// Borrowed view of one data row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    cells: &'a [Cell],
}

const EMPTY: Cell = Cell::Empty;

impl<'a> Row<'a> {
    /// Cell at `idx`; ragged rows read as `Empty` past their end
    pub fn get(&self, idx: usize) -> &'a Cell {
        self.cells.get(idx).unwrap_or(&EMPTY)
    }

    /// Cell for an optional column
    pub fn get_opt(&self, idx: Option<usize>) -> &'a Cell {
        idx.map(|i| self.get(i)).unwrap_or(&EMPTY)
    }
}

/// Read a delimited-text file with a header row
pub fn read_csv(path: &Path) -> Result<Table, SourceError> {
    let csv_err = |source: csv::Error| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SourceError::NoHeader(path.display().to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(Cell::from_field).collect());
    }

    Ok(Table::new(path.display().to_string(), headers, rows))
}

/// Read the named sheets of a workbook, in the order requested
pub fn read_sheets(path: &Path, sheets: &[&str]) -> Result<Vec<Table>, SourceError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| SourceError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tables = Vec::with_capacity(sheets.len());
    let available = workbook.sheet_names();
    for &sheet in sheets {
        if !available.iter().any(|name| name == sheet) {
            return Err(SourceError::MissingSheet {
                path: path.to_path_buf(),
                sheet: sheet.to_string(),
            });
        }
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|source| SourceError::Workbook {
                path: path.to_path_buf(),
                source,
            })?;

        let mut row_iter = range.rows();
        let headers: Vec<String> = match row_iter.next() {
            Some(header_row) => header_row.iter().map(|c| Cell::from(c).as_text()).collect(),
            None => return Err(SourceError::NoHeader(format!("{}#{}", path.display(), sheet))),
        };
        let rows: Vec<Vec<Cell>> = row_iter
            .map(|r| r.iter().map(Cell::from).collect::<Vec<_>>())
            .filter(|r: &Vec<Cell>| r.iter().any(|c| *c != Cell::Empty))
            .collect();

        tables.push(Table::new(format!("{}#{}", path.display(), sheet), headers, rows));
    }

    Ok(tables)
}
