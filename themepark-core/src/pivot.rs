//! Monthly fund pivot decoding
//!
//! The pivot sheet carries one `<prefix><Mon><YY>` column per month (e.g.
//! `bb_Dec25`) plus per-row `Impact` and `FundQuality` scores.
//!
//! Global invariants enforced:
//! - Monthly columns are ordered by calendar, never by input position
//! - Scores are the maximum seen across duplicate rows; blanks never lower them

use crate::error::SourceError;
use crate::normalize::Symbol;
use crate::table::{self, Table};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

pub const SYMBOL_COLUMN: &str = "Symbol";
pub const IMPACT_COLUMN: &str = "Impact";
pub const FUND_QUALITY_COLUMN: &str = "FundQuality";

pub const DEFAULT_VALUE_PREFIX: &str = "bb_";
pub const DEFAULT_WINDOW: usize = 3;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Decoded pivot data for one symbol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PivotRecord {
    /// Most recent monthly values, oldest first
    pub window: Vec<i64>,
    pub impact: Option<i64>,
    pub fund_quality: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PivotData {
    records: HashMap<Symbol, PivotRecord>,
}

impl PivotData {
    pub fn get(&self, symbol: &Symbol) -> Option<&PivotRecord> {
        self.records.get(symbol)
    }

    /// Value window, `None` when the symbol has no surviving values
    pub fn window(&self, symbol: &Symbol) -> Option<&[i64]> {
        self.records
            .get(symbol)
            .map(|r| r.window.as_slice())
            .filter(|w| !w.is_empty())
    }

    /// Impact score, 0 when unknown
    pub fn impact(&self, symbol: &Symbol) -> i64 {
        self.get(symbol).and_then(|r| r.impact).unwrap_or(0)
    }

    /// Fund-quality score, 0 when unknown
    pub fn fund_quality(&self, symbol: &Symbol) -> i64 {
        self.get(symbol).and_then(|r| r.fund_quality).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, symbol: Symbol, record: PivotRecord) {
        self.records.insert(symbol, record);
    }
}

/// Decoding knobs for the pivot sheet
#[derive(Debug, Clone)]
pub struct PivotOptions {
    pub value_prefix: String,
    pub window: usize,
}

impl Default for PivotOptions {
    fn default() -> Self {
        PivotOptions {
            value_prefix: DEFAULT_VALUE_PREFIX.to_string(),
            window: DEFAULT_WINDOW,
        }
    }
}

/// Month number (1-12) for a month name; only the first three letters count
pub fn month_from_abbrev(name: &str) -> Option<u32> {
    let abbrev: String = name.chars().take(3).collect::<String>().to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == abbrev)
        .map(|i| i as u32 + 1)
}

/// Sortable calendar key `year * 12 + month` for a monthly column name.
/// Names that do not parse, including years outside 2 or 4 digits, sort
/// first (key 0).
pub fn column_period_key(column: &str, prefix: &str) -> u32 {
    let Some(rest) = column.strip_prefix(prefix) else {
        return 0;
    };
    let month_part: String = rest.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let year_part: String = rest[month_part.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if month_part.is_empty() || !matches!(year_part.len(), 2 | 4) {
        return 0;
    }
    let Ok(year) = year_part.parse::<u32>() else {
        return 0;
    };
    let year = if year_part.len() == 2 { 2000 + year } else { year };
    let month = month_from_abbrev(&month_part).unwrap_or(0);
    year.checked_mul(12)
        .and_then(|key| key.checked_add(month))
        .unwrap_or(0)
}

/// Monthly value columns as `(index, name)`, oldest first. Ties keep input order.
pub fn chronological_columns<'a>(headers: &'a [String], prefix: &str) -> Vec<(usize, &'a str)> {
    let mut columns: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.starts_with(prefix) && h.as_str() != prefix)
        .map(|(i, h)| (i, h.as_str()))
        .collect();
    columns.sort_by_key(|(_, name)| column_period_key(name, prefix));
    columns
}

fn merge_max(current: Option<i64>, value: Option<i64>) -> Option<i64> {
    match (current, value) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Decode the pivot sheet into per-symbol windows and scores
pub fn decode_pivot(table: &Table, options: &PivotOptions) -> Result<PivotData, SourceError> {
    let symbol_col = table.require_column(SYMBOL_COLUMN)?;
    let impact_col = table.column(IMPACT_COLUMN);
    let quality_col = table.column(FUND_QUALITY_COLUMN);

    let columns = chronological_columns(table.headers(), &options.value_prefix);
    let recent = &columns[columns.len().saturating_sub(options.window)..];
    log::debug!(
        "{}: using value columns {:?}",
        table.name(),
        recent.iter().map(|(_, n)| *n).collect::<Vec<_>>()
    );

    let mut data = PivotData::default();
    for row in table.rows() {
        let Some(symbol) = Symbol::new(&row.get(symbol_col).as_text()) else {
            continue;
        };

        let window: Vec<i64> = recent
            .iter()
            .filter_map(|(idx, _)| row.get(*idx).as_int())
            .collect();
        let impact = row.get_opt(impact_col).as_int();
        let fund_quality = row.get_opt(quality_col).as_int();

        let record = data.records.entry(symbol).or_default();
        if !window.is_empty() {
            record.window = window;
        }
        record.impact = merge_max(record.impact, impact);
        record.fund_quality = merge_max(record.fund_quality, fund_quality);
    }

    Ok(data)
}

/// Read and decode the pivot sheet of a workbook
pub fn load_pivot(path: &Path, sheet: &str, options: &PivotOptions) -> Result<PivotData> {
    let tables = table::read_sheets(path, &[sheet])?;
    let table = tables
        .first()
        .with_context(|| format!("no '{}' sheet read from {}", sheet, path.display()))?;
    decode_pivot(table, options)
        .with_context(|| format!("failed to decode pivot sheet: {}", path.display()))
}
