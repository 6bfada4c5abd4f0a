//! Flat rank tables (`symbol`, `ptile`) for a single period

use crate::error::SourceError;
use crate::normalize::Symbol;
use crate::table::{self, Table};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

pub const SYMBOL_COLUMN: &str = "symbol";
pub const RANK_COLUMN: &str = "ptile";

/// Symbol → rank for one period. A symbol listed with an unparseable rank is
/// kept as listed-without-rank.
#[derive(Debug, Clone, Default)]
pub struct RankTable {
    ranks: HashMap<Symbol, Option<f64>>,
}

impl RankTable {
    /// Rank for `symbol`, `None` when absent or unparseable
    pub fn get(&self, symbol: &Symbol) -> Option<f64> {
        self.ranks.get(symbol).copied().flatten()
    }

    /// Whether the symbol appeared in the table at all
    pub fn is_listed(&self, symbol: &Symbol) -> bool {
        self.ranks.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn insert(&mut self, symbol: Symbol, rank: Option<f64>) {
        self.ranks.insert(symbol, rank);
    }
}

impl FromIterator<(Symbol, f64)> for RankTable {
    fn from_iter<I: IntoIterator<Item = (Symbol, f64)>>(iter: I) -> Self {
        RankTable {
            ranks: iter.into_iter().map(|(s, r)| (s, Some(r))).collect(),
        }
    }
}

/// Decode a rank table. Rows with an empty symbol are skipped; for duplicate
/// symbols the last row wins.
pub fn decode_rank_table(table: &Table) -> Result<RankTable, SourceError> {
    let symbol_col = table.require_column(SYMBOL_COLUMN)?;
    let rank_col = table.require_column(RANK_COLUMN)?;

    let mut ranks = RankTable::default();
    let mut skipped = 0usize;
    for row in table.rows() {
        let Some(symbol) = Symbol::new(&row.get(symbol_col).as_text()) else {
            skipped += 1;
            continue;
        };
        ranks.insert(symbol, row.get(rank_col).as_f64());
    }

    if skipped > 0 {
        log::debug!("{}: skipped {} row(s) without a symbol", table.name(), skipped);
    }
    Ok(ranks)
}

/// Read and decode a rank CSV
pub fn load_rank_table(path: &Path) -> Result<RankTable> {
    let table = table::read_csv(path)?;
    decode_rank_table(&table)
        .with_context(|| format!("failed to decode rank table: {}", path.display()))
}
