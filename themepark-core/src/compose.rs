//! Joins aggregated rank rows with pivot fund windows
//!
//! Global invariants enforced:
//! - Fund entries follow the rank column's member order
//! - Members without a fund window are omitted, never padded
//! - Theme order is exactly the aggregator's

use crate::aggregates::{Members, RankEntry, ThemeRow};
use crate::normalize::Symbol;
use crate::pivot::PivotData;
use crate::rank::RankTable;
use crate::taxonomy::Taxonomy;
use serde::Serialize;
use std::collections::HashSet;

/// Monthly fund signal window for one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundEntry {
    pub symbol: Symbol,
    pub values: Vec<i64>,
    pub notable: bool,
}

impl FundEntry {
    /// `SYMBOL (v1, v2, v3)`
    pub fn label(&self) -> String {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        format!("{} ({})", self.symbol, values.join(", "))
    }
}

/// One display row: rank view plus the matching fund view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedRow {
    #[serde(flatten)]
    pub ranks: ThemeRow,
    pub funds: Members<FundEntry>,
}

impl ComposedRow {
    pub fn theme(&self) -> &str {
        &self.ranks.theme
    }
}

fn fund_entry(entry: &RankEntry, pivot: &PivotData) -> Option<FundEntry> {
    pivot.window(&entry.symbol).map(|values| FundEntry {
        symbol: entry.symbol.clone(),
        values: values.to_vec(),
        notable: entry.notable,
    })
}

/// Attach fund windows to each aggregated row
pub fn compose(rows: Vec<ThemeRow>, pivot: &PivotData) -> Vec<ComposedRow> {
    rows.into_iter()
        .map(|ranks| {
            let funds = ranks.members.map(|entry| fund_entry(entry, pivot));
            ComposedRow { ranks, funds }
        })
        .collect()
}

/// Portfolio symbols with a current rank that no composed row lists, sorted
pub fn missing_portfolio_symbols(
    rows: &[ComposedRow],
    taxonomy: &Taxonomy,
    current: &RankTable,
) -> Vec<Symbol> {
    let displayed: HashSet<&Symbol> = rows
        .iter()
        .flat_map(|row| row.ranks.members.iter())
        .map(|entry| &entry.symbol)
        .collect();

    // BTreeSet iteration keeps the result sorted
    taxonomy
        .portfolio()
        .iter()
        .filter(|s| current.get(s).is_some() && !displayed.contains(s))
        .cloned()
        .collect()
}
