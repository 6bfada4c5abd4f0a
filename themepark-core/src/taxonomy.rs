//! Theme taxonomy: theme → member symbols, plus the portfolio symbol set
//!
//! Global invariants enforced:
//! - Built once, immutable afterwards (shared behind `Arc`)
//! - A (symbol, theme) pair is recorded once; a symbol may sit in several themes
//! - Every portfolio symbol belongs to at least one theme after reconciliation,
//!   and the catch-all only takes symbols no codex theme lists
//! - Theme iteration order is lexicographic

use crate::error::SourceError;
use crate::normalize::{is_real_symbol, normalize_theme, Symbol};
use crate::table::{self, Table};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Catch-all theme for portfolio holdings missing from the codex
pub const OTHER_PORTFOLIO_THEME: &str = "Other Portfolio Holdings";

const CODEX_SYMBOL_COLUMN: &str = "Symbol";
const CODEX_THEME_COLUMN: &str = "Theme";
const PORTFOLIO_SYMBOL_COLUMNS: [&str; 2] = ["Symbol / Rank", "Symbol"];

/// One validated codex row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexEntry {
    pub symbol: Symbol,
    pub theme: String,
}

impl CodexEntry {
    /// Returns `None` when either field is empty after normalization
    pub fn new(symbol: &str, theme: &str) -> Option<Self> {
        let symbol = Symbol::new(symbol)?;
        let theme = normalize_theme(theme);
        if theme.is_empty() {
            return None;
        }
        Some(CodexEntry { symbol, theme })
    }
}

/// Which themes a run displays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeFilter {
    #[default]
    All,
    /// Themes with at least one portfolio member
    Portfolio,
    /// An explicit list of theme names
    Custom(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    membership: BTreeMap<String, Vec<Symbol>>,
    themes_of: HashMap<Symbol, BTreeSet<String>>,
    portfolio: BTreeSet<Symbol>,
    reconciled: Vec<Symbol>,
}

impl Taxonomy {
    /// Group codex entries by theme and reconcile untracked portfolio symbols
    /// into [`OTHER_PORTFOLIO_THEME`].
    pub fn build(
        codex: impl IntoIterator<Item = CodexEntry>,
        portfolio: impl IntoIterator<Item = Symbol>,
    ) -> Self {
        let mut taxonomy = Taxonomy::default();

        let mut secondary = 0usize;
        for entry in codex {
            let themes = taxonomy.themes_of.entry(entry.symbol.clone()).or_default();
            if !themes.insert(entry.theme.clone()) {
                continue;
            }
            if themes.len() > 1 {
                secondary += 1;
                log::debug!("{} also listed under '{}'", entry.symbol, entry.theme);
            }
            taxonomy
                .membership
                .entry(entry.theme)
                .or_default()
                .push(entry.symbol);
        }
        if secondary > 0 {
            log::info!("{} secondary theme membership(s) in the codex", secondary);
        }

        for symbol in portfolio {
            if !taxonomy.portfolio.insert(symbol.clone()) {
                continue;
            }
            if !taxonomy.themes_of.contains_key(&symbol) {
                taxonomy.reconciled.push(symbol.clone());
                taxonomy
                    .membership
                    .entry(OTHER_PORTFOLIO_THEME.to_string())
                    .or_default()
                    .push(symbol.clone());
                taxonomy
                    .themes_of
                    .insert(symbol, BTreeSet::from([OTHER_PORTFOLIO_THEME.to_string()]));
            }
        }

        if !taxonomy.reconciled.is_empty() {
            log::info!(
                "{} portfolio symbol(s) not in the codex, added to '{}'",
                taxonomy.reconciled.len(),
                OTHER_PORTFOLIO_THEME
            );
        }

        taxonomy
    }

    /// All theme names, lexicographically ascending
    pub fn themes(&self) -> impl Iterator<Item = &str> {
        self.membership.keys().map(String::as_str)
    }

    pub fn theme_count(&self) -> usize {
        self.membership.len()
    }

    /// Members of a theme in codex order
    pub fn members(&self, theme: &str) -> &[Symbol] {
        self.membership
            .get(theme)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Themes listing `symbol`, lexicographically ascending
    pub fn themes_of(&self, symbol: &Symbol) -> Vec<&str> {
        self.themes_of
            .get(symbol)
            .map(|themes| themes.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_portfolio(&self, symbol: &Symbol) -> bool {
        self.portfolio.contains(symbol)
    }

    pub fn portfolio(&self) -> &BTreeSet<Symbol> {
        &self.portfolio
    }

    /// Portfolio symbols that were placed in the catch-all theme
    pub fn reconciled(&self) -> &[Symbol] {
        &self.reconciled
    }

    /// Themes passing `filter`, in lexicographic order
    pub fn select(&self, filter: &ThemeFilter) -> Vec<&str> {
        match filter {
            ThemeFilter::All => self.themes().collect(),
            ThemeFilter::Portfolio => self
                .themes()
                .filter(|t| self.members(t).iter().any(|s| self.is_portfolio(s)))
                .collect(),
            ThemeFilter::Custom(names) => {
                let wanted: BTreeSet<String> = names.iter().map(|n| normalize_theme(n)).collect();
                for name in wanted.iter().filter(|n| !self.membership.contains_key(*n)) {
                    log::warn!("requested theme '{}' is not in the taxonomy", name);
                }
                self.themes().filter(|t| wanted.contains(*t)).collect()
            }
        }
    }
}

/// Decode the codex sheet (`Symbol`, `Theme`). Rows with an empty symbol or
/// theme are skipped.
pub fn decode_codex(table: &Table) -> Result<Vec<CodexEntry>, SourceError> {
    let symbol_col = table.require_column(CODEX_SYMBOL_COLUMN)?;
    let theme_col = table.require_column(CODEX_THEME_COLUMN)?;

    Ok(table
        .rows()
        .filter_map(|row| {
            CodexEntry::new(&row.get(symbol_col).as_text(), &row.get(theme_col).as_text())
        })
        .collect())
}

/// Decode the portfolio sheet. The symbol is read from `Symbol / Rank`,
/// falling back per row to `Symbol`; summary rows are rejected.
pub fn decode_portfolio(table: &Table) -> Result<Vec<Symbol>, SourceError> {
    let columns: Vec<usize> = PORTFOLIO_SYMBOL_COLUMNS
        .iter()
        .filter_map(|c| table.column(c))
        .collect();
    if columns.is_empty() {
        return Err(SourceError::MissingColumn {
            table: table.name().to_string(),
            column: PORTFOLIO_SYMBOL_COLUMNS.join("' or '"),
        });
    }

    Ok(table
        .rows()
        .filter_map(|row| {
            columns
                .iter()
                .map(|&c| row.get(c).as_text())
                .find(|v| !v.trim().is_empty())
        })
        .filter(|v| is_real_symbol(v))
        .filter_map(|v| Symbol::new(&v))
        .collect())
}

/// Load the taxonomy workbook (codex sheet + portfolio sheet)
pub fn load_taxonomy(path: &Path, codex_sheet: &str, portfolio_sheet: &str) -> Result<Taxonomy> {
    let tables = table::read_sheets(path, &[codex_sheet, portfolio_sheet])?;
    let (codex_table, portfolio_table) = match tables.as_slice() {
        [codex, portfolio] => (codex, portfolio),
        _ => anyhow::bail!("expected 2 sheets from {}", path.display()),
    };

    let codex = decode_codex(codex_table)
        .with_context(|| format!("failed to decode theme codex in {}", path.display()))?;
    let portfolio = decode_portfolio(portfolio_table)
        .with_context(|| format!("failed to decode portfolio in {}", path.display()))?;

    let taxonomy = Taxonomy::build(codex, portfolio);
    log::info!(
        "loaded taxonomy: {} themes, {} portfolio symbols",
        taxonomy.theme_count(),
        taxonomy.portfolio().len()
    );
    Ok(taxonomy)
}
