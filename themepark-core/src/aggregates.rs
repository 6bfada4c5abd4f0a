//! Per-theme rank aggregation
//!
//! Computes median ranks, per-symbol rank deltas and member ordering for each
//! theme. Rows are typed data; nothing here formats HTML.
//!
//! Global invariants enforced:
//! - Aggregates are strictly derived (recomputed per run, never stored)
//! - Only members with a current rank are listed
//! - Member order is ascending by current rank, stable for ties
//! - Row order is ascending by rounded median, unranked themes last

use crate::normalize::Symbol;
use crate::pivot::PivotData;
use crate::rank::RankTable;
use crate::taxonomy::Taxonomy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort key for themes without any ranked member
pub const MISSING_RANK_SENTINEL: i64 = 999;

/// Score both Impact and FundQuality must equal for a member to be notable
pub const DEFAULT_HIGHLIGHT_SCORE: i64 = 2;

/// Rank movement versus the prior period. Lower ranks are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "direction", content = "by")]
pub enum RankDelta {
    Improved(i64),
    Worsened(i64),
    Flat,
    /// No prior rank to compare against
    Unknown,
}

impl RankDelta {
    /// `round(current) - round(prior)`, negative meaning improved
    pub fn between(current: f64, prior: f64) -> Self {
        let delta = round_half_up(current) - round_half_up(prior);
        match delta.signum() {
            -1 => RankDelta::Improved(-delta),
            1 => RankDelta::Worsened(delta),
            _ => RankDelta::Flat,
        }
    }
}

impl fmt::Display for RankDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankDelta::Improved(n) => write!(f, "(▲{})", n),
            RankDelta::Worsened(n) => write!(f, "(▼{})", n),
            RankDelta::Flat => write!(f, "(0)"),
            RankDelta::Unknown => write!(f, "(?)"),
        }
    }
}

/// How a member without a prior-period rank is annotated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPrior {
    /// Show as improved by zero. This is a display convention carried over
    /// from the published dashboard, not a computed delta.
    #[default]
    ImprovedZero,
    /// Show an explicit unknown marker
    Unknown,
}

impl MissingPrior {
    fn delta(self) -> RankDelta {
        match self {
            MissingPrior::ImprovedZero => RankDelta::Improved(0),
            MissingPrior::Unknown => RankDelta::Unknown,
        }
    }
}

/// One ranked theme member
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RankEntry {
    pub symbol: Symbol,
    pub rank: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior: Option<f64>,
    pub delta: RankDelta,
    pub notable: bool,
}

impl RankEntry {
    pub fn rounded_rank(&self) -> i64 {
        round_half_up(self.rank)
    }

    /// `SYMBOL RANK (delta)`, e.g. `HDFCBANK 10 (▲5)`
    pub fn label(&self) -> String {
        format!("{} {} {}", self.symbol, self.rounded_rank(), self.delta)
    }
}

/// Theme members, either split by portfolio membership or combined
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "layout")]
pub enum Members<T> {
    Separated { portfolio: Vec<T>, others: Vec<T> },
    Combined { all: Vec<T> },
}

impl<T> Members<T> {
    fn empty(separate_portfolio: bool) -> Self {
        if separate_portfolio {
            Members::Separated {
                portfolio: Vec::new(),
                others: Vec::new(),
            }
        } else {
            Members::Combined { all: Vec::new() }
        }
    }

    fn push(&mut self, in_portfolio: bool, item: T) {
        match self {
            Members::Separated { portfolio, .. } if in_portfolio => portfolio.push(item),
            Members::Separated { others, .. } => others.push(item),
            Members::Combined { all } => all.push(item),
        }
    }

    /// Every member across buckets, portfolio bucket first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (first, second): (&[T], &[T]) = match self {
            Members::Separated { portfolio, others } => (portfolio.as_slice(), others.as_slice()),
            Members::Combined { all } => (all.as_slice(), &[][..]),
        };
        first.iter().chain(second.iter())
    }

    pub fn is_separated(&self) -> bool {
        matches!(self, Members::Separated { .. })
    }

    /// Map each bucket, preserving bucket layout and order
    pub fn map<U>(&self, f: impl Fn(&T) -> Option<U>) -> Members<U> {
        match self {
            Members::Separated { portfolio, others } => Members::Separated {
                portfolio: portfolio.iter().filter_map(&f).collect(),
                others: others.iter().filter_map(&f).collect(),
            },
            Members::Combined { all } => Members::Combined {
                all: all.iter().filter_map(&f).collect(),
            },
        }
    }
}

/// Aggregated rank view of one theme
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ThemeRow {
    pub theme: String,
    pub median_current: Option<f64>,
    pub median_prior: Option<f64>,
    /// Present only when both medians are
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_delta: Option<RankDelta>,
    /// Members with a current rank
    pub ranked_count: usize,
    pub members: Members<RankEntry>,
}

impl ThemeRow {
    /// Row ordering key: rounded current median, or the sentinel
    pub fn sort_key(&self) -> i64 {
        self.median_current
            .map(round_half_up)
            .unwrap_or(MISSING_RANK_SENTINEL)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub separate_portfolio: bool,
    pub highlight: bool,
    pub highlight_score: i64,
    pub missing_prior: MissingPrior,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions {
            separate_portfolio: true,
            highlight: true,
            highlight_score: DEFAULT_HIGHLIGHT_SCORE,
            missing_prior: MissingPrior::default(),
        }
    }
}

/// Round half up (`floor(x + 0.5)`), so 2.5 → 3 and -2.5 → -2
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Median of the values; mean of the two middle values for even counts.
/// Empty input yields `None`.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// A member is notable when both scores equal the highlight score
pub fn is_notable(impact: i64, fund_quality: i64, highlight_score: i64) -> bool {
    impact == highlight_score && fund_quality == highlight_score
}

/// Build one row per theme in `themes`, sorted by median rank
pub fn aggregate_themes(
    taxonomy: &Taxonomy,
    themes: &[&str],
    current: &RankTable,
    prior: &RankTable,
    pivot: &PivotData,
    options: &AggregateOptions,
) -> Vec<ThemeRow> {
    let mut rows: Vec<ThemeRow> = themes
        .iter()
        .map(|theme| aggregate_theme(taxonomy, theme, current, prior, pivot, options))
        .collect();

    rows.sort_by_key(ThemeRow::sort_key);
    rows
}

fn aggregate_theme(
    taxonomy: &Taxonomy,
    theme: &str,
    current: &RankTable,
    prior: &RankTable,
    pivot: &PivotData,
    options: &AggregateOptions,
) -> ThemeRow {
    let symbols = taxonomy.members(theme);

    let current_ranks: Vec<f64> = symbols.iter().filter_map(|s| current.get(s)).collect();
    let prior_ranks: Vec<f64> = symbols.iter().filter_map(|s| prior.get(s)).collect();
    let median_current = median(&current_ranks);
    let median_prior = median(&prior_ranks);
    let median_delta = match (median_current, median_prior) {
        (Some(c), Some(p)) => Some(RankDelta::between(c, p)),
        _ => None,
    };

    let mut ranked: Vec<(&Symbol, f64)> = symbols
        .iter()
        .filter_map(|s| current.get(s).map(|r| (s, r)))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut members = Members::empty(options.separate_portfolio);
    for (symbol, rank) in &ranked {
        let prior_rank = prior.get(symbol);
        let delta = match prior_rank {
            Some(p) => RankDelta::between(*rank, p),
            None => options.missing_prior.delta(),
        };
        let notable = options.highlight
            && is_notable(
                pivot.impact(symbol),
                pivot.fund_quality(symbol),
                options.highlight_score,
            );

        members.push(
            taxonomy.is_portfolio(symbol),
            RankEntry {
                symbol: (*symbol).clone(),
                rank: *rank,
                prior: prior_rank,
                delta,
                notable,
            },
        );
    }

    ThemeRow {
        theme: theme.to_string(),
        median_current,
        median_prior,
        median_delta,
        ranked_count: ranked.len(),
        members,
    }
}
