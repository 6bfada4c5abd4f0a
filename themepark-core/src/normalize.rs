//! Symbol and theme-label normalization
//!
//! Global invariants enforced:
//! - Every symbol-keyed lookup or insertion goes through `Symbol::new`
//! - Normalization is idempotent

use serde::{Deserialize, Serialize};
use std::fmt;

/// Theme tokens that are always rendered fully upper-cased
const KEEP_UPPER: &[&str] = &["nbfc", "psu", "mnc", "it", "ai", "ev", "kpi", "fmcg"];

/// Normalized stock identifier (trimmed, upper-cased)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize a raw value into a symbol. Returns `None` when the value is
    /// empty after trimming.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = normalize_symbol(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Symbol(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `uppercase(trim(value))`
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Normalize a theme label: title-case each whitespace-separated token, keeping
/// known acronyms, already upper-cased tokens and tokens with digits as-is.
pub fn normalize_theme(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return s.to_string();
    }

    s.split_whitespace()
        .map(normalize_theme_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_theme_token(tok: &str) -> String {
    if tok.chars().any(|c| c.is_ascii_digit()) {
        return tok.to_string();
    }
    if tok == tok.to_uppercase() {
        return tok.to_string();
    }
    let lower = tok.to_lowercase();
    if KEEP_UPPER.contains(&lower.as_str()) {
        return tok.to_uppercase();
    }

    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Returns false for blank cells and summary rows ("Average Rank", "KPI Rank")
/// that portfolio sheets mix in with holdings.
pub fn is_real_symbol(raw: &str) -> bool {
    let s = raw.trim().to_lowercase();
    if s.is_empty() || s == "nan" {
        return false;
    }
    if s.contains("avg rank") || s.contains("average rank") {
        return false;
    }
    !(s.contains("kpi") && s.contains("rank"))
}
