//! Text and JSON output for a composed dashboard
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs

use crate::aggregates::{round_half_up, Members, RankEntry, ThemeRow};
use crate::compose::{ComposedRow, FundEntry};
use crate::dashboard::Dashboard;

/// Median cell text: rounded median plus delta, empty without a current median
pub fn median_label(row: &ThemeRow) -> String {
    match (row.median_current, row.median_delta) {
        (Some(m), Some(delta)) => format!("{} {}", round_half_up(m), delta),
        (Some(m), None) => round_half_up(m).to_string(),
        (None, _) => String::new(),
    }
}

fn bucket_lines<T>(items: &[T], label: impl Fn(&T) -> String) -> Vec<String> {
    items.iter().map(label).collect()
}

/// Rank and fund lines per bucket, as `(bucket name, ranks, funds)`
pub fn bucket_labels(row: &ComposedRow) -> Vec<(&'static str, Vec<String>, Vec<String>)> {
    let marked_rank = |e: &RankEntry| mark(e.label(), e.notable);
    let marked_fund = |f: &FundEntry| mark(f.label(), f.notable);

    match (&row.ranks.members, &row.funds) {
        (
            Members::Separated { portfolio, others },
            Members::Separated {
                portfolio: pf_funds,
                others: other_funds,
            },
        ) => vec![
            (
                "Portfolio",
                bucket_lines(portfolio, marked_rank),
                bucket_lines(pf_funds, marked_fund),
            ),
            (
                "Others",
                bucket_lines(others, marked_rank),
                bucket_lines(other_funds, marked_fund),
            ),
        ],
        (Members::Combined { all }, Members::Combined { all: funds }) => vec![(
            "All Stocks",
            bucket_lines(all, marked_rank),
            bucket_lines(funds, marked_fund),
        )],
        // compose() maps buckets one to one; mixed layouts cannot occur
        _ => Vec::new(),
    }
}

fn mark(label: String, notable: bool) -> String {
    if notable {
        format!("{} *", label)
    } else {
        label
    }
}

/// Render the dashboard as plain text
pub fn render_text(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Combined View: Ranks + MF Fund Signals - As of {}\n",
        dashboard.as_of
    ));
    output.push_str(&format!(
        "Prior: {}  Pivot: {}\n",
        dashboard.prior.as_deref().unwrap_or("none"),
        dashboard.pivot
    ));

    if !dashboard.missing_portfolio.is_empty() {
        let missing: Vec<&str> = dashboard
            .missing_portfolio
            .iter()
            .map(|s| s.as_str())
            .collect();
        output.push_str(&format!(
            "WARNING: {} portfolio symbol(s) missing: {}\n",
            missing.len(),
            missing.join(", ")
        ));
    }

    if dashboard.rows.is_empty() {
        output.push_str("\nNo data\n");
        return output;
    }

    for row in &dashboard.rows {
        output.push_str(&format!(
            "\n{:<40} {}\n",
            truncate_or_pad(&row.ranks.theme, 40),
            median_label(&row.ranks)
        ));
        for (bucket, ranks, funds) in bucket_labels(row) {
            if ranks.is_empty() && funds.is_empty() {
                continue;
            }
            output.push_str(&format!("  {}\n", bucket));
            if !ranks.is_empty() {
                output.push_str(&format!("    Rank:  {}\n", ranks.join(", ")));
            }
            if !funds.is_empty() {
                output.push_str(&format!("    Funds: {}\n", funds.join(", ")));
            }
        }
    }

    output
}

/// Render the dashboard as JSON
pub fn render_json(dashboard: &Dashboard) -> String {
    serde_json::to_string_pretty(dashboard).unwrap_or_else(|_| "{}".to_string())
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
