//! HTML report generation
//!
//! Generates a self-contained HTML page with embedded CSS. The page needs no
//! scripts and works offline.

use crate::aggregates::{round_half_up, Members, RankDelta, RankEntry, ThemeRow};
use crate::compose::{ComposedRow, FundEntry};
use crate::dashboard::Dashboard;

const HIGHLIGHT_STYLE: &str =
    "background-color:#FFD700;padding:2px 4px;border-radius:3px;font-weight:700;";

/// Render a dashboard as a standalone HTML page
pub fn render_html_dashboard(dashboard: &Dashboard) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Theme Park - {as_of}</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        {header}
        {missing}
        {table}
        {footer}
    </div>
</body>
</html>"#,
        as_of = html_escape(&dashboard.as_of),
        css = inline_css(),
        header = render_header(dashboard),
        missing = render_missing_symbols(dashboard),
        table = render_table(dashboard),
        footer = render_footer(),
    )
}

fn inline_css() -> &'static str {
    r#"
* {
    box-sizing: border-box;
    margin: 0;
    padding: 0;
}

body {
    font-family: system-ui, -apple-system, 'Segoe UI', sans-serif;
    line-height: 1.35;
    color: #222;
    background: #ffffff;
}

.container {
    max-width: 1600px;
    margin: 0 auto;
    padding: 1.5rem;
}

header {
    margin-bottom: 1rem;
    padding-bottom: 0.75rem;
    border-bottom: 2px solid #e5e7eb;
}

header h1 {
    font-size: 1.75rem;
    font-weight: 700;
}

header .meta {
    color: #6b7280;
    font-size: 0.875rem;
}

.caption {
    margin: 4px 0 8px 0;
    color: #666;
    font-size: 12px;
}

.alert {
    margin-bottom: 1rem;
    padding: 0.75rem 1rem;
    border-radius: 0.375rem;
    border-left: 4px solid #dc3545;
    background: #fdecea;
    color: #842029;
}

.alert .symbol {
    display: inline-block;
    margin: 0 8px 4px 0;
    font-family: ui-monospace, monospace;
}

.tp-table {
    width: 100%;
    table-layout: fixed;
    border-collapse: collapse;
    font-size: 13px;
}

.tp-table th {
    text-align: left;
    padding: 8px 10px;
    border-bottom: 1px solid #e6e6e6;
    font-weight: 600;
    color: #333;
    background: #f9fafb;
}

.tp-table th.sub-header {
    font-weight: 500;
    color: #6b7280;
}

.tp-table td {
    vertical-align: top;
    padding: 8px 10px;
    border-bottom: 1px solid #f0f0f0;
}

.tp-table tbody tr:nth-child(odd) {
    background: #ffffff;
}

.tp-table tbody tr:nth-child(even) {
    background: #fafafa;
}

.tp-table .col-theme {
    font-weight: 500;
}

.tp-table .col-median {
    text-align: right;
    white-space: nowrap;
}

.tp-table .col-list,
.tp-table .col-bb {
    white-space: normal;
    word-break: break-word;
}

.delta-up { color: #28a745; font-weight: 700; }
.delta-down { color: #dc3545; font-weight: 700; }
.delta-flat { color: #6c757d; font-weight: 600; }
.delta-unk { color: #6c757d; font-weight: 400; }

footer {
    margin-top: 2rem;
    color: #9ca3af;
    font-size: 0.75rem;
    text-align: center;
}
"#
}

fn render_header(dashboard: &Dashboard) -> String {
    format!(
        r#"<header>
    <h1>Theme Park</h1>
    <div class="meta">
        <span>Current: <strong>{current}</strong></span> •
        <span>Prior: <strong>{prior}</strong></span> •
        <span>Pivot: <strong>{pivot}</strong></span>
    </div>
</header>"#,
        current = html_escape(&dashboard.as_of),
        prior = html_escape(dashboard.prior.as_deref().unwrap_or("none")),
        pivot = html_escape(&dashboard.pivot),
    )
}

/// Warning banner for ranked portfolio symbols absent from every row
fn render_missing_symbols(dashboard: &Dashboard) -> String {
    if dashboard.missing_portfolio.is_empty() {
        return String::new();
    }
    let symbols: String = dashboard
        .missing_portfolio
        .iter()
        .map(|s| format!(r#"<span class="symbol">{}</span>"#, html_escape(s.as_str())))
        .collect();

    format!(
        r#"<div class="alert">
    <strong>Missing portfolio symbols ({count}):</strong> ranked this period but not shown in any theme.
    <div>{symbols}</div>
</div>"#,
        count = dashboard.missing_portfolio.len(),
        symbols = symbols,
    )
}

fn delta_class(delta: RankDelta) -> &'static str {
    match delta {
        RankDelta::Improved(_) => "delta-up",
        RankDelta::Worsened(_) => "delta-down",
        RankDelta::Flat => "delta-flat",
        RankDelta::Unknown => "delta-unk",
    }
}

fn delta_span(delta: RankDelta) -> String {
    format!(r#"<span class="{}">{}</span>"#, delta_class(delta), delta)
}

fn highlight(content: String, notable: bool) -> String {
    if notable {
        format!(r#"<span style="{}">{}</span>"#, HIGHLIGHT_STYLE, content)
    } else {
        content
    }
}

fn rank_cell(entries: &[RankEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let text = format!(
                "{} {} {}",
                html_escape(e.symbol.as_str()),
                e.rounded_rank(),
                delta_span(e.delta)
            );
            highlight(text, e.notable)
        })
        .collect::<Vec<_>>()
        .join("<br/>")
}

fn fund_cell(entries: &[FundEntry]) -> String {
    entries
        .iter()
        .map(|f| highlight(html_escape(&f.label()), f.notable))
        .collect::<Vec<_>>()
        .join("<br/>")
}

fn median_cell(row: &ThemeRow) -> String {
    match (row.median_current, row.median_delta) {
        (Some(m), Some(delta)) => format!("{} {}", round_half_up(m), delta_span(delta)),
        (Some(m), None) => round_half_up(m).to_string(),
        (None, _) => String::new(),
    }
}

fn render_row(row: &ComposedRow) -> String {
    let mut cells = vec![
        format!(r#"<td class="col-theme">{}</td>"#, html_escape(row.theme())),
        format!(r#"<td class="col-median">{}</td>"#, median_cell(&row.ranks)),
    ];

    let buckets: Vec<(&[RankEntry], &[FundEntry])> = match (&row.ranks.members, &row.funds) {
        (
            Members::Separated { portfolio, others },
            Members::Separated {
                portfolio: pf_funds,
                others: other_funds,
            },
        ) => vec![
            (portfolio.as_slice(), pf_funds.as_slice()),
            (others.as_slice(), other_funds.as_slice()),
        ],
        (Members::Combined { all }, Members::Combined { all: funds }) => {
            vec![(all.as_slice(), funds.as_slice())]
        }
        _ => Vec::new(),
    };
    for (ranks, funds) in buckets {
        cells.push(format!(r#"<td class="col-list">{}</td>"#, rank_cell(ranks)));
        cells.push(format!(r#"<td class="col-bb">{}</td>"#, fund_cell(funds)));
    }

    format!("<tr>{}</tr>", cells.join(""))
}

fn table_head(separate_portfolio: bool) -> &'static str {
    if separate_portfolio {
        r#"<colgroup>
        <col style="width:10%">
        <col style="width:6%">
        <col style="width:21%">
        <col style="width:21%">
        <col style="width:21%">
        <col style="width:21%">
    </colgroup>
    <thead>
        <tr>
            <th rowspan="2">Theme</th>
            <th rowspan="2">Median<br/>(Rank Δ)</th>
            <th colspan="2">Portfolio</th>
            <th colspan="2">Others</th>
        </tr>
        <tr>
            <th class="sub-header">Rank</th>
            <th class="sub-header">Funds</th>
            <th class="sub-header">Rank</th>
            <th class="sub-header">Funds</th>
        </tr>
    </thead>"#
    } else {
        r#"<colgroup>
        <col style="width:16%">
        <col style="width:8%">
        <col style="width:38%">
        <col style="width:38%">
    </colgroup>
    <thead>
        <tr>
            <th rowspan="2">Theme</th>
            <th rowspan="2">Median<br/>(Rank Δ)</th>
            <th colspan="2">All Stocks</th>
        </tr>
        <tr>
            <th class="sub-header">Rank</th>
            <th class="sub-header">Funds</th>
        </tr>
    </thead>"#
    }
}

fn render_table(dashboard: &Dashboard) -> String {
    if dashboard.rows.is_empty() {
        return "<div>No data</div>".to_string();
    }

    let rows: String = dashboard.rows.iter().map(render_row).collect();

    format!(
        r#"<div class="caption">Combined View: Ranks + MF Fund Signals - As of {as_of}</div>
<table class="tp-table">
    {head}
    <tbody>{rows}</tbody>
</table>"#,
        as_of = html_escape(&dashboard.as_of),
        head = table_head(dashboard.separate_portfolio),
        rows = rows,
    )
}

fn render_footer() -> String {
    r#"<footer>
    <p>Generated by Theme Park</p>
</footer>"#
        .to_string()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Symbol;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn entry(symbol: &str, rank: f64, delta: RankDelta, notable: bool) -> RankEntry {
        RankEntry {
            symbol: sym(symbol),
            rank,
            prior: None,
            delta,
            notable,
        }
    }

    fn dashboard(separate: bool, members: Members<RankEntry>, funds: Members<FundEntry>) -> Dashboard {
        Dashboard {
            as_of: "2025-03-10".to_string(),
            prior: None,
            pivot: "2025-02".to_string(),
            separate_portfolio: separate,
            rows: vec![ComposedRow {
                ranks: ThemeRow {
                    theme: "M&A Plays".to_string(),
                    median_current: Some(15.0),
                    median_prior: Some(18.0),
                    median_delta: Some(RankDelta::Improved(3)),
                    ranked_count: 2,
                    members,
                },
                funds,
            }],
            missing_portfolio: vec![],
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_separated_layout() {
        let d = dashboard(
            true,
            Members::Separated {
                portfolio: vec![entry("A", 10.0, RankDelta::Improved(5), true)],
                others: vec![entry("B", 20.0, RankDelta::Worsened(2), false)],
            },
            Members::Separated {
                portfolio: vec![FundEntry {
                    symbol: sym("A"),
                    values: vec![2, 2, 1],
                    notable: true,
                }],
                others: vec![],
            },
        );
        let html = render_html_dashboard(&d);

        assert!(html.contains(r#"<th colspan="2">Portfolio</th>"#));
        assert!(html.contains(r#"<th colspan="2">Others</th>"#));
        assert!(html.contains("M&amp;A Plays"));
        assert!(html.contains(r#"15 <span class="delta-up">(▲3)</span>"#));
        assert!(html.contains(&format!(
            r#"<span style="{}">A 10 <span class="delta-up">(▲5)</span></span>"#,
            HIGHLIGHT_STYLE
        )));
        assert!(html.contains(r#"B 20 <span class="delta-down">(▼2)</span>"#));
        assert!(html.contains(&format!(r#"<span style="{}">A (2, 2, 1)</span>"#, HIGHLIGHT_STYLE)));
        assert!(html.contains("Combined View: Ranks + MF Fund Signals - As of 2025-03-10"));
        assert!(!html.contains(r#"class="alert""#));
    }

    #[test]
    fn test_combined_layout_joins_with_breaks() {
        let d = dashboard(
            false,
            Members::Combined {
                all: vec![
                    entry("A", 10.0, RankDelta::Flat, false),
                    entry("B", 20.0, RankDelta::Unknown, false),
                ],
            },
            Members::Combined { all: vec![] },
        );
        let html = render_html_dashboard(&d);

        assert!(html.contains(r#"<th colspan="2">All Stocks</th>"#));
        assert!(!html.contains(r#"<th colspan="2">Portfolio</th>"#));
        assert!(html.contains(
            r#"A 10 <span class="delta-flat">(0)</span><br/>B 20 <span class="delta-unk">(?)</span>"#
        ));
    }

    #[test]
    fn test_missing_symbols_banner() {
        let mut d = dashboard(
            true,
            Members::Separated {
                portfolio: vec![],
                others: vec![],
            },
            Members::Separated {
                portfolio: vec![],
                others: vec![],
            },
        );
        d.missing_portfolio = vec![sym("ZEN"), sym("ZOMATO")];
        let html = render_html_dashboard(&d);
        assert!(html.contains("Missing portfolio symbols (2)"));
        assert!(html.contains(r#"<span class="symbol">ZOMATO</span>"#));
    }

    #[test]
    fn test_empty_dashboard() {
        let mut d = dashboard(true, Members::Combined { all: vec![] }, Members::Combined { all: vec![] });
        d.rows.clear();
        assert!(render_html_dashboard(&d).contains("<div>No data</div>"));
    }
}
