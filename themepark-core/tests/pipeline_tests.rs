//! Integration tests for the dashboard pipeline
//!
//! The fixture workbooks (`data/PF_Ranks.xlsx`, `data/final/Feb25_pivot_features.xlsx`)
//! have CSV exports of the same sheets under `sheets/`. Most tests compose from
//! the exports; the `render_dashboard` tests read the workbooks and check the
//! two paths agree. The manifest's Jan25 pivot is deliberately absent.

use std::path::PathBuf;
use themepark_core::aggregates::{Members, RankDelta};
use themepark_core::dashboard::{
    compose_dashboard, load_manifest_taxonomy, resolve_selection, PeriodLabels, RunSources,
};
use themepark_core::manifest::{generate_manifest, load_manifest, LoadedManifest};
use themepark_core::pivot::{decode_pivot, PivotData, PivotOptions};
use themepark_core::rank::load_rank_table;
use themepark_core::table::read_csv;
use themepark_core::taxonomy::{decode_codex, decode_portfolio, OTHER_PORTFOLIO_THEME};
use themepark_core::{
    html, render_dashboard, render_json, render_text, Dashboard, RenderSession, ResolvedConfig,
    SelectionRequest, Symbol, Taxonomy, ThemeFilter,
};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join("dashboard")
        .join(name)
}

fn sym(s: &str) -> Symbol {
    Symbol::new(s).unwrap()
}

fn fixture_manifest() -> LoadedManifest {
    load_manifest(&fixture_path("manifest.json")).expect("manifest should load")
}

fn fixture_taxonomy() -> Taxonomy {
    let codex = read_csv(&fixture_path("sheets/tpark_codex.csv")).unwrap();
    let portfolio = read_csv(&fixture_path("sheets/PF_Ranks.csv")).unwrap();
    Taxonomy::build(
        decode_codex(&codex).unwrap(),
        decode_portfolio(&portfolio).unwrap(),
    )
}

fn fixture_pivot() -> PivotData {
    let table = read_csv(&fixture_path("sheets/summary_data.csv")).unwrap();
    decode_pivot(&table, &PivotOptions::default()).unwrap()
}

/// Resolve the default selection and load its sources from the fixture tree
fn fixture_run(config: &ResolvedConfig) -> (Taxonomy, Dashboard) {
    let loaded = fixture_manifest();
    let selection = resolve_selection(
        &loaded.manifest,
        &SelectionRequest::default(),
        config.pivot_cutoff_day,
    )
    .unwrap();

    let current = load_rank_table(&loaded.rank_path(selection.current).unwrap()).unwrap();
    let prior = match selection.prior {
        Some(idx) => load_rank_table(&loaded.rank_path(idx).unwrap()).unwrap(),
        None => Default::default(),
    };
    let sources = RunSources {
        current,
        prior,
        pivot: fixture_pivot(),
    };

    let taxonomy = fixture_taxonomy();
    let labels = PeriodLabels::for_selection(&loaded.manifest, &selection).unwrap();
    let dashboard = compose_dashboard(labels, &taxonomy, &sources, config);
    (taxonomy, dashboard)
}

fn themes(dashboard: &Dashboard) -> Vec<&str> {
    dashboard.rows.iter().map(|r| r.theme()).collect()
}

#[test]
fn test_default_selection_pairs_prior_and_pivot() {
    let loaded = fixture_manifest();
    let selection =
        resolve_selection(&loaded.manifest, &SelectionRequest::default(), 25).unwrap();

    assert_eq!(selection.current, 0);
    // 2025-02-10 target: 2025-02-12 is two days off
    assert_eq!(selection.prior, Some(1));
    // day 10 is before the cutoff, so February's pivot
    assert_eq!(selection.pivot, 0);
}

#[test]
fn test_explicit_selection_by_display_and_filename() {
    let loaded = fixture_manifest();
    let request = SelectionRequest {
        current: Some("2025-02-12"),
        prior: Some("out_09-Jan-25.csv"),
        pivot: Some("1"),
    };
    let selection = resolve_selection(&loaded.manifest, &request, 25).unwrap();

    assert_eq!(selection.current, 1);
    assert_eq!(selection.prior, Some(2));
    assert_eq!(selection.pivot, 1);
}

#[test]
fn test_unknown_selector_is_an_error() {
    let loaded = fixture_manifest();
    let request = SelectionRequest {
        current: Some("2030-01-01"),
        ..SelectionRequest::default()
    };
    assert!(resolve_selection(&loaded.manifest, &request, 25).is_err());
}

#[test]
fn test_manifest_paths_resolve_next_to_manifest() {
    let loaded = fixture_manifest();
    let path = loaded.rank_path(0).unwrap();
    assert!(path.ends_with("data/eom_price/out_10-Mar-25.csv"));
    assert!(path.exists());
}

#[test]
fn test_generated_manifest_matches_fixture_rank_files() {
    let generated =
        generate_manifest(&fixture_path("data"), &fixture_path("")).expect("scan should succeed");
    let loaded = fixture_manifest();

    assert_eq!(generated.rank_files, loaded.manifest.rank_files);
    assert_eq!(generated.pivot_files, loaded.manifest.pivot_files[..1]);
    assert_eq!(generated.pf_ranks_path, loaded.manifest.pf_ranks_path);
    assert_eq!(generated.defaults, loaded.manifest.defaults);
}

#[test]
fn test_fixture_taxonomy_reconciles_portfolio() {
    let taxonomy = fixture_taxonomy();

    // BEL carries a secondary theme in the codex
    assert_eq!(
        taxonomy.themes_of(&sym("BEL")),
        vec!["Capital Goods", "Defence"]
    );
    assert_eq!(taxonomy.members("Capital Goods"), &[sym("BEL")]);
    assert_eq!(taxonomy.themes_of(&sym("SBIN")), vec!["PSU Banks"]);
    assert_eq!(
        taxonomy.themes_of(&sym("ZENTEC")),
        vec![OTHER_PORTFOLIO_THEME]
    );
    assert!(taxonomy.is_portfolio(&sym("HAL")));
    assert_eq!(taxonomy.portfolio().len(), 3);
}

#[test]
fn test_dashboard_rows_sorted_by_median() {
    let config = ResolvedConfig::defaults().unwrap();
    let (_, dashboard) = fixture_run(&config);

    assert_eq!(dashboard.as_of, "2025-03-10");
    assert_eq!(dashboard.prior.as_deref(), Some("2025-02-12"));
    assert_eq!(dashboard.pivot, "2025-02");
    assert_eq!(
        themes(&dashboard),
        vec![
            OTHER_PORTFOLIO_THEME,
            "Defence",
            "Capital Goods",
            "Banking",
            "PSU Banks",
            "FMCG"
        ]
    );
    assert!(dashboard.missing_portfolio.is_empty());
}

#[test]
fn test_secondary_theme_keeps_member_rank() {
    let config = ResolvedConfig::defaults().unwrap();
    let (_, dashboard) = fixture_run(&config);
    let capital_goods = dashboard
        .rows
        .iter()
        .find(|r| r.theme() == "Capital Goods")
        .unwrap();

    assert_eq!(capital_goods.ranks.median_current, Some(9.0));
    assert_eq!(capital_goods.ranks.median_delta, Some(RankDelta::Improved(3)));
    let labels: Vec<String> = capital_goods.ranks.members.iter().map(|e| e.label()).collect();
    assert_eq!(labels, vec!["BEL 9 (▲3)"]);
}

#[test]
fn test_banking_row_end_to_end() {
    let config = ResolvedConfig::defaults().unwrap();
    let (_, dashboard) = fixture_run(&config);
    let banking = dashboard
        .rows
        .iter()
        .find(|r| r.theme() == "Banking")
        .unwrap();

    assert_eq!(banking.ranks.median_current, Some(16.0));
    assert_eq!(banking.ranks.median_prior, Some(16.5));
    assert_eq!(banking.ranks.median_delta, Some(RankDelta::Improved(1)));

    match &banking.ranks.members {
        Members::Separated { portfolio, others } => {
            assert_eq!(portfolio.len(), 1);
            assert_eq!(portfolio[0].label(), "HDFCBANK 12 (▲3)");
            assert!(portfolio[0].notable);
            assert_eq!(others.len(), 1);
            assert_eq!(others[0].label(), "ICICIBANK 20 (▼2)");
            assert!(!others[0].notable);
        }
        other => panic!("expected separated members, got {:?}", other),
    }

    match &banking.funds {
        Members::Separated { portfolio, others } => {
            // value columns are read oldest first regardless of sheet order
            assert_eq!(portfolio[0].label(), "HDFCBANK (1, 2, 3)");
            assert!(others.is_empty());
        }
        other => panic!("expected separated funds, got {:?}", other),
    }
}

#[test]
fn test_members_without_prior_and_sparse_windows() {
    let config = ResolvedConfig::defaults().unwrap();
    let (_, dashboard) = fixture_run(&config);

    let psu = dashboard
        .rows
        .iter()
        .find(|r| r.theme() == "PSU Banks")
        .unwrap();
    assert_eq!(psu.ranks.median_prior, None);
    assert_eq!(psu.ranks.median_delta, None);
    let sbin: Vec<_> = psu.ranks.members.iter().collect();
    assert_eq!(sbin[0].label(), "SBIN 36 (▲0)");

    let defence = dashboard
        .rows
        .iter()
        .find(|r| r.theme() == "Defence")
        .unwrap();
    let hal = defence.funds.iter().next().unwrap();
    assert_eq!(hal.label(), "HAL (4, 5)");
    assert!(!hal.notable);

    // NESTLEIND has no current rank and is left out of FMCG
    let fmcg = dashboard.rows.iter().find(|r| r.theme() == "FMCG").unwrap();
    assert_eq!(fmcg.ranks.ranked_count, 2);
}

#[test]
fn test_unknown_missing_prior_marker() {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.aggregate.missing_prior = themepark_core::MissingPrior::Unknown;
    let (_, dashboard) = fixture_run(&config);

    let psu = dashboard
        .rows
        .iter()
        .find(|r| r.theme() == "PSU Banks")
        .unwrap();
    let entry = psu.ranks.members.iter().next().unwrap();
    assert_eq!(entry.delta, RankDelta::Unknown);
    assert_eq!(entry.label(), "SBIN 36 (?)");
}

#[test]
fn test_combined_layout_without_highlight() {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.aggregate.separate_portfolio = false;
    config.aggregate.highlight = false;
    let (_, dashboard) = fixture_run(&config);

    assert!(!dashboard.separate_portfolio);
    for row in &dashboard.rows {
        assert!(!row.ranks.members.is_separated());
        assert!(row.ranks.members.iter().all(|e| !e.notable));
    }

    let html = html::render_html_dashboard(&dashboard);
    assert!(html.contains(r#"<th colspan="2">All Stocks</th>"#));
    assert!(!html.contains("#FFD700"));
}

#[test]
fn test_portfolio_filter_keeps_portfolio_themes() {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.theme_filter = ThemeFilter::Portfolio;
    let (_, dashboard) = fixture_run(&config);

    assert_eq!(
        themes(&dashboard),
        vec![OTHER_PORTFOLIO_THEME, "Defence", "Banking"]
    );
}

#[test]
fn test_custom_filter_reports_hidden_portfolio_symbols() {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.theme_filter = ThemeFilter::Custom(vec!["banking".to_string()]);
    let (_, dashboard) = fixture_run(&config);

    assert_eq!(themes(&dashboard), vec!["Banking"]);
    assert_eq!(dashboard.missing_portfolio, vec![sym("HAL"), sym("ZENTEC")]);

    let html = html::render_html_dashboard(&dashboard);
    assert!(html.contains("Missing portfolio symbols (2)"));
    assert!(html.contains(r#"<span class="symbol">ZENTEC</span>"#));

    let text = render_text(&dashboard);
    assert!(text.contains("WARNING: 2 portfolio symbol(s) missing: HAL, ZENTEC"));
}

#[test]
fn test_text_report() {
    let config = ResolvedConfig::defaults().unwrap();
    let (_, dashboard) = fixture_run(&config);
    let text = render_text(&dashboard);

    assert!(text.starts_with("Combined View: Ranks + MF Fund Signals - As of 2025-03-10\n"));
    assert!(text.contains("Prior: 2025-02-12  Pivot: 2025-02"));
    assert!(text.contains("    Rank:  HDFCBANK 12 (▲3) *\n"));
    assert!(text.contains("    Funds: HDFCBANK (1, 2, 3) *\n"));
    assert!(text.contains("    Rank:  ITC 40 (▲4), HUL 60 (▼2)\n"));
}

#[test]
fn test_html_report() {
    let config = ResolvedConfig::defaults().unwrap();
    let (_, dashboard) = fixture_run(&config);
    let html = html::render_html_dashboard(&dashboard);

    assert!(html.contains("Combined View: Ranks + MF Fund Signals - As of 2025-03-10"));
    assert!(html.contains(r#"<th colspan="2">Portfolio</th>"#));
    assert!(html.contains(r#"16 <span class="delta-up">(▲1)</span>"#));
    assert!(html.contains(r#"ICICIBANK 20 <span class="delta-down">(▼2)</span>"#));
    assert!(html.contains(r#"HAL 5 <span class="delta-flat">(0)</span>"#));
    assert!(html.contains("background-color:#FFD700"));
    assert!(!html.contains("Missing portfolio symbols"));
}

#[test]
fn test_output_is_deterministic() {
    let config = ResolvedConfig::defaults().unwrap();
    let (_, first) = fixture_run(&config);
    let (_, second) = fixture_run(&config);

    assert_eq!(render_json(&first), render_json(&second));
    assert_eq!(
        html::render_html_dashboard(&first),
        html::render_html_dashboard(&second)
    );
}

#[test]
fn test_json_report_shape() {
    let config = ResolvedConfig::defaults().unwrap();
    let (_, dashboard) = fixture_run(&config);
    let json: serde_json::Value = serde_json::from_str(&render_json(&dashboard)).unwrap();

    assert_eq!(json["as_of"], "2025-03-10");
    let first = &json["rows"][0];
    assert_eq!(first["theme"], OTHER_PORTFOLIO_THEME);
    assert_eq!(first["members"]["layout"], "separated");
    assert_eq!(first["funds"]["portfolio"][0]["values"][0], 2);
}

#[test]
fn test_workbook_taxonomy_matches_csv_export() {
    let config = ResolvedConfig::defaults().unwrap();
    let from_workbook = load_manifest_taxonomy(&fixture_manifest(), &config).unwrap();
    let from_csv = fixture_taxonomy();

    assert_eq!(
        from_workbook.themes().collect::<Vec<_>>(),
        from_csv.themes().collect::<Vec<_>>()
    );
    for theme in from_csv.themes() {
        assert_eq!(from_workbook.members(theme), from_csv.members(theme), "{}", theme);
    }
    assert_eq!(from_workbook.portfolio(), from_csv.portfolio());
}

#[test]
fn test_render_dashboard_reads_workbooks() {
    let config = ResolvedConfig::defaults().unwrap();
    let dashboard =
        render_dashboard(&fixture_manifest(), &SelectionRequest::default(), &config).unwrap();
    let (_, expected) = fixture_run(&config);

    assert_eq!(render_json(&dashboard), render_json(&expected));
}

#[test]
fn test_session_commits_successful_render() {
    let config = ResolvedConfig::defaults().unwrap();
    let loaded = fixture_manifest();
    let selection =
        resolve_selection(&loaded.manifest, &SelectionRequest::default(), 25).unwrap();
    let session = RenderSession::new(load_manifest_taxonomy(&loaded, &config).unwrap());

    let rendered = session.render(&loaded, &selection, &config).unwrap().unwrap();
    assert_eq!(rendered.as_of, "2025-03-10");
    assert_eq!(session.current().unwrap().as_of, "2025-03-10");
}

#[test]
fn test_missing_pivot_workbook_aborts_run() {
    let config = ResolvedConfig::defaults().unwrap();
    let request = SelectionRequest {
        pivot: Some("2025-01"),
        ..SelectionRequest::default()
    };
    let err = render_dashboard(&fixture_manifest(), &request, &config).unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("Jan25_pivot_features.xlsx"), "{}", message);
}

#[test]
fn test_missing_prior_rank_aborts_run_without_commit() {
    let config = ResolvedConfig::defaults().unwrap();
    let mut loaded = fixture_manifest();
    loaded.manifest.rank_files[1].path = "data/eom_price/out_12-Feb-24.csv".to_string();
    let selection =
        resolve_selection(&loaded.manifest, &SelectionRequest::default(), 25).unwrap();
    assert_eq!(selection.prior, Some(1));

    let session = RenderSession::new(load_manifest_taxonomy(&loaded, &config).unwrap());
    let err = session.render(&loaded, &selection, &config).unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("out_12-Feb-24.csv"), "{}", message);
    assert!(session.current().is_none());
}

#[test]
fn test_missing_sheet_aborts_run() {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.pivot_sheet = "Pivot".to_string();
    let err =
        render_dashboard(&fixture_manifest(), &SelectionRequest::default(), &config).unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("sheet 'Pivot' not found"), "{}", message);
}
