//! One dashboard run: pick periods, load sources, aggregate, compose
//!
//! Global invariants enforced:
//! - All three per-run sources load before any aggregation starts
//! - A failed source aborts the run; no partial table is produced
//! - The taxonomy is read-only for the whole run

use crate::aggregates::aggregate_themes;
use crate::compose::{compose, missing_portfolio_symbols, ComposedRow};
use crate::config::ResolvedConfig;
use crate::manifest::{LoadedManifest, Manifest, PivotDate, RankDate};
use crate::normalize::Symbol;
use crate::pivot::{load_pivot, PivotData};
use crate::rank::{load_rank_table, RankTable};
use crate::selector::{match_pivot, match_prior};
use crate::taxonomy::{load_taxonomy, Taxonomy};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

/// Manifest indices feeding one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub current: usize,
    /// `None` when the manifest lists no other rank period
    pub prior: Option<usize>,
    pub pivot: usize,
}

/// Explicit picks; anything left `None` is matched from the current date
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest<'a> {
    pub current: Option<&'a str>,
    pub prior: Option<&'a str>,
    pub pivot: Option<&'a str>,
}

/// Resolve a selection request against the manifest
pub fn resolve_selection(
    manifest: &Manifest,
    request: &SelectionRequest<'_>,
    pivot_cutoff_day: u32,
) -> Result<Selection> {
    let current = match request.current {
        Some(label) => manifest.find_rank(label)?,
        None => manifest
            .default_current()
            .context("manifest lists no rank files")?,
    };
    let current_date = manifest.rank_files[current].date;

    let prior = match request.prior {
        Some(label) => Some(manifest.find_rank(label)?),
        None => {
            let dates: Vec<RankDate> = manifest.rank_files.iter().map(|f| f.date).collect();
            match_prior(current, &dates)
        }
    };

    let pivot = match request.pivot {
        Some(label) => manifest.find_pivot(label)?,
        None => {
            let dates: Vec<PivotDate> = manifest.pivot_files.iter().map(|f| f.date).collect();
            match_pivot(&current_date, &dates, pivot_cutoff_day)
                .context("manifest lists no pivot files")?
        }
    };

    Ok(Selection {
        current,
        prior,
        pivot,
    })
}

/// Composed dashboard for one selection
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Display label of the current rank period
    pub as_of: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior: Option<String>,
    pub pivot: String,
    pub separate_portfolio: bool,
    pub rows: Vec<ComposedRow>,
    /// Ranked portfolio symbols missing from every row
    pub missing_portfolio: Vec<Symbol>,
}

/// Load the taxonomy workbook named by the manifest
pub fn load_manifest_taxonomy(
    manifest: &LoadedManifest,
    config: &ResolvedConfig,
) -> Result<Arc<Taxonomy>> {
    let taxonomy = load_taxonomy(
        &manifest.portfolio_path(),
        &config.codex_sheet,
        &config.portfolio_sheet,
    )?;
    Ok(Arc::new(taxonomy))
}

/// Decoded per-run sources
#[derive(Debug, Default)]
pub struct RunSources {
    pub current: RankTable,
    pub prior: RankTable,
    pub pivot: PivotData,
}

/// Load the current ranks, prior ranks and pivot concurrently
pub fn load_sources(
    manifest: &LoadedManifest,
    selection: &Selection,
    config: &ResolvedConfig,
) -> Result<RunSources> {
    let current_path = manifest
        .rank_path(selection.current)
        .with_context(|| format!("rank file index {} out of range", selection.current))?;
    let prior_path = match selection.prior {
        Some(idx) => Some(
            manifest
                .rank_path(idx)
                .with_context(|| format!("rank file index {} out of range", idx))?,
        ),
        None => None,
    };
    let pivot_path = manifest
        .pivot_path(selection.pivot)
        .with_context(|| format!("pivot file index {} out of range", selection.pivot))?;

    let (current, (prior, pivot)) = rayon::join(
        || load_rank_table(&current_path),
        || {
            rayon::join(
                || match &prior_path {
                    Some(path) => load_rank_table(path),
                    None => Ok(RankTable::default()),
                },
                || load_pivot(&pivot_path, &config.pivot_sheet, &config.pivot),
            )
        },
    );

    Ok(RunSources {
        current: current?,
        prior: prior?,
        pivot: pivot?,
    })
}

/// Display labels of the selected periods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodLabels {
    pub current: String,
    pub prior: Option<String>,
    pub pivot: String,
}

impl PeriodLabels {
    pub fn for_selection(manifest: &Manifest, selection: &Selection) -> Result<Self> {
        let rank_label = |idx: usize| {
            manifest
                .rank_files
                .get(idx)
                .map(|f| f.display.clone())
                .with_context(|| format!("rank file index {} out of range", idx))
        };
        Ok(PeriodLabels {
            current: rank_label(selection.current)?,
            prior: selection.prior.map(rank_label).transpose()?,
            pivot: manifest
                .pivot_files
                .get(selection.pivot)
                .map(|f| f.display.clone())
                .with_context(|| format!("pivot file index {} out of range", selection.pivot))?,
        })
    }
}

/// Aggregate and compose already-loaded sources
pub fn compose_dashboard(
    labels: PeriodLabels,
    taxonomy: &Taxonomy,
    sources: &RunSources,
    config: &ResolvedConfig,
) -> Dashboard {
    let themes = taxonomy.select(&config.theme_filter);
    let rows = aggregate_themes(
        taxonomy,
        &themes,
        &sources.current,
        &sources.prior,
        &sources.pivot,
        &config.aggregate,
    );
    let rows = compose(rows, &sources.pivot);

    let missing_portfolio = missing_portfolio_symbols(&rows, taxonomy, &sources.current);
    if !missing_portfolio.is_empty() {
        log::warn!(
            "{} ranked portfolio symbol(s) missing from the dashboard: {}",
            missing_portfolio.len(),
            missing_portfolio
                .iter()
                .map(Symbol::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Dashboard {
        as_of: labels.current,
        prior: labels.prior,
        pivot: labels.pivot,
        separate_portfolio: config.aggregate.separate_portfolio,
        rows,
        missing_portfolio,
    }
}

/// Run the full pipeline for one selection
pub fn build_dashboard(
    manifest: &LoadedManifest,
    selection: &Selection,
    taxonomy: &Taxonomy,
    config: &ResolvedConfig,
) -> Result<Dashboard> {
    let labels = PeriodLabels::for_selection(&manifest.manifest, selection)?;
    log::info!(
        "current {}, prior {}, pivot {}",
        labels.current,
        labels.prior.as_deref().unwrap_or("none"),
        labels.pivot
    );
    if labels.prior.is_none() {
        log::warn!("no prior rank period available; every member is treated as new");
    }

    let sources = load_sources(manifest, selection, config)?;
    Ok(compose_dashboard(labels, taxonomy, &sources, config))
}
