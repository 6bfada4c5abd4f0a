//! Theme Park core library - thematic rank dashboards from rank, pivot and taxonomy files

// Global invariants enforced in this crate:
// - Every symbol is normalized before any lookup or insertion
// - All run state is rebuilt per selection; the taxonomy is immutable
// - Data shaping never formats presentation; renderers never compute
// - Identical input yields byte-for-byte identical output

pub mod aggregates;
pub mod compose;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod html;
pub mod manifest;
pub mod normalize;
pub mod pivot;
pub mod rank;
pub mod report;
pub mod selector;
pub mod session;
pub mod table;
pub mod taxonomy;

pub use aggregates::{aggregate_themes, median, AggregateOptions, MissingPrior, RankDelta, ThemeRow};
pub use compose::{compose, missing_portfolio_symbols, ComposedRow};
pub use config::ResolvedConfig;
pub use dashboard::{Dashboard, Selection, SelectionRequest};
pub use error::SourceError;
pub use manifest::{load_manifest, LoadedManifest, Manifest};
pub use normalize::{normalize_symbol, normalize_theme, Symbol};
pub use report::{render_json, render_text};
pub use session::RenderSession;
pub use taxonomy::{Taxonomy, ThemeFilter};

use anyhow::{Context, Result};
use std::sync::Arc;

/// Load the taxonomy, pick periods and build one dashboard
pub fn render_dashboard(
    manifest: &LoadedManifest,
    request: &SelectionRequest<'_>,
    config: &ResolvedConfig,
) -> Result<Arc<Dashboard>> {
    let selection =
        dashboard::resolve_selection(&manifest.manifest, request, config.pivot_cutoff_day)?;
    let taxonomy = dashboard::load_manifest_taxonomy(manifest, config)?;

    let session = RenderSession::new(taxonomy);
    session
        .render(manifest, &selection, config)?
        .context("render was superseded by a newer run")
}
