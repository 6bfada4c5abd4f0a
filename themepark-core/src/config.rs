//! Configuration file support for Theme Park
//!
//! Loads dashboard configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.themeparkrc.json` next to the manifest
//! 3. `themepark.config.json` next to the manifest
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::aggregates::{AggregateOptions, MissingPrior, DEFAULT_HIGHLIGHT_SCORE};
use crate::pivot::{PivotOptions, DEFAULT_VALUE_PREFIX, DEFAULT_WINDOW};
use crate::selector::DEFAULT_PIVOT_CUTOFF_DAY;
use crate::taxonomy::ThemeFilter;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CODEX_SHEET: &str = "tpark_codex";
pub const DEFAULT_PORTFOLIO_SHEET: &str = "PF_Ranks";
pub const DEFAULT_PIVOT_SHEET: &str = "Summary Data";

const MAX_WINDOW: usize = 12;

/// Theme subset named in config (custom lists go in `themes`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeFilterKind {
    #[default]
    All,
    Portfolio,
}

/// Theme Park configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeParkConfig {
    /// Split members into portfolio / others columns (default: true)
    #[serde(default)]
    pub separate_portfolio: Option<bool>,

    /// Mark members whose Impact and FundQuality both hit the highlight score (default: true)
    #[serde(default)]
    pub highlight: Option<bool>,

    /// Annotation for members without a prior rank (default: improved-zero)
    #[serde(default)]
    pub missing_prior: Option<MissingPrior>,

    /// Which themes to show (default: all)
    #[serde(default)]
    pub theme_filter: Option<ThemeFilterKind>,

    /// Explicit theme list; overrides `theme_filter` when non-empty
    #[serde(default)]
    pub themes: Vec<String>,

    /// Source sheet names
    #[serde(default)]
    pub sheets: Option<SheetConfig>,

    /// Prefix of monthly pivot columns (default: "bb_")
    #[serde(default)]
    pub value_prefix: Option<String>,

    /// Number of monthly values shown per fund entry (default: 3)
    #[serde(default)]
    pub window: Option<usize>,

    /// Day of month from which a snapshot uses its own month's pivot (default: 25)
    #[serde(default)]
    pub pivot_cutoff_day: Option<u32>,

    /// Score Impact and FundQuality must both equal to highlight (default: 2)
    #[serde(default)]
    pub highlight_score: Option<i64>,
}

/// Sheet name overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetConfig {
    /// Theme codex sheet (default: "tpark_codex")
    pub codex: Option<String>,
    /// Portfolio sheet (default: "PF_Ranks")
    pub portfolio: Option<String>,
    /// Pivot summary sheet (default: "Summary Data")
    pub pivot: Option<String>,
}

/// Resolved configuration with defaults applied
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub aggregate: AggregateOptions,
    pub pivot: PivotOptions,
    pub theme_filter: ThemeFilter,
    pub codex_sheet: String,
    pub portfolio_sheet: String,
    pub pivot_sheet: String,
    pub pivot_cutoff_day: u32,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl ThemeParkConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(window) = self.window {
            if window == 0 || window > MAX_WINDOW {
                anyhow::bail!("window must be between 1 and {} (got {})", MAX_WINDOW, window);
            }
        }

        if let Some(day) = self.pivot_cutoff_day {
            if !(1..=31).contains(&day) {
                anyhow::bail!("pivot_cutoff_day must be between 1 and 31 (got {})", day);
            }
        }

        if let Some(ref prefix) = self.value_prefix {
            if prefix.trim().is_empty() {
                anyhow::bail!("value_prefix must not be empty");
            }
        }

        if let Some(ref sheets) = self.sheets {
            for (name, value) in [
                ("codex", &sheets.codex),
                ("portfolio", &sheets.portfolio),
                ("pivot", &sheets.pivot),
            ] {
                if let Some(v) = value {
                    if v.trim().is_empty() {
                        anyhow::bail!("sheets.{} must not be empty", name);
                    }
                }
            }
        }

        if let Some(t) = self.themes.iter().find(|t| t.trim().is_empty()) {
            anyhow::bail!("themes must not contain empty names (got {:?})", t);
        }

        Ok(())
    }

    /// Resolve config into the options each stage consumes
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let theme_filter = if !self.themes.is_empty() {
            ThemeFilter::Custom(self.themes.clone())
        } else {
            match self.theme_filter.unwrap_or_default() {
                ThemeFilterKind::All => ThemeFilter::All,
                ThemeFilterKind::Portfolio => ThemeFilter::Portfolio,
            }
        };

        let (codex_sheet, portfolio_sheet, pivot_sheet) = match &self.sheets {
            Some(s) => (
                s.codex.clone().unwrap_or_else(|| DEFAULT_CODEX_SHEET.to_string()),
                s.portfolio
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PORTFOLIO_SHEET.to_string()),
                s.pivot.clone().unwrap_or_else(|| DEFAULT_PIVOT_SHEET.to_string()),
            ),
            None => (
                DEFAULT_CODEX_SHEET.to_string(),
                DEFAULT_PORTFOLIO_SHEET.to_string(),
                DEFAULT_PIVOT_SHEET.to_string(),
            ),
        };

        Ok(ResolvedConfig {
            aggregate: AggregateOptions {
                separate_portfolio: self.separate_portfolio.unwrap_or(true),
                highlight: self.highlight.unwrap_or(true),
                highlight_score: self.highlight_score.unwrap_or(DEFAULT_HIGHLIGHT_SCORE),
                missing_prior: self.missing_prior.unwrap_or_default(),
            },
            pivot: PivotOptions {
                value_prefix: self
                    .value_prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VALUE_PREFIX.to_string()),
                window: self.window.unwrap_or(DEFAULT_WINDOW),
            },
            theme_filter,
            codex_sheet,
            portfolio_sheet,
            pivot_sheet,
            pivot_cutoff_day: self.pivot_cutoff_day.unwrap_or(DEFAULT_PIVOT_CUTOFF_DAY),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        ThemeParkConfig::default().resolve()
    }
}

/// Config filenames looked for next to the manifest, highest priority first
pub const CONFIG_FILENAMES: [&str; 2] = [".themeparkrc.json", "themepark.config.json"];

/// Config file a run should use: the explicit path when given, else the
/// first of [`CONFIG_FILENAMES`] present in `dir`
pub fn find_config_file(dir: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => CONFIG_FILENAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file()),
    }
}

/// Parse and validate one config file
pub fn load_config_file(path: &Path) -> Result<ThemeParkConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    let config: ThemeParkConfig = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid themepark config", path.display()))?;
    config
        .validate()
        .with_context(|| format!("config {} failed validation", path.display()))?;
    Ok(config)
}

/// Resolve the config for a manifest directory, falling back to defaults
/// when no file is found. An explicit path that cannot be read is an error.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let source = find_config_file(dir, config_path);
    let config = match &source {
        Some(path) => load_config_file(path)?,
        None => ThemeParkConfig::default(),
    };
    if let Some(path) = &source {
        log::debug!("config loaded from {}", path.display());
    }

    let mut resolved = config.resolve()?;
    resolved.config_path = source;
    Ok(resolved)
}
