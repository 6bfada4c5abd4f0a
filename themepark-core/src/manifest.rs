//! Data manifest: the catalogue of rank and pivot files a dashboard can load
//!
//! Paths inside a manifest are relative to the manifest's own directory.

use crate::pivot::month_from_abbrev;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const MANIFEST_FILENAME: &str = "manifest.json";

const RANK_DIR: &str = "eom_price";
const PIVOT_DIR: &str = "final";
const PORTFOLIO_WORKBOOK: &str = "PF_Ranks.xlsx";

/// Calendar date of a rank snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RankDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// Month of a pivot snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PivotDate {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankFile {
    pub filename: String,
    pub path: String,
    pub date: RankDate,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotFile {
    pub filename: String,
    pub path: String,
    pub date: PivotDate,
    pub display: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub current_rank: Option<RankFile>,
    #[serde(default)]
    pub prev_rank: Option<RankFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Newest first
    pub rank_files: Vec<RankFile>,
    /// Newest first
    pub pivot_files: Vec<PivotFile>,
    pub pf_ranks_path: String,
    #[serde(default)]
    pub defaults: Defaults,
}

impl Manifest {
    /// Index of the rank file named by `selector`: a list index, a display
    /// label (`2026-02-13`) or a filename
    pub fn find_rank(&self, selector: &str) -> Result<usize> {
        find_entry(
            "rank file",
            selector,
            self.rank_files
                .iter()
                .map(|f| (f.display.as_str(), f.filename.as_str())),
        )
    }

    /// Index of the pivot file named by `selector`, matched like [`Manifest::find_rank`]
    pub fn find_pivot(&self, selector: &str) -> Result<usize> {
        find_entry(
            "pivot file",
            selector,
            self.pivot_files
                .iter()
                .map(|f| (f.display.as_str(), f.filename.as_str())),
        )
    }

    /// Index of the default current rank file, falling back to the newest
    pub fn default_current(&self) -> Option<usize> {
        if self.rank_files.is_empty() {
            return None;
        }
        let preferred = self.defaults.current_rank.as_ref().and_then(|d| {
            self.rank_files
                .iter()
                .position(|f| f.filename == d.filename)
        });
        Some(preferred.unwrap_or(0))
    }
}

fn find_entry<'a>(
    kind: &str,
    selector: &str,
    entries: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<usize> {
    let entries: Vec<(&str, &str)> = entries.collect();
    let selector = selector.trim();

    if let Ok(index) = selector.parse::<usize>() {
        if index < entries.len() {
            return Ok(index);
        }
    }
    entries
        .iter()
        .position(|(display, filename)| *display == selector || *filename == selector)
        .with_context(|| {
            let known: Vec<&str> = entries.iter().map(|(d, _)| *d).collect();
            format!(
                "no {} matches '{}' (available: {})",
                kind,
                selector,
                known.join(", ")
            )
        })
}

/// A manifest plus the directory its relative paths resolve against
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    pub base_dir: PathBuf,
}

impl LoadedManifest {
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }

    pub fn rank_path(&self, index: usize) -> Option<PathBuf> {
        self.manifest
            .rank_files
            .get(index)
            .map(|f| self.resolve(&f.path))
    }

    pub fn pivot_path(&self, index: usize) -> Option<PathBuf> {
        self.manifest
            .pivot_files
            .get(index)
            .map(|f| self.resolve(&f.path))
    }

    pub fn portfolio_path(&self) -> PathBuf {
        self.resolve(&self.manifest.pf_ranks_path)
    }
}

/// Read a manifest file
pub fn load_manifest(path: &Path) -> Result<LoadedManifest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse manifest: {}", path.display()))?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    log::debug!(
        "manifest {}: {} rank file(s), {} pivot file(s)",
        path.display(),
        manifest.rank_files.len(),
        manifest.pivot_files.len()
    );
    Ok(LoadedManifest { manifest, base_dir })
}

fn two_digit_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(if raw.len() <= 2 { 2000 + year } else { year })
}

/// Date encoded in a rank filename, e.g. `out_13-Feb-26.csv` → 2026-02-13
pub fn parse_rank_filename(filename: &str) -> Option<RankDate> {
    let re = Regex::new(r"^out_(\d{1,2})-([A-Za-z]+)-(\d{2,4})\.csv$").ok()?;
    let caps = re.captures(filename)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_from_abbrev(&caps[2])?;
    let year = two_digit_year(&caps[3])?;
    Some(RankDate { year, month, day })
}

/// Month encoded in a pivot filename, e.g. `Jan26_pivot_features.xlsx` → 2026-01
pub fn parse_pivot_filename(filename: &str) -> Option<PivotDate> {
    if filename.starts_with("~$") {
        return None;
    }
    let re = Regex::new(r"^([A-Za-z]+)(\d{2,4})_pivot_features\.xlsx$").ok()?;
    let caps = re.captures(filename)?;
    let month = month_from_abbrev(&caps[1])?;
    let year = two_digit_year(&caps[2])?;
    Some(PivotDate { year, month })
}

/// Relative path from `base` to `target` using `/` separators; `target`
/// itself when it is not under `base`
fn relative_to(target: &Path, base: &Path) -> String {
    let rel = target.strip_prefix(base).unwrap_or(target);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str().map(str::to_string),
            Component::RootDir => Some(String::new()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn join_rel(prefix: &str, parts: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::with_capacity(parts.len() + 1);
    if !prefix.is_empty() {
        segments.push(prefix);
    }
    segments.extend_from_slice(parts);
    segments.join("/")
}

/// Sorted filenames in `dir`; a missing directory yields none
fn list_filenames(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        log::warn!("directory not found: {}", dir.display());
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Scan a data directory and build a manifest whose paths are relative to
/// `manifest_dir`
pub fn generate_manifest(data_dir: &Path, manifest_dir: &Path) -> Result<Manifest> {
    let prefix = relative_to(data_dir, manifest_dir);

    let mut rank_files: Vec<RankFile> = list_filenames(&data_dir.join(RANK_DIR))?
        .into_iter()
        .filter_map(|filename| {
            let date = parse_rank_filename(&filename)?;
            Some(RankFile {
                path: join_rel(&prefix, &[RANK_DIR, &filename]),
                display: format!("{:04}-{:02}-{:02}", date.year, date.month, date.day),
                filename,
                date,
            })
        })
        .collect();
    rank_files.sort_by(|a, b| b.date.cmp(&a.date));

    let mut pivot_files: Vec<PivotFile> = list_filenames(&data_dir.join(PIVOT_DIR))?
        .into_iter()
        .filter_map(|filename| {
            let date = parse_pivot_filename(&filename)?;
            Some(PivotFile {
                path: join_rel(&prefix, &[PIVOT_DIR, &filename]),
                display: format!("{:04}-{:02}", date.year, date.month),
                filename,
                date,
            })
        })
        .collect();
    pivot_files.sort_by(|a, b| b.date.cmp(&a.date));

    log::info!(
        "found {} rank file(s) and {} pivot file(s) under {}",
        rank_files.len(),
        pivot_files.len(),
        data_dir.display()
    );

    let defaults = Defaults {
        current_rank: rank_files.first().cloned(),
        prev_rank: rank_files.get(1).or(rank_files.first()).cloned(),
    };

    Ok(Manifest {
        rank_files,
        pivot_files,
        pf_ranks_path: join_rel(&prefix, &[PORTFOLIO_WORKBOOK]),
        defaults,
    })
}

/// Write data to file atomically using temp file + rename
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to create temp file: {}", temp_path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write to temp file: {}", temp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync temp file: {}", temp_path.display()))?;
    drop(file);

    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Serialize a manifest as pretty JSON and write it atomically
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    atomic_write(path, &json)
}
