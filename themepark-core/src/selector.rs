//! Period matching: which pivot and prior-rank files pair with a current
//! rank snapshot
//!
//! Global invariants enforced:
//! - Matching is pure; it never reads the files it selects
//! - An empty candidate list yields no match rather than an error

use crate::manifest::{PivotDate, RankDate};
use chrono::{Datelike, Duration, NaiveDate};

/// Day of month from which a snapshot pairs with its own month's pivot
pub const DEFAULT_PIVOT_CUTOFF_DAY: u32 = 25;

/// Shift `(year, month)` by `delta` months. `None` when the month index
/// overflows, which only happens for nonsensical manifest dates.
fn shift_month(year: i32, month: u32, delta: i32) -> Option<(i32, u32)> {
    let index = year
        .checked_mul(12)?
        .checked_add(i32::try_from(month).ok()?)?
        .checked_sub(1)?
        .checked_add(delta)?;
    Some((index.div_euclid(12), index.rem_euclid(12) as u32 + 1))
}

/// Calendar date allowing day overflow: `(2025, 2, 31)` is March 3rd
pub fn lenient_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let (year, month) = shift_month(year, month, 0)?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_signed(Duration::days(i64::from(day) - 1))
}

/// Pivot month a rank snapshot should pair with. Before the cutoff day the
/// month's pivot is not yet published, so the previous month is used.
pub fn pivot_target(current: &RankDate, cutoff_day: u32) -> Option<PivotDate> {
    let delta = if current.day < cutoff_day { -1 } else { 0 };
    let (year, month) = shift_month(current.year, current.month, delta)?;
    Some(PivotDate { year, month })
}

/// Index of the pivot period for `current`: exact month match, else the
/// first listed period not after the target, else the first period
pub fn match_pivot(current: &RankDate, pivots: &[PivotDate], cutoff_day: u32) -> Option<usize> {
    if pivots.is_empty() {
        return None;
    }
    let Some(target) = pivot_target(current, cutoff_day) else {
        log::warn!(
            "cannot compute a pivot month for {:?}; using the newest pivot",
            current
        );
        return Some(0);
    };

    let matched = pivots
        .iter()
        .position(|p| *p == target)
        .or_else(|| pivots.iter().position(|p| *p <= target))
        .unwrap_or(0);
    log::debug!(
        "pivot target {:04}-{:02} matched index {}",
        target.year,
        target.month,
        matched
    );
    Some(matched)
}

/// One calendar month before `current`, keeping the day
pub fn prior_target(current: &RankDate) -> Option<NaiveDate> {
    let (year, month) = shift_month(current.year, current.month, -1)?;
    lenient_date(year, month, current.day)
}

/// Index of the rank period closest to one month before `ranks[current]`,
/// excluding `current` itself. Ties go to the first listed.
pub fn match_prior(current: usize, ranks: &[RankDate]) -> Option<usize> {
    let target = prior_target(ranks.get(current)?)?;

    let mut best: Option<(usize, i64)> = None;
    for (idx, date) in ranks.iter().enumerate() {
        if idx == current {
            continue;
        }
        let Some(candidate) = lenient_date(date.year, date.month, date.day) else {
            continue;
        };
        let distance = (candidate - target).num_days().abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((idx, distance));
        }
    }

    if let Some((idx, distance)) = best {
        log::debug!(
            "prior target {} matched index {} ({} day(s) away)",
            target,
            idx,
            distance
        );
    }
    best.map(|(idx, _)| idx)
}

/// Format a lenient date the way manifests display rank dates
pub fn display_date(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}
