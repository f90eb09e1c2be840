//! Term-wide distribution parameters used to place one member's count among
//! their peers.
//!
//! Quartiles use linear interpolation between closest ranks (position
//! `p * (n - 1)` over the sorted values). Bounds are Tukey fences with the
//! lower fence floored at zero. Values exactly on a fence are in the normal
//! range.

use std::collections::BTreeMap;

use serde::Serialize;

use super::activity::ActivityKind;
use crate::data::records::ActivityDataset;
use crate::terms::TermId;

/// Below this many data points quartiles are not meaningful.
pub const MIN_SAMPLE_FOR_QUARTILES: usize = 4;

/// Why a distribution could not be used as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    /// Fewer than four values: no outlier detection, range `[0, max]`.
    InsufficientData,
    /// Every value fell outside the fences.
    EmptyCleanSubset,
    /// The clean subset holds a single distinct value.
    ZeroCleanRange,
}

/// Where a value falls relative to the term distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "range", rename_all = "snake_case")]
pub enum Placement {
    BelowRange,
    /// `normalized` is the position within the clean range, in `[0, 1]`.
    Normal { normalized: f64 },
    AboveRange,
}

/// Quartiles, fences and clean range for one activity in one term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub activity: ActivityKind,
    pub sample_size: usize,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub clean_min: f64,
    pub clean_max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degeneracy: Option<Degeneracy>,
}

impl CategoryStats {
    pub fn compute(activity: ActivityKind, values: &[u32], iqr_multiplier: f64) -> Self {
        let mut sorted: Vec<f64> = values.iter().map(|value| f64::from(*value)).collect();
        sorted.sort_by(f64::total_cmp);
        let sample_size = sorted.len();

        if sample_size < MIN_SAMPLE_FOR_QUARTILES {
            let max = sorted.last().copied().unwrap_or(0.0);
            return Self {
                activity,
                sample_size,
                q1: 0.0,
                q3: max,
                iqr: max,
                lower_bound: 0.0,
                upper_bound: max,
                clean_min: 0.0,
                clean_max: max,
                degeneracy: Some(Degeneracy::InsufficientData),
            };
        }

        let q1 = percentile(&sorted, 0.25);
        let q3 = percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        let lower_bound = (q1 - iqr_multiplier * iqr).max(0.0);
        let upper_bound = q3 + iqr_multiplier * iqr;

        let mut clean = sorted
            .iter()
            .copied()
            .filter(|value| *value >= lower_bound && *value <= upper_bound);
        let (clean_min, clean_max, degeneracy) = match clean.next() {
            None => (lower_bound, lower_bound, Some(Degeneracy::EmptyCleanSubset)),
            Some(first) => {
                // `sorted` is ascending, so the last clean value is the max.
                let last = clean.last().unwrap_or(first);
                let degeneracy = (last <= first).then_some(Degeneracy::ZeroCleanRange);
                (first, last, degeneracy)
            }
        };

        Self {
            activity,
            sample_size,
            q1,
            q3,
            iqr,
            lower_bound,
            upper_bound,
            clean_min,
            clean_max,
            degeneracy,
        }
    }

    pub fn clean_range(&self) -> f64 {
        self.clean_max - self.clean_min
    }

    pub fn placement(&self, value: f64) -> Placement {
        if value < self.lower_bound {
            return Placement::BelowRange;
        }
        if value > self.upper_bound {
            return Placement::AboveRange;
        }

        let range = self.clean_range();
        let normalized = if range > 0.0 {
            ((value - self.clean_min) / range).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Placement::Normal { normalized }
    }
}

/// Percentile of an ascending slice with linear interpolation. `p` is in `[0, 1]`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let position = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// Informational notice that scoring fell back for an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegenerateStatistics {
    pub term: TermId,
    pub activity: ActivityKind,
    pub reason: Degeneracy,
}

/// Statistics for every outlier-scored activity of a term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermStatistics {
    pub term: TermId,
    pub members: usize,
    pub activities: BTreeMap<ActivityKind, CategoryStats>,
}

impl TermStatistics {
    /// Only members present in the dataset contribute; absent members are not zeros.
    pub fn compute(dataset: &ActivityDataset, iqr_multiplier: f64) -> Self {
        let activities = ActivityKind::OUTLIER_SCORED
            .into_iter()
            .map(|kind| {
                let values: Vec<u32> = dataset
                    .records()
                    .map(|record| record.activities.get(kind))
                    .collect();
                (kind, CategoryStats::compute(kind, &values, iqr_multiplier))
            })
            .collect();

        Self {
            term: dataset.term(),
            members: dataset.len(),
            activities,
        }
    }

    pub fn get(&self, kind: ActivityKind) -> Option<&CategoryStats> {
        self.activities.get(&kind)
    }

    pub fn notices(&self) -> Vec<DegenerateStatistics> {
        self.activities
            .values()
            .filter_map(|stats| {
                stats.degeneracy.map(|reason| DegenerateStatistics {
                    term: self.term,
                    activity: stats.activity,
                    reason,
                })
            })
            .collect()
    }
}
