use crate::error::{DiagnosticsError, Result};
use crate::schema::{
    CategoryMetrics, DiagnosticsOptions, RankingCriterion, RawCategoryMetrics, SeriesMatrix,
    SortDirection, TrendAxis,
};
use crate::stats::{mean, ols_slope, sample_std};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const MIN_WINDOW_MONTHS: usize = 2;

/// Computes per-category diagnostics over a month window.
///
/// The last column of the matrix is the "current" month; every column before it
/// forms the historical window.
pub struct SeriesDiagnostics {
    options: DiagnosticsOptions,
}

impl SeriesDiagnostics {
    pub fn new(options: DiagnosticsOptions) -> Self {
        Self { options }
    }

    pub fn compute_raw(&self, matrix: &SeriesMatrix) -> Result<Vec<RawCategoryMetrics>> {
        if matrix.month_count() < MIN_WINDOW_MONTHS {
            return Err(DiagnosticsError::InsufficientColumns {
                found: matrix.month_count(),
            });
        }

        debug!(
            "Computing diagnostics for {} categories over {} months ({:?} trend axis)",
            matrix.category_count(),
            matrix.month_count(),
            self.options.trend_axis
        );

        Ok(matrix
            .rows()
            .map(|(category, row)| self.row_metrics(category, row))
            .collect())
    }

    pub fn compute(&self, matrix: &SeriesMatrix) -> Result<Vec<CategoryMetrics>> {
        let raw = self.compute_raw(matrix)?;
        Ok(raw.iter().map(RawCategoryMetrics::filled).collect())
    }

    fn row_metrics(&self, category: &str, row: &[Option<f64>]) -> RawCategoryMetrics {
        let (history, last) = row.split_at(row.len() - 1);

        let last_value = last[0];
        let historical_mean = mean(history);
        let recent_performance = last_value.zip(historical_mean).map(|(l, m)| l - m);

        RawCategoryMetrics {
            category: category.to_string(),
            last_value,
            historical_mean,
            recent_performance,
            volatility: sample_std(row),
            trend_slope: Some(self.trend_slope(row)),
        }
    }

    // Fewer than two recorded months is a flat trend, not an undefined one.
    fn trend_slope(&self, row: &[Option<f64>]) -> f64 {
        let points: Vec<(f64, f64)> = row
            .iter()
            .enumerate()
            .filter_map(|(pos, v)| v.map(|v| (pos, v)))
            .enumerate()
            .map(|(compact, (pos, v))| match self.options.trend_axis {
                TrendAxis::Compacted => (compact as f64, v),
                TrendAxis::Positional => (pos as f64, v),
            })
            .collect();

        ols_slope(&points).unwrap_or(0.0)
    }
}

impl Default for SeriesDiagnostics {
    fn default() -> Self {
        Self::new(DiagnosticsOptions::default())
    }
}

/// Diagnostics with the default (compacted) trend axis.
pub fn compute_metrics(matrix: &SeriesMatrix) -> Result<Vec<CategoryMetrics>> {
    SeriesDiagnostics::default().compute(matrix)
}

pub fn compute_metrics_with(
    matrix: &SeriesMatrix,
    options: &DiagnosticsOptions,
) -> Result<Vec<CategoryMetrics>> {
    SeriesDiagnostics::new(*options).compute(matrix)
}

pub fn compute_raw_metrics(
    matrix: &SeriesMatrix,
    options: &DiagnosticsOptions,
) -> Result<Vec<RawCategoryMetrics>> {
    SeriesDiagnostics::new(*options).compute_raw(matrix)
}

/// Sorts by `criterion` in the given direction and keeps the first `top_n` records.
///
/// The sort is stable, so categories with equal values stay in row order. `0.0`
/// and `-0.0` count as equal.
pub fn rank(
    metrics: &[CategoryMetrics],
    criterion: RankingCriterion,
    top_n: usize,
    direction: SortDirection,
) -> Vec<CategoryMetrics> {
    let mut ranked = metrics.to_vec();
    ranked.sort_by(|a, b| {
        let ord = a
            .metric(criterion)
            .partial_cmp(&b.metric(criterion))
            .unwrap_or(Ordering::Equal);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    ranked.truncate(top_n);
    ranked
}

/// Named ranking conventions. Neither is applied implicitly; callers pick one
/// or pass a direction to [`rank`] themselves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankingPreset {
    /// Lowest trend and lowest recent performance first, most volatile first.
    WorstFirst,
    /// Largest value first for every criterion.
    LargestFirst,
}

impl RankingPreset {
    pub fn direction_for(&self, criterion: RankingCriterion) -> SortDirection {
        match (self, criterion) {
            (RankingPreset::LargestFirst, _) => SortDirection::Descending,
            (RankingPreset::WorstFirst, RankingCriterion::Volatility) => SortDirection::Descending,
            (RankingPreset::WorstFirst, _) => SortDirection::Ascending,
        }
    }

    pub fn rank(
        &self,
        metrics: &[CategoryMetrics],
        criterion: RankingCriterion,
        top_n: usize,
    ) -> Vec<CategoryMetrics> {
        rank(metrics, criterion, top_n, self.direction_for(criterion))
    }
}

/// Orders two optional scores largest first, with missing scores last.
pub(crate) fn descending_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
