//! Comparative views over a selected window: period rankings, heat-map rows,
//! single-category summaries and focus-month KPI comparisons.

use crate::diagnostics::descending_missing_last;
use crate::error::{DiagnosticsError, Result};
use crate::schema::SeriesMatrix;
use crate::snapshot::DatasetSnapshot;
use crate::stats::{max_with_index, mean, min_with_index, sample_std, sum};
use crate::utils::ValueFormat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedValue {
    pub category: String,
    /// `None` when the category has too little data for the score.
    pub value: Option<f64>,
}

/// Categories ordered by their mean over the window, largest first.
pub fn rank_by_mean(matrix: &SeriesMatrix, top_n: usize) -> Vec<RankedValue> {
    rank_scores(matrix, top_n, mean)
}

/// Categories ordered by sample standard deviation over the window, most volatile first.
pub fn rank_by_volatility(matrix: &SeriesMatrix, top_n: usize) -> Vec<RankedValue> {
    rank_scores(matrix, top_n, sample_std)
}

fn rank_scores<F>(matrix: &SeriesMatrix, top_n: usize, score: F) -> Vec<RankedValue>
where
    F: Fn(&[Option<f64>]) -> Option<f64>,
{
    let mut ranked: Vec<RankedValue> = matrix
        .rows()
        .map(|(category, row)| RankedValue {
            category: category.to_string(),
            value: score(row),
        })
        .collect();

    ranked.sort_by(|a, b| descending_missing_last(a.value, b.value));
    ranked.truncate(top_n);
    ranked
}

/// Drops categories whose values sum to zero over the window (missing counts as zero).
pub fn heatmap_rows(matrix: &SeriesMatrix) -> SeriesMatrix {
    matrix.filter_rows(|_, row| sum(row) != 0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthValue {
    pub month: String,
    pub value: f64,
}

/// Headline numbers for one category over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub format: ValueFormat,
    pub mean: Option<f64>,
    pub min: Option<MonthValue>,
    pub max: Option<MonthValue>,
    pub last_month: String,
    pub last_value: Option<f64>,
    pub previous_month: Option<String>,
    pub previous_value: Option<f64>,
    /// Last month minus the month before it.
    pub change_from_previous: Option<f64>,
}

impl CategorySummary {
    pub fn compute(matrix: &SeriesMatrix, category: &str) -> Result<Self> {
        let row = matrix
            .row_by_label(category)
            .ok_or_else(|| DiagnosticsError::UnknownCategory(category.to_string()))?;
        let months = matrix.months();
        let last_idx = months.len().checked_sub(1).ok_or(DiagnosticsError::EmptyInput)?;

        let at = |(idx, value): (usize, f64)| MonthValue {
            month: months[idx].clone(),
            value,
        };

        let last_value = row[last_idx];
        let previous_idx = last_idx.checked_sub(1);
        let previous_value = previous_idx.and_then(|idx| row[idx]);

        Ok(Self {
            category: category.to_string(),
            format: ValueFormat::detect(category, row),
            mean: mean(row),
            min: min_with_index(row).map(at),
            max: max_with_index(row).map(at),
            last_month: months[last_idx].clone(),
            last_value,
            previous_month: previous_idx.map(|idx| months[idx].clone()),
            previous_value,
            change_from_previous: last_value.zip(previous_value).map(|(l, p)| l - p),
        })
    }
}

/// One KPI in a focus month, compared with the month before and with the
/// average of every earlier month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiComparison {
    pub kpi: String,
    pub category: String,
    pub format: ValueFormat,
    pub focus_month: String,
    pub focus_value: Option<f64>,
    pub previous_month: Option<String>,
    pub previous_value: Option<f64>,
    pub change_from_previous: Option<f64>,
    pub historical_mean: Option<f64>,
    pub change_from_mean: Option<f64>,
}

impl KpiComparison {
    pub fn compute(snapshot: &DatasetSnapshot, kpi_id: &str, focus_month: &str) -> Result<Self> {
        let entry = snapshot.kpis().get(kpi_id)?;
        let matrix = snapshot.matrix();
        let focus_idx = matrix
            .month_index(focus_month)
            .ok_or_else(|| DiagnosticsError::UnknownMonth(focus_month.to_string()))?;
        let row = matrix
            .row(entry.row)
            .ok_or_else(|| DiagnosticsError::UnknownCategory(entry.category.clone()))?;

        let focus_value = row[focus_idx];
        let previous_idx = focus_idx.checked_sub(1);
        let previous_value = previous_idx.and_then(|idx| row[idx]);
        let historical_mean = mean(&row[..focus_idx]);

        Ok(Self {
            kpi: entry.id.clone(),
            category: entry.category.clone(),
            format: ValueFormat::detect(&entry.category, row),
            focus_month: focus_month.to_string(),
            focus_value,
            previous_month: previous_idx.map(|idx| matrix.months()[idx].clone()),
            previous_value,
            change_from_previous: focus_value.zip(previous_value).map(|(f, p)| f - p),
            historical_mean,
            change_from_mean: focus_value.zip(historical_mean).map(|(f, m)| f - m),
        })
    }

    /// Comparisons for every KPI in the snapshot's catalogue, ordered by KPI id.
    pub fn compute_all(snapshot: &DatasetSnapshot, focus_month: &str) -> Result<Vec<Self>> {
        snapshot
            .kpis()
            .iter()
            .map(|entry| Self::compute(snapshot, &entry.id, focus_month))
            .collect()
    }
}
