use crate::error::{DiagnosticsError, Result};
use crate::utils::parse_month_label;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ops::{Range, RangeInclusive};
use std::path::Path;

/// A rectangular table of monthly values: one row per category, one column per month.
///
/// Labels are unique on both axes and month columns are kept in chronological order.
/// A cell is either a finite number or `None` when nothing was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesMatrixData")]
pub struct SeriesMatrix {
    categories: Vec<String>,
    months: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

#[derive(Deserialize)]
struct SeriesMatrixData {
    categories: Vec<String>,
    months: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl TryFrom<SeriesMatrixData> for SeriesMatrix {
    type Error = DiagnosticsError;

    fn try_from(data: SeriesMatrixData) -> Result<Self> {
        SeriesMatrix::new(data.categories, data.months, data.values)
    }
}

impl SeriesMatrix {
    pub fn new(
        categories: Vec<String>,
        months: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if categories.len() != values.len() {
            return Err(DiagnosticsError::ShapeMismatch {
                category: format!("<{} labels>", categories.len()),
                expected: categories.len(),
                found: values.len(),
            });
        }

        ensure_unique("category", &categories)?;
        ensure_unique("month", &months)?;
        ensure_chronological(&months)?;

        for (category, row) in categories.iter().zip(&values) {
            if row.len() != months.len() {
                return Err(DiagnosticsError::ShapeMismatch {
                    category: category.clone(),
                    expected: months.len(),
                    found: row.len(),
                });
            }
            if let Some(pos) = row.iter().position(|v| matches!(v, Some(x) if !x.is_finite())) {
                return Err(DiagnosticsError::NonFiniteValue {
                    category: category.clone(),
                    month: months[pos].clone(),
                });
            }
        }

        Ok(Self {
            categories,
            months,
            values,
        })
    }

    /// Builds a matrix from `(category, row)` pairs.
    pub fn from_rows<S: Into<String>>(
        months: Vec<String>,
        rows: impl IntoIterator<Item = (S, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        let (categories, values): (Vec<String>, Vec<Vec<Option<f64>>>) =
            rows.into_iter().map(|(c, r)| (c.into(), r)).unzip();
        Self::new(categories, months, values)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn months(&self) -> &[String] {
        &self.months
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn month_count(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() || self.months.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[Option<f64>]> {
        self.values.get(index).map(Vec::as_slice)
    }

    pub fn row_by_label(&self, category: &str) -> Option<&[Option<f64>]> {
        self.category_index(category).and_then(|idx| self.row(idx))
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.categories
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }

    pub fn category_index(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    pub fn month_index(&self, month: &str) -> Option<usize> {
        self.months.iter().position(|m| m == month)
    }

    pub fn value(&self, category: &str, month: &str) -> Option<f64> {
        let col = self.month_index(month)?;
        self.row_by_label(category)?.get(col).copied().flatten()
    }

    /// Owned sub-matrix over a row range and an inclusive month-column range.
    pub fn slice(&self, rows: Range<usize>, months: RangeInclusive<usize>) -> Result<Self> {
        if rows.end > self.categories.len() || rows.start > rows.end {
            return Err(DiagnosticsError::InvalidGroup {
                group: format!("rows {}..{}", rows.start, rows.end),
                details: format!("matrix has {} category rows", self.categories.len()),
            });
        }
        let (start, end) = (*months.start(), *months.end());
        if end >= self.months.len() {
            return Err(DiagnosticsError::MonthOutOfRange {
                index: end,
                months: self.months.len(),
            });
        }
        if start > end {
            return Err(DiagnosticsError::InvalidWindow {
                start: self
                    .months
                    .get(start)
                    .cloned()
                    .unwrap_or_else(|| start.to_string()),
                end: self.months[end].clone(),
            });
        }

        Ok(Self {
            categories: self.categories[rows.clone()].to_vec(),
            months: self.months[start..=end].to_vec(),
            values: self.values[rows]
                .iter()
                .map(|row| row[start..=end].to_vec())
                .collect(),
        })
    }

    /// Keeps the rows for which `keep` returns true, in their original order.
    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&str, &[Option<f64>]) -> bool,
    {
        let (categories, values) = self
            .categories
            .iter()
            .zip(&self.values)
            .filter(|(c, r)| keep(c.as_str(), r.as_slice()))
            .map(|(c, r)| (c.clone(), r.clone()))
            .unzip();

        Self {
            categories,
            months: self.months.clone(),
            values,
        }
    }
}

fn ensure_unique(axis: &'static str, labels: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(DiagnosticsError::DuplicateLabel {
                axis,
                label: label.clone(),
            });
        }
    }
    Ok(())
}

// Only enforced when every label is a recognisable month.
fn ensure_chronological(months: &[String]) -> Result<()> {
    let parsed: Option<Vec<_>> = months.iter().map(|m| parse_month_label(m)).collect();
    let Some(dates) = parsed else {
        return Ok(());
    };

    for (i, pair) in dates.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(DiagnosticsError::NonChronologicalMonths {
                previous: months[i].clone(),
                next: months[i + 1].clone(),
            });
        }
    }
    Ok(())
}

/// Diagnostic metrics for one category over the selected window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryMetrics {
    pub category: String,
    /// Value in the most recent month of the window.
    pub last_value: f64,
    /// Mean of every earlier month in the window.
    pub historical_mean: f64,
    /// `last_value - historical_mean`.
    pub recent_performance: f64,
    /// Sample standard deviation over the whole window.
    pub volatility: f64,
    /// Least-squares growth per month.
    pub trend_slope: f64,
}

impl CategoryMetrics {
    pub fn metric(&self, criterion: RankingCriterion) -> f64 {
        match criterion {
            RankingCriterion::TrendSlope => self.trend_slope,
            RankingCriterion::RecentPerformance => self.recent_performance,
            RankingCriterion::Volatility => self.volatility,
        }
    }
}

/// Metrics before the neutral-default substitution; `None` means the value is
/// undefined for the available data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCategoryMetrics {
    pub category: String,
    pub last_value: Option<f64>,
    pub historical_mean: Option<f64>,
    pub recent_performance: Option<f64>,
    pub volatility: Option<f64>,
    pub trend_slope: Option<f64>,
}

impl RawCategoryMetrics {
    pub const FILL_VALUE: f64 = 0.0;

    /// Replaces every undefined metric with the neutral default. Negative zero is
    /// folded into `0.0`.
    pub fn filled(&self) -> CategoryMetrics {
        let fill = |v: Option<f64>| {
            v.filter(|x| x.is_finite())
                .map(|x| x + 0.0)
                .unwrap_or(Self::FILL_VALUE)
        };
        CategoryMetrics {
            category: self.category.clone(),
            last_value: fill(self.last_value),
            historical_mean: fill(self.historical_mean),
            recent_performance: fill(self.recent_performance),
            volatility: fill(self.volatility),
            trend_slope: fill(self.trend_slope),
        }
    }

    pub fn has_history(&self) -> bool {
        self.historical_mean.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RankingCriterion {
    #[schemars(description = "Least-squares slope of the values against month position")]
    TrendSlope,

    #[schemars(description = "Last month minus the mean of the earlier months")]
    RecentPerformance,

    #[schemars(description = "Sample standard deviation over the window")]
    Volatility,
}

impl RankingCriterion {
    pub const ALL: [RankingCriterion; 3] = [
        RankingCriterion::TrendSlope,
        RankingCriterion::RecentPerformance,
        RankingCriterion::Volatility,
    ];

    pub fn field_name(&self) -> &'static str {
        match self {
            RankingCriterion::TrendSlope => "trend_slope",
            RankingCriterion::RecentPerformance => "recent_performance",
            RankingCriterion::Volatility => "volatility",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Abscissa used for the trend regression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendAxis {
    #[default]
    #[schemars(
        description = "Missing months are dropped and the remaining values are indexed 0, 1, 2, ... in order"
    )]
    Compacted,

    #[schemars(
        description = "Values keep their original month position, so gaps widen the distance between points"
    )]
    Positional,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct DiagnosticsOptions {
    #[serde(default)]
    pub trend_axis: TrendAxis,
}

/// Rows covered by a named group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupSpan {
    #[schemars(description = "Inclusive 0-based category row indices")]
    Rows { first: usize, last: usize },

    #[schemars(description = "Inclusive range between two category labels")]
    Labels { first: String, last: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct GroupDefinition {
    #[schemars(description = "Display name of the group, e.g. 'Payroll'")]
    pub name: String,

    #[schemars(description = "The contiguous block of category rows belonging to the group")]
    pub span: GroupSpan,
}

impl GroupDefinition {
    pub fn rows(name: impl Into<String>, first: usize, last: usize) -> Self {
        Self {
            name: name.into(),
            span: GroupSpan::Rows { first, last },
        }
    }

    pub fn labels(name: impl Into<String>, first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: GroupSpan::Labels {
                first: first.into(),
                last: last.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecimalSeparator {
    /// Every `,` becomes a decimal point (`12,5` -> 12.5).
    #[default]
    Comma,
    /// `.` groups thousands and `,` is the decimal point (`1.234,5` -> 1234.5).
    CommaWithDotThousands,
    /// `,` groups thousands and `.` is the decimal point (`1,234.5` -> 1234.5).
    Dot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct IngestionOptions {
    #[serde(default)]
    pub decimal_separator: DecimalSeparator,

    #[serde(default = "default_delimiter")]
    #[schemars(description = "Field delimiter for CSV input")]
    pub delimiter: char,

    #[serde(default)]
    #[schemars(description = "Interpret a trailing '%' as a ratio (12% -> 0.12)")]
    pub percent_signs: bool,
}

fn default_delimiter() -> char {
    ','
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            decimal_separator: DecimalSeparator::default(),
            delimiter: default_delimiter(),
            percent_signs: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    #[schemars(description = "Named category groups, in display order")]
    pub groups: Vec<GroupDefinition>,

    #[serde(default)]
    #[schemars(description = "Stable KPI identifiers mapped to the category label that holds them")]
    pub kpis: BTreeMap<String, String>,

    #[serde(default)]
    pub trend_axis: TrendAxis,

    #[serde(default)]
    pub ingestion: IngestionOptions,
}

impl DiagnosticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn options(&self) -> DiagnosticsOptions {
        DiagnosticsOptions {
            trend_axis: self.trend_axis,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DiagnosticsConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
