//! # Financial Series Diagnostics
//!
//! A library for diagnosing monthly financial line items. A sheet of categories
//! (rows) by months (columns) is ingested once into an immutable snapshot; every
//! analysis then works on a selected group of categories over a month window.
//!
//! ## Core Concepts
//!
//! - **Series matrix**: categories × chronologically ordered months, each cell a number or missing
//! - **Group**: a named, contiguous block of category rows, validated when the sheet is loaded
//! - **Window**: the inclusive month range under analysis; its last month is the "current" one
//! - **Diagnostics**: last value, historical mean, recent performance, volatility and trend slope
//!   per category, with rankings to surface the categories that need attention
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_series_diagnostics::*;
//!
//! let config = DiagnosticsConfig {
//!     groups: standard_group_layout(),
//!     ..DiagnosticsConfig::default()
//! };
//!
//! let snapshot = DiagnosticsProcessor::load("management_report.csv", &config)?;
//! let selection = Selection::new("2024-01", "2024-06").with_group("General Expenses");
//!
//! let report = DiagnosticsProcessor::diagnose(
//!     &snapshot,
//!     &selection,
//!     RankingCriterion::Volatility,
//!     5,
//!     SortDirection::Descending,
//! )?;
//!
//! for metrics in &report.ranked {
//!     println!("{}: {:.2}", metrics.category, metrics.volatility);
//! }
//! ```

pub mod diagnostics;
pub mod error;
pub mod groups;
pub mod ingestion;
pub mod overview;
pub mod schema;
pub mod snapshot;
pub mod stats;
pub mod utils;

pub use diagnostics::{
    compute_metrics, compute_metrics_with, compute_raw_metrics, rank, RankingPreset,
    SeriesDiagnostics, MIN_WINDOW_MONTHS,
};
pub use error::{DiagnosticsError, Result};
pub use groups::{
    standard_group_layout, standard_kpi_mapping, GroupMap, KpiCatalog, KpiEntry, ResolvedGroup,
    STANDARD_KPI_ROWS,
};
pub use ingestion::{build_matrix, load_matrix, parse_cell, read_matrix_csv, RawCell};
pub use overview::{
    heatmap_rows, rank_by_mean, rank_by_volatility, CategorySummary, KpiComparison, MonthValue,
    RankedValue,
};
pub use schema::*;
pub use snapshot::{DatasetSnapshot, Selection, SnapshotStore};
pub use utils::{format_value, parse_month_label, ValueFormat};

#[cfg(feature = "xlsx")]
pub use ingestion::read_matrix_workbook;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Diagnostics for one selection: every category's metrics in row order, plus the
/// top categories under the requested ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub selection: Selection,
    pub months: Vec<String>,
    pub criterion: RankingCriterion,
    pub direction: SortDirection,
    pub metrics: Vec<CategoryMetrics>,
    pub ranked: Vec<CategoryMetrics>,
}

impl DiagnosticReport {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct DiagnosticsProcessor;

impl DiagnosticsProcessor {
    /// Reads a sheet from disk and resolves the configured groups and KPIs against it.
    pub fn load(path: impl AsRef<Path>, config: &DiagnosticsConfig) -> Result<DatasetSnapshot> {
        let path = path.as_ref();
        let matrix = load_matrix(path, &config.ingestion)?;
        let snapshot = DatasetSnapshot::new(matrix, config)?;

        Ok(match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => snapshot.with_source_name(name),
            None => snapshot,
        })
    }

    pub fn from_csv<R: Read>(reader: R, config: &DiagnosticsConfig) -> Result<DatasetSnapshot> {
        let matrix = read_matrix_csv(reader, &config.ingestion)?;
        DatasetSnapshot::new(matrix, config)
    }

    pub fn diagnose(
        snapshot: &DatasetSnapshot,
        selection: &Selection,
        criterion: RankingCriterion,
        top_n: usize,
        direction: SortDirection,
    ) -> Result<DiagnosticReport> {
        let window = snapshot.select(selection)?;
        let metrics = SeriesDiagnostics::new(*snapshot.options()).compute(&window)?;
        let ranked = rank(&metrics, criterion, top_n, direction);

        info!(
            "Diagnosed {} categories over {} months ({} to {}) in group {}",
            metrics.len(),
            window.month_count(),
            selection.start_month,
            selection.end_month,
            selection.group.as_deref().unwrap_or("<all>")
        );
        debug!(
            "Top {} by {} ({:?}): {:?}",
            ranked.len(),
            criterion.field_name(),
            direction,
            ranked.iter().map(|m| m.category.as_str()).collect::<Vec<_>>()
        );

        Ok(DiagnosticReport {
            selection: selection.clone(),
            months: window.months().to_vec(),
            criterion,
            direction,
            metrics,
            ranked,
        })
    }
}

pub fn load_snapshot(path: impl AsRef<Path>, config: &DiagnosticsConfig) -> Result<DatasetSnapshot> {
    DiagnosticsProcessor::load(path, config)
}

pub fn diagnose_selection(
    snapshot: &DatasetSnapshot,
    selection: &Selection,
    criterion: RankingCriterion,
    top_n: usize,
    direction: SortDirection,
) -> Result<DiagnosticReport> {
    DiagnosticsProcessor::diagnose(snapshot, selection, criterion, top_n, direction)
}
