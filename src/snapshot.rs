use crate::diagnostics::SeriesDiagnostics;
use crate::error::{DiagnosticsError, Result};
use crate::groups::{GroupMap, KpiCatalog};
use crate::schema::{CategoryMetrics, DiagnosticsConfig, DiagnosticsOptions, SeriesMatrix};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::{Arc, PoisonError, RwLock};

/// The slice of a dataset under analysis: an inclusive month range and, optionally,
/// one named group of categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub group: Option<String>,
    pub start_month: String,
    pub end_month: String,
}

impl Selection {
    pub fn new(start_month: impl Into<String>, end_month: impl Into<String>) -> Self {
        Self {
            group: None,
            start_month: start_month.into(),
            end_month: end_month.into(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// An ingested dataset with its group and KPI mappings resolved. Never mutated;
/// a new upload produces a new snapshot.
#[derive(Debug, Clone)]
pub struct DatasetSnapshot {
    source_name: Option<String>,
    matrix: SeriesMatrix,
    groups: GroupMap,
    kpis: KpiCatalog,
    options: DiagnosticsOptions,
}

impl DatasetSnapshot {
    pub fn new(matrix: SeriesMatrix, config: &DiagnosticsConfig) -> Result<Self> {
        let groups = GroupMap::resolve(&config.groups, &matrix)?;
        let kpis = KpiCatalog::resolve(&config.kpis, &matrix)?;

        info!(
            "Built dataset snapshot: {} categories, {} months, {} groups, {} KPIs",
            matrix.category_count(),
            matrix.month_count(),
            groups.len(),
            kpis.len()
        );

        Ok(Self {
            source_name: None,
            matrix,
            groups,
            kpis,
            options: config.options(),
        })
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn matrix(&self) -> &SeriesMatrix {
        &self.matrix
    }

    pub fn groups(&self) -> &GroupMap {
        &self.groups
    }

    pub fn kpis(&self) -> &KpiCatalog {
        &self.kpis
    }

    pub fn months(&self) -> &[String] {
        self.matrix.months()
    }

    pub fn options(&self) -> &DiagnosticsOptions {
        &self.options
    }

    /// Column indices of an inclusive month range.
    pub fn month_range(&self, start: &str, end: &str) -> Result<RangeInclusive<usize>> {
        let start_idx = self
            .matrix
            .month_index(start)
            .ok_or_else(|| DiagnosticsError::UnknownMonth(start.to_string()))?;
        let end_idx = self
            .matrix
            .month_index(end)
            .ok_or_else(|| DiagnosticsError::UnknownMonth(end.to_string()))?;

        if start_idx > end_idx {
            return Err(DiagnosticsError::InvalidWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        Ok(start_idx..=end_idx)
    }

    pub fn select(&self, selection: &Selection) -> Result<SeriesMatrix> {
        let months = self.month_range(&selection.start_month, &selection.end_month)?;
        let rows = match &selection.group {
            Some(name) => self.groups.range(name)?,
            None => 0..self.matrix.category_count(),
        };

        debug!(
            "Selecting rows {:?} and months {:?} ({:?})",
            rows, months, selection.group
        );

        self.matrix.slice(rows, months)
    }

    /// Diagnostics for a selection, using the snapshot's configured options.
    pub fn diagnose(&self, selection: &Selection) -> Result<Vec<CategoryMetrics>> {
        let window = self.select(selection)?;
        SeriesDiagnostics::new(self.options).compute(&window)
    }
}

/// Holds the active snapshot. Replacing it swaps the whole dataset at once; readers
/// holding the previous `Arc` keep a consistent view.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<DatasetSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<DatasetSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs `snapshot` and returns the one it replaced.
    pub fn replace(&self, snapshot: DatasetSnapshot) -> Option<Arc<DatasetSnapshot>> {
        let snapshot = Arc::new(snapshot);
        debug!(
            "Replacing active snapshot with {}",
            snapshot.source_name().unwrap_or("<unnamed>")
        );
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(snapshot)
    }

    pub fn clear(&self) -> Option<Arc<DatasetSnapshot>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
