use crate::error::{DiagnosticsError, Result};
use crate::schema::{GroupDefinition, GroupSpan, SeriesMatrix};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

/// A group pinned to concrete rows of one matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGroup {
    pub name: String,
    pub first_row: usize,
    pub last_row: usize,
    pub first_category: String,
    pub last_category: String,
}

impl ResolvedGroup {
    pub fn rows(&self) -> Range<usize> {
        self.first_row..self.last_row + 1
    }
}

/// Named category groups validated against a matrix, kept in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMap {
    groups: Vec<ResolvedGroup>,
}

impl GroupMap {
    /// Pins every definition to rows of `matrix`.
    ///
    /// Fails when a group points past the end of the sheet, names a category that is
    /// not there, or is inverted, so a reshaped sheet never silently shifts groups.
    pub fn resolve(definitions: &[GroupDefinition], matrix: &SeriesMatrix) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut groups = Vec::with_capacity(definitions.len());

        for def in definitions {
            if !seen.insert(def.name.as_str()) {
                return Err(DiagnosticsError::InvalidGroup {
                    group: def.name.clone(),
                    details: "group name is defined more than once".to_string(),
                });
            }

            let (first, last) = match &def.span {
                GroupSpan::Rows { first, last } => (*first, *last),
                GroupSpan::Labels { first, last } => (
                    matrix
                        .category_index(first)
                        .ok_or_else(|| DiagnosticsError::UnknownCategory(first.clone()))?,
                    matrix
                        .category_index(last)
                        .ok_or_else(|| DiagnosticsError::UnknownCategory(last.clone()))?,
                ),
            };

            if first > last {
                return Err(DiagnosticsError::InvalidGroup {
                    group: def.name.clone(),
                    details: format!("first row {} comes after last row {}", first, last),
                });
            }

            if last >= matrix.category_count() {
                return Err(DiagnosticsError::GroupOutOfBounds {
                    group: def.name.clone(),
                    last,
                    rows: matrix.category_count(),
                });
            }

            let categories = matrix.categories();
            debug!(
                "Group '{}' resolved to rows {}..={} ('{}' to '{}')",
                def.name, first, last, categories[first], categories[last]
            );

            groups.push(ResolvedGroup {
                name: def.name.clone(),
                first_row: first,
                last_row: last,
                first_category: categories[first].clone(),
                last_category: categories[last].clone(),
            });
        }

        Ok(Self { groups })
    }

    pub fn get(&self, name: &str) -> Result<&ResolvedGroup> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| DiagnosticsError::UnknownGroup(name.to_string()))
    }

    pub fn range(&self, name: &str) -> Result<Range<usize>> {
        self.get(name).map(ResolvedGroup::rows)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Group layout of the standard monthly management sheet. Indices are 0-based
/// category rows; row 0 belongs to no group.
pub fn standard_group_layout() -> Vec<GroupDefinition> {
    vec![
        GroupDefinition::rows("Cost of Goods Sold", 1, 9),
        GroupDefinition::rows("Payroll", 10, 28),
        GroupDefinition::rows("Payroll Returns", 29, 39),
        GroupDefinition::rows("General Expenses", 40, 64),
        GroupDefinition::rows("Inventory", 65, 68),
        GroupDefinition::rows("Discounts", 69, 80),
        GroupDefinition::rows("Purchases and Inefficiency", 81, 83),
    ]
}

/// KPI rows of the standard monthly management sheet as `(id, row)` pairs.
pub const STANDARD_KPI_ROWS: [(&str, usize); 10] = [
    ("cogs_total", 6),
    ("cogs_food_beverage", 7),
    ("inefficiency_pct", 8),
    ("inefficiency_amount", 9),
    ("payroll_expenses", 39),
    ("general_expenses", 64),
    ("discounts", 80),
    ("purchases", 81),
    ("purchase_inefficiency_pct", 82),
    ("purchase_inefficiency_amount", 83),
];

/// Maps each standard KPI id to the category label found at its row, ready to be
/// used as [`DiagnosticsConfig::kpis`](crate::schema::DiagnosticsConfig::kpis).
///
/// ```rust,ignore
/// let matrix = load_matrix("management_report.xlsx", &IngestionOptions::default())?;
/// let config = DiagnosticsConfig {
///     groups: standard_group_layout(),
///     kpis: standard_kpi_mapping(&matrix)?,
///     ..DiagnosticsConfig::default()
/// };
/// let snapshot = DatasetSnapshot::new(matrix, &config)?;
/// let kpis = KpiComparison::compute_all(&snapshot, "2024-06-01")?;
/// ```
pub fn standard_kpi_mapping(matrix: &SeriesMatrix) -> Result<BTreeMap<String, String>> {
    STANDARD_KPI_ROWS
        .iter()
        .map(|&(id, row)| {
            let category = matrix.categories().get(row).ok_or_else(|| {
                DiagnosticsError::KpiOutOfBounds {
                    kpi: id.to_string(),
                    row,
                    rows: matrix.category_count(),
                }
            })?;
            Ok((id.to_string(), category.clone()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiEntry {
    pub id: String,
    pub category: String,
    pub row: usize,
}

/// Stable KPI identifiers bound to the category rows that carry them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiCatalog {
    entries: BTreeMap<String, KpiEntry>,
}

impl KpiCatalog {
    pub fn resolve(mapping: &BTreeMap<String, String>, matrix: &SeriesMatrix) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for (id, category) in mapping {
            let row = matrix
                .category_index(category)
                .ok_or_else(|| DiagnosticsError::UnknownCategory(category.clone()))?;

            entries.insert(
                id.clone(),
                KpiEntry {
                    id: id.clone(),
                    category: category.clone(),
                    row,
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Result<&KpiEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| DiagnosticsError::UnknownKpi(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &KpiEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
