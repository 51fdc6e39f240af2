use financial_series_diagnostics::*;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;

fn month_labels(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{:04}-{:02}", 2023 + i / 12, i % 12 + 1))
        .collect()
}

/// A sheet shaped like the standard management report: 84 category rows, decimal
/// commas and a scattering of missing cells.
fn management_sheet_csv(months: usize) -> String {
    let mut rng = StdRng::seed_from_u64(42);
    let mut out = String::from("Category");
    for month in month_labels(months) {
        out.push(',');
        out.push_str(&month);
    }
    out.push('\n');

    for row in 0..84 {
        out.push_str(&format!("Line {:02}", row));
        for col in 0..months {
            out.push(',');
            if (row + col) % 11 == 0 {
                continue;
            }
            let base = 100.0 + row as f64 * 10.0;
            let value = base + col as f64 * (row % 5) as f64 + rng.gen_range(-5.0..5.0);
            out.push('"');
            out.push_str(&format!("{:.2}", value).replace('.', ","));
            out.push('"');
        }
        out.push('\n');
    }
    out
}

fn standard_config() -> DiagnosticsConfig {
    let mut config = DiagnosticsConfig {
        groups: standard_group_layout(),
        ..DiagnosticsConfig::default()
    };
    config
        .kpis
        .insert("general_expenses_total".to_string(), "Line 64".to_string());
    config
        .kpis
        .insert("purchases".to_string(), "Line 81".to_string());
    config
}

fn shuffled_columns(matrix: &SeriesMatrix, seed: u64) -> SeriesMatrix {
    let mut order: Vec<usize> = (0..matrix.month_count()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let months: Vec<String> = (0..order.len()).map(|i| format!("slot {}", i)).collect();
    let rows = matrix.rows().map(|(category, row)| {
        (
            category.to_string(),
            order.iter().map(|&col| row[col]).collect::<Vec<_>>(),
        )
    });
    SeriesMatrix::from_rows(months, rows).unwrap()
}

#[test]
fn test_standard_report_round_trip_through_csv() {
    let csv = management_sheet_csv(12);
    let snapshot = DiagnosticsProcessor::from_csv(csv.as_bytes(), &standard_config()).unwrap();

    assert_eq!(snapshot.matrix().category_count(), 84);
    assert_eq!(snapshot.months().len(), 12);
    assert_eq!(snapshot.groups().len(), 7);
    assert_eq!(
        snapshot.groups().names().collect::<Vec<_>>(),
        vec![
            "Cost of Goods Sold",
            "Payroll",
            "Payroll Returns",
            "General Expenses",
            "Inventory",
            "Discounts",
            "Purchases and Inefficiency",
        ]
    );

    let selection = Selection::new("2023-03", "2023-12").with_group("General Expenses");
    let report = DiagnosticsProcessor::diagnose(
        &snapshot,
        &selection,
        RankingCriterion::TrendSlope,
        5,
        RankingPreset::WorstFirst.direction_for(RankingCriterion::TrendSlope),
    )
    .unwrap();

    assert_eq!(report.metrics.len(), 25);
    assert_eq!(report.months.len(), 10);
    assert_eq!(report.ranked.len(), 5);
    for pair in report.ranked.windows(2) {
        assert!(pair[0].trend_slope <= pair[1].trend_slope);
    }
    for metrics in &report.metrics {
        assert!(metrics.last_value.is_finite());
        assert!(metrics.historical_mean.is_finite());
        assert!(metrics.recent_performance.is_finite());
        assert!(metrics.volatility.is_finite());
        assert!(metrics.trend_slope.is_finite());
    }
}

#[test]
fn test_reordered_sheet_fails_group_resolution() {
    let csv = "Category,2024-01,2024-02\nOnly,1,2\nTwo,3,4\n";
    let result = DiagnosticsProcessor::from_csv(csv.as_bytes(), &standard_config());
    assert!(matches!(
        result,
        Err(DiagnosticsError::GroupOutOfBounds { .. })
    ));
}

#[test]
fn test_volatility_is_order_independent_but_trend_is_not() {
    let matrix = SeriesMatrix::from_rows(
        month_labels(6),
        vec![
            ("Growing", vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(6.0)]),
            ("Noisy", vec![Some(9.0), Some(1.0), Some(7.0), Some(3.0), None, Some(4.0)]),
        ],
    )
    .unwrap();
    let original = compute_metrics(&matrix).unwrap();

    let mut trend_changed = false;
    for seed in 0..20 {
        let shuffled = compute_metrics(&shuffled_columns(&matrix, seed)).unwrap();
        for (a, b) in original.iter().zip(&shuffled) {
            assert_eq!(a.category, b.category);
            assert!((a.volatility - b.volatility).abs() < 1e-9);
            if (a.trend_slope - b.trend_slope).abs() > 1e-9 {
                trend_changed = true;
            }
        }
    }
    assert!(trend_changed);

    let reversed = SeriesMatrix::from_rows(
        month_labels(6),
        vec![("Growing", vec![Some(6.0), Some(5.0), Some(4.0), None, Some(2.0), Some(1.0)])],
    )
    .unwrap();
    let reversed_slope = compute_metrics(&reversed).unwrap()[0].trend_slope;
    assert!(original[0].trend_slope > 0.0);
    assert!((reversed_slope + original[0].trend_slope).abs() < 1e-9);
}

#[test]
fn test_historical_mean_is_order_independent() {
    let base = vec![Some(3.0), None, Some(8.0), Some(1.0), Some(4.0), Some(10.0)];
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..10 {
        let mut history = base[..5].to_vec();
        history.shuffle(&mut rng);
        history.push(base[5]);

        let matrix =
            SeriesMatrix::from_rows(month_labels(6), vec![("Row", history)]).unwrap();
        let metrics = compute_metrics(&matrix).unwrap();
        assert!((metrics[0].historical_mean - 4.0).abs() < 1e-12);
        assert!((metrics[0].recent_performance - 6.0).abs() < 1e-12);
    }
}

#[test]
fn test_rank_with_top_n_larger_than_rows() {
    let matrix = SeriesMatrix::from_rows(
        month_labels(3),
        vec![
            ("A", vec![Some(1.0), Some(5.0), Some(2.0)]),
            ("B", vec![Some(1.0), Some(1.0), Some(1.0)]),
            ("C", vec![Some(10.0), Some(0.0), Some(10.0)]),
        ],
    )
    .unwrap();
    let metrics = compute_metrics(&matrix).unwrap();

    let all = rank(&metrics, RankingCriterion::Volatility, 100, SortDirection::Descending);
    let names: Vec<&str> = all.iter().map(|m| m.category.as_str()).collect();
    assert_eq!(names, vec!["C", "A", "B"]);

    let largest = RankingPreset::LargestFirst.rank(&metrics, RankingCriterion::RecentPerformance, 100);
    assert_eq!(largest.len(), 3);
    assert_eq!(largest[0].category, "C");
}

#[test]
fn test_snapshot_store_swaps_on_reupload() {
    let store = SnapshotStore::new();
    let config = standard_config();

    let first = DiagnosticsProcessor::from_csv(management_sheet_csv(6).as_bytes(), &config)
        .unwrap()
        .with_source_name("first.csv");
    store.replace(first);
    let before = store.current().unwrap();

    let second = DiagnosticsProcessor::from_csv(management_sheet_csv(9).as_bytes(), &config)
        .unwrap()
        .with_source_name("second.csv");
    let replaced = store.replace(second).unwrap();

    assert_eq!(replaced.source_name(), Some("first.csv"));
    assert_eq!(before.months().len(), 6);
    assert_eq!(store.current().unwrap().months().len(), 9);
}

#[test]
fn test_kpi_comparisons_from_file() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!(
        "financial_series_diagnostics_{}.csv",
        std::process::id()
    ));
    {
        let mut file = std::fs::File::create(&path)?;
        file.write_all(management_sheet_csv(4).as_bytes())?;
    }

    let snapshot = load_snapshot(&path, &standard_config())?;
    std::fs::remove_file(&path)?;

    assert!(snapshot.source_name().unwrap().starts_with("financial_series_diagnostics_"));

    let comparisons = KpiComparison::compute_all(&snapshot, "2023-04")?;
    assert_eq!(comparisons.len(), 2);
    let purchases = comparisons
        .iter()
        .find(|c| c.kpi == "purchases")
        .expect("purchases KPI");
    assert_eq!(purchases.category, "Line 81");
    assert_eq!(purchases.previous_month.as_deref(), Some("2023-03"));
    assert_eq!(purchases.format, ValueFormat::Number);
    assert!(purchases.historical_mean.is_some());

    Ok(())
}

#[test]
fn test_overview_on_group_window() {
    let snapshot =
        DiagnosticsProcessor::from_csv(management_sheet_csv(12).as_bytes(), &standard_config())
            .unwrap();
    let window = snapshot
        .select(&Selection::new("2023-01", "2023-12").with_group("Inventory"))
        .unwrap();

    let by_mean = rank_by_mean(&window, 3);
    assert_eq!(by_mean.len(), 3);
    assert_eq!(by_mean[0].category, "Line 68");

    let heat = heatmap_rows(&window);
    assert_eq!(heat.category_count(), 4);

    let summary = CategorySummary::compute(&window, "Line 65").unwrap();
    assert_eq!(summary.last_month, "2023-12");
    assert!(summary.mean.is_some());
    assert_eq!(
        format_value(summary.mean, summary.format).contains(','),
        summary.mean.unwrap() >= 1000.0
    );
}

#[test]
fn test_negative_zero_cells_tie_with_zero() {
    let csv = "Category,2024-01,2024-02,2024-03\nA,1,1,1\nB,0,0,\"-0,00\"\n";
    let snapshot = DiagnosticsProcessor::from_csv(csv.as_bytes(), &DiagnosticsConfig::default()).unwrap();
    let report = DiagnosticsProcessor::diagnose(
        &snapshot,
        &Selection::new("2024-01", "2024-03"),
        RankingCriterion::RecentPerformance,
        2,
        SortDirection::Ascending,
    )
    .unwrap();

    let names: Vec<&str> = report.ranked.iter().map(|m| m.category.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert!(report.metrics[1].recent_performance.is_sign_positive());
    assert!(!report.to_json().unwrap().contains("-0.0"));
}

#[test]
fn test_standard_kpi_catalogue_on_management_sheet() {
    let matrix =
        read_matrix_csv(management_sheet_csv(6).as_bytes(), &IngestionOptions::default()).unwrap();
    let config = DiagnosticsConfig {
        groups: standard_group_layout(),
        kpis: standard_kpi_mapping(&matrix).unwrap(),
        ..DiagnosticsConfig::default()
    };
    let snapshot = DatasetSnapshot::new(matrix, &config).unwrap();

    let comparisons = KpiComparison::compute_all(&snapshot, "2023-06").unwrap();
    assert_eq!(comparisons.len(), STANDARD_KPI_ROWS.len());
    let general = comparisons.iter().find(|c| c.kpi == "general_expenses").unwrap();
    assert_eq!(general.category, "Line 64");
    assert_eq!(general.previous_month.as_deref(), Some("2023-05"));
}

#[cfg(feature = "xlsx")]
#[test]
fn test_workbook_ingestion() -> anyhow::Result<()> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("management_sheet.xlsx");

    let matrix = load_matrix(&path, &IngestionOptions::default())?;

    // Date-typed headers come through as ISO dates; the blank column is pruned.
    assert_eq!(matrix.months(), &["2024-01-01", "2024-02-01", "2024-03-01"]);
    // The blank row and the text-only "Notes" row are pruned.
    assert_eq!(matrix.categories(), &["Sales", "Rent", "CMV %"]);

    assert_eq!(matrix.row_by_label("Sales").unwrap(), &[Some(100.5), Some(200.0), Some(300.0)]);
    assert_eq!(matrix.row_by_label("Rent").unwrap(), &[Some(50.0), Some(12.5), None]);
    assert_eq!(matrix.value("CMV %", "2024-03-01"), Some(0.28));

    let snapshot = DiagnosticsProcessor::load(&path, &DiagnosticsConfig::default())?;
    assert_eq!(snapshot.source_name(), Some("management_sheet.xlsx"));
    let metrics = snapshot.diagnose(&Selection::new("2024-01-01", "2024-03-01"))?;
    assert_eq!(metrics[0].historical_mean, 150.25);

    Ok(())
}
