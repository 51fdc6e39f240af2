use crate::error::{DiagnosticsError, Result};
use crate::schema::{DecimalSeparator, IngestionOptions, SeriesMatrix};
use log::{debug, info};
use std::io::Read;
use std::path::Path;

/// A sheet cell before numeric coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
}

impl RawCell {
    fn label(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.trim().to_string(),
            RawCell::Number(n) => n.to_string(),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            RawCell::Number(_) => false,
        }
    }
}

/// Reads a CSV sheet: the first row holds month labels, the first column category labels.
pub fn read_matrix_csv<R: Read>(reader: R, options: &IngestionOptions) -> Result<SeriesMatrix> {
    let delimiter = u8::try_from(options.delimiter).map_err(|_| {
        DiagnosticsError::Spreadsheet(format!(
            "CSV delimiter must be a single-byte character, got '{}'",
            options.delimiter
        ))
    })?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| RawCell::Text(field.to_string()))
                .collect(),
        );
    }

    build_matrix(rows, options)
}

/// Loads a sheet from disk, choosing the reader by file extension.
pub fn load_matrix(path: impl AsRef<Path>, options: &IngestionOptions) -> Result<SeriesMatrix> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let matrix = match ext.as_str() {
        "csv" | "txt" => read_matrix_csv(std::fs::File::open(path)?, options)?,
        #[cfg(feature = "xlsx")]
        "xlsx" | "xlsm" | "xls" | "ods" => read_matrix_workbook(path, options)?,
        _ => return Err(DiagnosticsError::UnsupportedFormat(ext)),
    };

    info!(
        "Loaded {} categories x {} months from {}",
        matrix.category_count(),
        matrix.month_count(),
        path.display()
    );

    Ok(matrix)
}

/// Reads the first worksheet of a workbook.
#[cfg(feature = "xlsx")]
pub fn read_matrix_workbook(path: &Path, options: &IngestionOptions) -> Result<SeriesMatrix> {
    use calamine::{open_workbook_auto, Data, Reader};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| DiagnosticsError::Spreadsheet(format!("Cannot open workbook: {e}")))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DiagnosticsError::Spreadsheet("No sheets found".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| DiagnosticsError::Spreadsheet(format!("Cannot read sheet: {e}")))?;

    let rows = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => RawCell::Empty,
                    Data::Float(f) => RawCell::Number(*f),
                    Data::Int(i) => RawCell::Number(*i as f64),
                    Data::String(s) => RawCell::Text(s.clone()),
                    Data::Bool(b) => RawCell::Text(b.to_string()),
                    Data::DateTime(dt) => match dt.as_datetime() {
                        Some(datetime) => RawCell::Text(datetime.format("%Y-%m-%d").to_string()),
                        None => RawCell::Number(dt.as_f64()),
                    },
                    Data::DateTimeIso(s) => RawCell::Text(s.clone()),
                    Data::DurationIso(s) => RawCell::Text(s.clone()),
                    Data::Error(_) => RawCell::Empty,
                })
                .collect()
        })
        .collect();

    build_matrix(rows, options)
}

/// Turns raw sheet rows into a validated matrix.
///
/// Cells that cannot be read as numbers become missing. Rows and then columns with no
/// recorded value at all are dropped.
pub fn build_matrix(rows: Vec<Vec<RawCell>>, options: &IngestionOptions) -> Result<SeriesMatrix> {
    let mut rows = rows.into_iter();
    let header = rows.next().ok_or(DiagnosticsError::EmptyInput)?;

    let months: Vec<String> = header
        .iter()
        .enumerate()
        .skip(1)
        .map(|(idx, cell)| match cell.label() {
            label if label.is_empty() => format!("Unnamed: {}", idx),
            label => label,
        })
        .collect();

    let mut coerced = 0usize;
    let mut dropped_rows = 0usize;
    let mut categories = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = Vec::new();

    for (line, row) in rows.enumerate() {
        let parsed: Vec<Option<f64>> = (0..months.len())
            .map(|col| match row.get(col + 1) {
                None => None,
                Some(cell) => {
                    let value = parse_cell(cell, options);
                    if value.is_none() && !cell.is_blank() && !is_missing_marker(cell) {
                        coerced += 1;
                    }
                    value
                }
            })
            .collect();

        if parsed.iter().all(Option::is_none) {
            dropped_rows += 1;
            continue;
        }

        let label = row.first().map(RawCell::label).unwrap_or_default();
        if label.is_empty() {
            return Err(DiagnosticsError::Spreadsheet(format!(
                "Row {} has values but no category label",
                line + 2
            )));
        }

        categories.push(label);
        values.push(parsed);
    }

    let kept_columns: Vec<usize> = (0..months.len())
        .filter(|&col| values.iter().any(|row| row[col].is_some()))
        .collect();

    if categories.is_empty() || kept_columns.is_empty() {
        return Err(DiagnosticsError::EmptyInput);
    }

    debug!(
        "Ingestion dropped {} empty rows and {} empty columns; {} cells coerced to missing",
        dropped_rows,
        months.len() - kept_columns.len(),
        coerced
    );

    let months = kept_columns.iter().map(|&col| months[col].clone()).collect();
    let values = values
        .into_iter()
        .map(|row| kept_columns.iter().map(|&col| row[col]).collect())
        .collect();

    SeriesMatrix::new(categories, months, values)
}

fn is_missing_marker(cell: &RawCell) -> bool {
    match cell {
        RawCell::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "-" | "nan" | "n/a" | "na" | "null"
        ),
        _ => false,
    }
}

/// Coerces a single cell to a number, honouring the configured decimal convention.
pub fn parse_cell(cell: &RawCell, options: &IngestionOptions) -> Option<f64> {
    let text = match cell {
        RawCell::Empty => return None,
        RawCell::Number(n) => return Some(*n).filter(|v| v.is_finite()),
        RawCell::Text(s) => s.trim(),
    };

    if text.is_empty() || is_missing_marker(cell) {
        return None;
    }

    let (body, is_percent) = match text.strip_suffix('%') {
        Some(body) if options.percent_signs => (body.trim_end(), true),
        _ => (text, false),
    };

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = match options.decimal_separator {
        DecimalSeparator::Comma => compact.replace(',', "."),
        DecimalSeparator::CommaWithDotThousands => compact.replace('.', "").replace(',', "."),
        DecimalSeparator::Dot => compact.replace(',', ""),
    };

    let value = normalized.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(if is_percent { value / 100.0 } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    #[test]
    fn test_parse_cell_decimal_conventions() {
        let comma = IngestionOptions::default();
        assert_eq!(parse_cell(&text("12,5"), &comma), Some(12.5));
        assert_eq!(parse_cell(&text(" -3,25 "), &comma), Some(-3.25));
        assert_eq!(parse_cell(&text("7"), &comma), Some(7.0));

        let european = IngestionOptions {
            decimal_separator: DecimalSeparator::CommaWithDotThousands,
            ..IngestionOptions::default()
        };
        assert_eq!(parse_cell(&text("1.234,5"), &european), Some(1234.5));

        let dot = IngestionOptions {
            decimal_separator: DecimalSeparator::Dot,
            ..IngestionOptions::default()
        };
        assert_eq!(parse_cell(&text("1,234.5"), &dot), Some(1234.5));
        assert_eq!(parse_cell(&RawCell::Number(1234.5), &european), Some(1234.5));
    }

    #[test]
    fn test_parse_cell_missing_and_garbage() {
        let options = IngestionOptions::default();
        assert_eq!(parse_cell(&RawCell::Empty, &options), None);
        assert_eq!(parse_cell(&text(""), &options), None);
        assert_eq!(parse_cell(&text("-"), &options), None);
        assert_eq!(parse_cell(&text("NaN"), &options), None);
        assert_eq!(parse_cell(&text("abc"), &options), None);
        assert_eq!(parse_cell(&text("inf"), &options), None);
    }

    #[test]
    fn test_parse_cell_percent_signs() {
        let plain = IngestionOptions::default();
        assert_eq!(parse_cell(&text("12%"), &plain), None);

        let percent = IngestionOptions {
            percent_signs: true,
            ..IngestionOptions::default()
        };
        assert_eq!(parse_cell(&text("12,5 %"), &percent), Some(0.125));
    }

    #[test]
    fn test_read_csv_drops_empty_rows_and_columns() {
        let data = "\
Category,Jan/2024,Feb/2024,,Mar/2024
Sales,\"100,5\",200,,300
,,,,
Rent,50,,,x
Empty,,,,
";
        let matrix = read_matrix_csv(data.as_bytes(), &IngestionOptions::default()).unwrap();
        assert_eq!(matrix.categories(), &["Sales".to_string(), "Rent".to_string()]);
        assert_eq!(
            matrix.months(),
            &["Jan/2024".to_string(), "Feb/2024".to_string(), "Mar/2024".to_string()]
        );
        assert_eq!(matrix.row(0).unwrap(), &[Some(100.5), Some(200.0), Some(300.0)]);
        assert_eq!(matrix.row(1).unwrap(), &[Some(50.0), None, None]);
    }

    #[test]
    fn test_read_csv_semicolon_delimiter() {
        let data = "Category;2024-01;2024-02\nSales;1,5;2,5\n";
        let options = IngestionOptions {
            delimiter: ';',
            ..IngestionOptions::default()
        };
        let matrix = read_matrix_csv(data.as_bytes(), &options).unwrap();
        assert_eq!(matrix.row(0).unwrap(), &[Some(1.5), Some(2.5)]);
    }

    #[test]
    fn test_short_rows_are_padded_with_missing() {
        let data = "Category,2024-01,2024-02,2024-03\nSales,1,2\nRent,4,5,6\n";
        let matrix = read_matrix_csv(data.as_bytes(), &IngestionOptions::default()).unwrap();
        assert_eq!(matrix.row(0).unwrap(), &[Some(1.0), Some(2.0), None]);
    }

    #[test]
    fn test_read_csv_errors() {
        let options = IngestionOptions::default();
        assert!(matches!(
            read_matrix_csv("".as_bytes(), &options),
            Err(DiagnosticsError::EmptyInput)
        ));
        assert!(matches!(
            read_matrix_csv("Category,2024-01\nSales,\n".as_bytes(), &options),
            Err(DiagnosticsError::EmptyInput)
        ));
        assert!(matches!(
            read_matrix_csv("Category,2024-01\nA,1\nA,2\n".as_bytes(), &options),
            Err(DiagnosticsError::DuplicateLabel { .. })
        ));
        assert!(matches!(
            read_matrix_csv("Category,2024-01\n,1\n".as_bytes(), &options),
            Err(DiagnosticsError::Spreadsheet(_))
        ));
    }

    #[test]
    fn test_load_matrix_rejects_unknown_extension() {
        let result = load_matrix("report.pdf", &IngestionOptions::default());
        assert!(matches!(result, Err(DiagnosticsError::UnsupportedFormat(ext)) if ext == "pdf"));
    }
}
