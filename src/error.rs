use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagnosticsError {
    #[error("At least 2 month columns are required for diagnostics, got {found}")]
    InsufficientColumns { found: usize },

    #[error("Row '{category}' has {found} cells but the matrix has {expected} month columns")]
    ShapeMismatch {
        category: String,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate {axis} label: '{label}'")]
    DuplicateLabel { axis: &'static str, label: String },

    #[error("Non-finite value for '{category}' in {month}: missing cells must be empty, not NaN")]
    NonFiniteValue { category: String, month: String },

    #[error("Month columns are not chronological: '{previous}' is followed by '{next}'")]
    NonChronologicalMonths { previous: String, next: String },

    #[error("Unknown month: {0}")]
    UnknownMonth(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Unknown KPI identifier: {0}")]
    UnknownKpi(String),

    #[error("Invalid month window: start '{start}' comes after end '{end}'")]
    InvalidWindow { start: String, end: String },

    #[error("Month column {index} is out of range for a matrix with {months} months")]
    MonthOutOfRange { index: usize, months: usize },

    #[error("Invalid group '{group}': {details}")]
    InvalidGroup { group: String, details: String },

    #[error("Group '{group}' ends at row {last} but the sheet only has {rows} category rows")]
    GroupOutOfBounds {
        group: String,
        last: usize,
        rows: usize,
    },

    #[error("KPI '{kpi}' points at row {row} but the sheet only has {rows} category rows")]
    KpiOutOfBounds { kpi: String, row: usize, rows: usize },

    #[error("Input contains no data")]
    EmptyInput,

    #[error("Unsupported file format: .{0}")]
    UnsupportedFormat(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiagnosticsError>;
