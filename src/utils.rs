use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Parses a month column label into the first day of that month.
///
/// Accepted shapes: `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `MM/YYYY`,
/// `Jan/2024`, `Jan 2024` and `January 2024`. Returns `None` for anything else,
/// which callers treat as a free-form label.
pub fn parse_month_label(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }

    let parsed = NaiveDate::parse_from_str(label, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(label, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| NaiveDate::parse_from_str(&format!("{}-01", label), "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("01/{}", label), "%d/%m/%Y").ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("01/{}", label), "%d/%b/%Y").ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("01 {}", label), "%d %b %Y").ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("01 {}", label), "%d %B %Y").ok())?;

    NaiveDate::from_ymd_opt(parsed.year(), parsed.month(), 1)
}

/// How a category's values should be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// Ratios stored as fractions (0.25 is 25%).
    Percent,
    /// Plain amounts, shown with thousands separators.
    Number,
}

impl ValueFormat {
    /// A category is treated as a percentage when its label carries a `%` sign, or
    /// when every recorded magnitude is below 2 (and not all zero).
    pub fn detect(label: &str, values: &[Option<f64>]) -> Self {
        if label.contains('%') {
            return ValueFormat::Percent;
        }

        let max_abs = values
            .iter()
            .flatten()
            .map(|v| v.abs())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        match max_abs {
            Some(max) if max != 0.0 && max < 2.0 => ValueFormat::Percent,
            _ => ValueFormat::Number,
        }
    }
}

/// Formats a value for display. Missing and non-finite values render as `N/A`.
pub fn format_value(value: Option<f64>, format: ValueFormat) -> String {
    match value {
        Some(v) if v.is_finite() => match format {
            ValueFormat::Percent => format!("{:.2}%", v * 100.0),
            ValueFormat::Number => group_thousands(v),
        },
        _ => "N/A".to_string(),
    }
}

/// Two-decimal rendering with `,` between thousands groups: `1234567.891` -> `1,234,567.89`.
pub fn group_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}
