//! Promotion of date-like categorical columns to temporal.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::dataset::{ColumnKind, ResultSet};
use crate::db::Value;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

/// Month buckets such as `2024-01`, parsed as the first of the month.
const MONTH_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Returns true if the text is a date or date-time literal.
pub fn is_temporal_literal(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }

    DateTime::parse_from_rfc3339(text).is_ok()
        || DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z").is_ok()
        || DATETIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(text, f).is_ok())
        || DATE_FORMATS
            .iter()
            .any(|f| NaiveDate::parse_from_str(text, f).is_ok())
        || is_month_literal(text)
}

fn is_month_literal(text: &str) -> bool {
    let four_digit_year = text
        .split(['-', '/'])
        .next()
        .is_some_and(|year| year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()));
    if !four_digit_year {
        return false;
    }

    let separator = if text.contains('/') { '/' } else { '-' };
    let first_of_month = format!("{text}{separator}01");
    MONTH_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(&first_of_month, f).is_ok())
}

fn is_temporal_value(value: &Value) -> bool {
    value.as_str().is_some_and(is_temporal_literal)
}

/// Returns a copy of the result set with every categorical column whose
/// non-null values all parse as dates promoted to temporal.
///
/// Columns without any non-null value stay categorical.
pub fn normalize(rs: &ResultSet) -> ResultSet {
    let mut normalized = rs.clone();

    for (index, column) in normalized.columns.iter_mut().enumerate() {
        if column.kind != ColumnKind::Categorical {
            continue;
        }
        let mut values = rs.values(index).peekable();
        if values.peek().is_some() && values.all(is_temporal_value) {
            column.kind = ColumnKind::Temporal;
        }
    }

    normalized
}
