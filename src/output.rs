//! Rendering of session snapshots for the command line.

use crate::chart::{ChartSpec, ResultSet};
use crate::classifier::Classification;
use crate::cli::OutputFormat;
use crate::db::{SchemaSnapshot, Value};
use crate::session::{Phase, SessionSnapshot};

/// Rows printed in text mode before the table is cut off.
pub const TEXT_ROW_LIMIT: usize = 50;

/// Formats session snapshots for printing.
#[derive(Debug, Clone, Copy)]
pub struct SessionOutput {
    format: OutputFormat,
}

impl SessionOutput {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, snapshot: &SessionSnapshot) -> String {
        match self.format {
            OutputFormat::Text => format_text(snapshot),
            OutputFormat::Json => format_json(snapshot),
        }
    }
}

/// Message for a database without tables or views, `None` otherwise.
pub fn empty_schema_notice(schema: &SchemaSnapshot) -> Option<String> {
    schema.is_empty().then(|| schema.format_for_display())
}

/// Status line printed after a schema refresh.
pub fn refresh_summary(schema: &SchemaSnapshot) -> String {
    empty_schema_notice(schema).unwrap_or_else(|| {
        format!("Schema refreshed. Found {} relations.", schema.relations().count())
    })
}

fn format_json(snapshot: &SessionSnapshot) -> String {
    serde_json::to_string_pretty(snapshot)
        .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {}\"}}", e))
}

fn format_text(snapshot: &SessionSnapshot) -> String {
    let mut sections = Vec::new();

    if let Some(question) = snapshot.question_text() {
        sections.push(format!("Question: {question}"));
    }

    match &snapshot.classification {
        Some(Classification::Explanation(text)) => sections.push(as_sql_comment(text)),
        Some(Classification::Executable(sql)) => sections.push(sql.clone()),
        None => {}
    }

    if let Some(error) = &snapshot.error {
        sections.push(format!("Error: {error}"));
    }

    if let Some(chart) = &snapshot.chart {
        sections.push(describe_chart(chart));
    }

    if let Some(result_set) = &snapshot.result_set {
        sections.push(format_result_set(result_set));
    }

    if let Some(warning) = &snapshot.truncation {
        sections.push(format!("Warning: {warning}"));
    }

    if !snapshot.phase.is_terminal() {
        sections.push(format!("({})", snapshot.phase));
    } else if snapshot.phase == Phase::Failed && snapshot.error.is_none() {
        sections.push("Error: the question could not be answered.".to_string());
    }

    sections.join("\n\n")
}

/// Prefixes every line that is not already a comment with `-- `.
fn as_sql_comment(text: &str) -> String {
    if text.trim().is_empty() {
        return "-- (no answer)".to_string();
    }

    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("--") {
                trimmed.to_string()
            } else if trimmed.is_empty() {
                "--".to_string()
            } else {
                format!("-- {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_chart(chart: &ChartSpec) -> String {
    match (chart.kind(), chart) {
        (_, ChartSpec::Metric { label, value }) => {
            format!("Metric: {label} = {}", value.to_display_string())
        }
        (Some(kind), spec) => match spec.title() {
            Some(title) => format!("Chart: {kind} ({title})"),
            None => format!("Chart: {kind}"),
        },
        (None, _) => "Chart: none (showing table)".to_string(),
    }
}

fn format_result_set(rs: &ResultSet) -> String {
    let headers: Vec<String> = rs.columns.iter().map(|c| c.name.clone()).collect();
    let rows: Vec<Vec<String>> = rs
        .rows
        .iter()
        .take(TEXT_ROW_LIMIT)
        .map(|row| row.iter().map(format_cell).collect())
        .collect();

    let mut table = format_table(&headers, &rows);
    if rs.row_count() > TEXT_ROW_LIMIT {
        table.push_str(&format!(
            "\n... {} more rows",
            rs.row_count() - TEXT_ROW_LIMIT
        ));
    }
    table.push_str(&format!(
        "\n({} row{})",
        rs.row_count(),
        if rs.row_count() == 1 { "" } else { "s" }
    ));
    table
}

fn format_cell(value: &Value) -> String {
    value.to_display_string()
}

/// Formats a table as a string for display.
fn format_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let pad = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(0);
                format!("{cell:width$}")
            })
            .collect::<Vec<_>>()
            .join(" │ ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![pad(headers)];
    lines.push(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─"),
    );
    lines.extend(rows.iter().map(|row| pad(row.as_slice())));

    lines.join("\n")
}
