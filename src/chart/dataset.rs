//! Typed result sets for chart selection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::db::{QueryResult, Row, Value};

/// Inferred type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Temporal,
}

/// A named, typed result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    pub kind: ColumnKind,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Result rows in execution order with a kind per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<ResultColumn>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Builds a result set from rows, inferring each column's kind.
    ///
    /// A column is numeric when it holds at least one value and every
    /// non-null value is an integer or float; anything else is categorical.
    pub fn infer(names: Vec<String>, rows: Vec<Row>) -> Self {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let mut values = column_values(&rows, index).peekable();
                let kind = if values.peek().is_some() && values.all(Value::is_number) {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Categorical
                };
                ResultColumn::new(name, kind)
            })
            .collect();

        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-null values of one column, in row order.
    pub fn values(&self, index: usize) -> impl Iterator<Item = &Value> {
        column_values(&self.rows, index)
    }

    /// Number of distinct non-null values in a column, compared by display text.
    pub fn distinct_count(&self, index: usize) -> usize {
        self.values(index)
            .map(Value::to_display_string)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Indices of the columns of the given kind, in column order.
    pub fn indices_of(&self, kind: ColumnKind) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn column_name(&self, index: usize) -> &str {
        self.columns
            .get(index)
            .map(|c| c.name.as_str())
            .unwrap_or_default()
    }
}

impl From<QueryResult> for ResultSet {
    fn from(result: QueryResult) -> Self {
        let names = result.columns.into_iter().map(|c| c.name).collect();
        Self::infer(names, result.rows)
    }
}

fn column_values(rows: &[Row], index: usize) -> impl Iterator<Item = &Value> {
    rows.iter()
        .filter_map(move |row| row.get(index))
        .filter(|v| !v.is_null())
}
