//! Chart-type inference.
//!
//! `ChartSelector` maps a result set to a `ChartSpec` by running an ordered
//! cascade of rules; the first rule whose predicate holds builds the chart.
//! Date-like text columns are promoted to temporal before any rule runs.

mod dataset;
mod normalize;

pub use dataset::{ColumnKind, ResultColumn, ResultSet};
pub use normalize::{is_temporal_literal, normalize};

use serde::Serialize;
use std::fmt;

use crate::db::Value;

/// Pie charts need fewer distinct categories than this.
pub const PIE_MAX_CATEGORIES: usize = 10;

/// What the host should draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartSpec {
    /// A single headline value.
    Metric { label: String, value: Value },
    Bar { x: String, y: String },
    Line { x: String, y_series: Vec<String> },
    Scatter { x: String, y: String },
    Pie { names: String, values: String },
    /// No chart fits; show the table.
    None,
}

impl ChartSpec {
    pub fn kind(&self) -> Option<ChartKind> {
        match self {
            Self::Metric { .. } => Some(ChartKind::Metric),
            Self::Bar { .. } => Some(ChartKind::Bar),
            Self::Line { .. } => Some(ChartKind::Line),
            Self::Scatter { .. } => Some(ChartKind::Scatter),
            Self::Pie { .. } => Some(ChartKind::Pie),
            Self::None => None,
        }
    }

    /// Human-readable chart title.
    pub fn title(&self) -> Option<String> {
        match self {
            Self::Metric { label, .. } => Some(label.clone()),
            Self::Bar { x, y } => Some(format!("{y} by {x}")),
            Self::Line { y_series, .. } => Some(format!("{} over time", y_series.join(", "))),
            Self::Scatter { x, y } => Some(format!("{y} vs. {x}")),
            Self::Pie { names, values } => Some(format!("Distribution of {values} by {names}")),
            Self::None => None,
        }
    }
}

/// Chart families produced by the rule cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Metric,
    Bar,
    Line,
    Scatter,
    Pie,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Metric => "metric",
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Scatter => "scatter",
            Self::Pie => "pie",
        };
        f.write_str(name)
    }
}

/// Column indices grouped by kind, computed once per selection.
#[derive(Debug, Clone)]
pub struct ColumnProfile {
    pub rows: usize,
    pub columns: usize,
    pub numeric: Vec<usize>,
    pub categorical: Vec<usize>,
    pub temporal: Vec<usize>,
}

impl ColumnProfile {
    pub fn of(rs: &ResultSet) -> Self {
        Self {
            rows: rs.row_count(),
            columns: rs.column_count(),
            numeric: rs.indices_of(ColumnKind::Numeric),
            categorical: rs.indices_of(ColumnKind::Categorical),
            temporal: rs.indices_of(ColumnKind::Temporal),
        }
    }
}

/// One step of the cascade: a predicate and the builder it guards.
#[derive(Clone, Copy)]
pub struct ChartRule {
    pub kind: ChartKind,
    pub applies: fn(&ResultSet, &ColumnProfile) -> bool,
    pub build: fn(&ResultSet, &ColumnProfile) -> ChartSpec,
}

impl fmt::Debug for ChartRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartRule").field("kind", &self.kind).finish()
    }
}

/// Ordered rule cascade. `ChartSelector::default()` is the canonical order:
/// metric, bar, line, scatter, pie.
#[derive(Debug, Clone)]
pub struct ChartSelector {
    rules: Vec<ChartRule>,
}

impl Default for ChartSelector {
    fn default() -> Self {
        Self {
            rules: vec![METRIC, BAR, LINE, SCATTER, PIE],
        }
    }
}

impl ChartSelector {
    /// Drops the rule for `kind`, keeping the order of the rest.
    pub fn without(mut self, kind: ChartKind) -> Self {
        self.rules.retain(|r| r.kind != kind);
        self
    }

    /// Rule kinds in evaluation order.
    pub fn kinds(&self) -> Vec<ChartKind> {
        self.rules.iter().map(|r| r.kind).collect()
    }

    /// Returns the result set with date-like columns promoted to temporal.
    pub fn normalize(rs: &ResultSet) -> ResultSet {
        normalize(rs)
    }

    /// Chooses a chart for the result set.
    ///
    /// Zero rows (or zero columns) always yields `ChartSpec::None`.
    pub fn select(&self, rs: &ResultSet) -> ChartSpec {
        if rs.is_empty() || rs.column_count() == 0 {
            return ChartSpec::None;
        }

        let normalized = Self::normalize(rs);
        let profile = ColumnProfile::of(&normalized);

        self.rules
            .iter()
            .find(|rule| (rule.applies)(&normalized, &profile))
            .map(|rule| (rule.build)(&normalized, &profile))
            .unwrap_or(ChartSpec::None)
    }
}

pub const METRIC: ChartRule = ChartRule {
    kind: ChartKind::Metric,
    applies: |_, p| p.rows == 1 && p.columns == 1,
    build: |rs, _| ChartSpec::Metric {
        label: rs.column_name(0).to_string(),
        value: rs.rows[0].first().cloned().unwrap_or_default(),
    },
};

pub const BAR: ChartRule = ChartRule {
    kind: ChartKind::Bar,
    applies: |_, p| p.numeric.len() == 1 && !p.categorical.is_empty(),
    build: |rs, p| {
        // max_by_key keeps the last maximum, so search from the right.
        let x = p
            .categorical
            .iter()
            .rev()
            .max_by_key(|&&i| rs.distinct_count(i))
            .copied()
            .unwrap_or_default();
        ChartSpec::Bar {
            x: rs.column_name(x).to_string(),
            y: rs.column_name(p.numeric[0]).to_string(),
        }
    },
};

pub const LINE: ChartRule = ChartRule {
    kind: ChartKind::Line,
    applies: |_, p| p.temporal.len() == 1 && !p.numeric.is_empty(),
    build: |rs, p| ChartSpec::Line {
        x: rs.column_name(p.temporal[0]).to_string(),
        y_series: p
            .numeric
            .iter()
            .map(|&i| rs.column_name(i).to_string())
            .collect(),
    },
};

pub const SCATTER: ChartRule = ChartRule {
    kind: ChartKind::Scatter,
    applies: |_, p| p.numeric.len() == 2,
    build: |rs, p| ChartSpec::Scatter {
        x: rs.column_name(p.numeric[0]).to_string(),
        y: rs.column_name(p.numeric[1]).to_string(),
    },
};

pub const PIE: ChartRule = ChartRule {
    kind: ChartKind::Pie,
    applies: |rs, p| {
        p.numeric.len() == 1
            && p.categorical.len() == 1
            && rs.distinct_count(p.categorical[0]) < PIE_MAX_CATEGORIES
    },
    build: |rs, p| ChartSpec::Pie {
        names: rs.column_name(p.categorical[0]).to_string(),
        values: rs.column_name(p.numeric[0]).to_string(),
    },
};
