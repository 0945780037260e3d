//! Schema snapshots.
//!
//! A `SchemaSnapshot` describes the tables and views of one database. It is
//! built in one pass from a `DatabaseClient` and never mutated afterwards;
//! a refresh builds a new snapshot.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use super::DatabaseClient;
use crate::error::{GenvizError, Result};

/// Whether a relation is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Table,
    View,
}

/// A column of a table or view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Dialect-reported type label (e.g., "integer", "varchar(255)").
    pub data_type: String,
}

impl Column {
    /// Creates a new column with the given name and data type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A query-able relation: tables and views share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub columns: Vec<Column>,
}

impl Relation {
    /// Creates a table relation.
    pub fn table(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Table,
            columns,
        }
    }

    /// Creates a view relation.
    pub fn view(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::View,
            columns,
        }
    }

    fn format_line(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} ({})", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("- `{}`: {}\n", self.name, columns)
    }
}

/// Normalized description of a database's tables and views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Name of the introspected database.
    pub database_name: String,

    /// Base tables, in the order introspection returned them.
    pub tables: Vec<Relation>,

    /// Views, in the order introspection returned them.
    pub views: Vec<Relation>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot for the given database.
    pub fn empty(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            tables: Vec::new(),
            views: Vec::new(),
        }
    }

    /// Returns true when the database has neither tables nor views.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.views.is_empty()
    }

    /// Iterates over tables then views.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.tables.iter().chain(self.views.iter())
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations().find(|r| r.name == name)
    }

    /// Formats the schema for inclusion in a translation prompt.
    pub fn format_for_llm(&self) -> String {
        let mut out = format!("Schema for database `{}`:\n\n", self.database_name);

        if !self.tables.is_empty() {
            out.push_str("Tables:\n");
            for table in &self.tables {
                out.push_str(&table.format_line());
            }
        }

        if !self.views.is_empty() {
            if !self.tables.is_empty() {
                out.push('\n');
            }
            out.push_str("Views (query as tables):\n");
            for view in &self.views {
                out.push_str(&view.format_line());
            }
        }

        out
    }

    /// Formats the schema for the host, with an explicit message for an
    /// empty database.
    pub fn format_for_display(&self) -> String {
        if self.is_empty() {
            format!(
                "No tables or views found in the database '{}'.",
                self.database_name
            )
        } else {
            self.format_for_llm()
        }
    }

    /// Computes a hash of the snapshot content for cache keys.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Builds a snapshot by enumerating tables and views, then their columns.
///
/// Any failure is reported as a schema introspection error; an empty
/// database yields an empty snapshot.
pub async fn build_snapshot(db: &dyn DatabaseClient, database_name: &str) -> Result<SchemaSnapshot> {
    let table_names = db
        .list_tables(database_name)
        .await
        .map_err(|e| introspection_error("list tables", e))?;
    let view_names = db
        .list_views(database_name)
        .await
        .map_err(|e| introspection_error("list views", e))?;

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let columns = fetch_columns(db, database_name, &name).await?;
        tables.push(Relation::table(name, columns));
    }

    let mut views = Vec::with_capacity(view_names.len());
    for name in view_names {
        let columns = fetch_columns(db, database_name, &name).await?;
        views.push(Relation::view(name, columns));
    }

    debug!(
        "Built schema snapshot for {}: {} tables, {} views",
        database_name,
        tables.len(),
        views.len()
    );

    Ok(SchemaSnapshot {
        database_name: database_name.to_string(),
        tables,
        views,
    })
}

async fn fetch_columns(
    db: &dyn DatabaseClient,
    database_name: &str,
    relation: &str,
) -> Result<Vec<Column>> {
    db.list_columns(database_name, relation)
        .await
        .map_err(|e| introspection_error(&format!("list columns of {relation}"), e))
}

fn introspection_error(action: &str, error: GenvizError) -> GenvizError {
    match error {
        GenvizError::SchemaIntrospection(_) => error,
        other => GenvizError::schema(format!("Failed to {action}: {other}")),
    }
}
