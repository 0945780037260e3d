//! Classification of raw translator output.
//!
//! The translator either answers with a query or explains (usually in SQL
//! comments) why it cannot. Only output whose leading keyword is `SELECT`
//! is executed. Statements opening with `WITH` are treated as explanations.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// What the translator produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Classification {
    /// A read query to run against the database.
    Executable(String),
    /// Text to show the user instead of executing anything.
    Explanation(String),
}

impl Classification {
    /// The cleaned text, whichever variant it is.
    pub fn text(&self) -> &str {
        match self {
            Self::Executable(sql) | Self::Explanation(sql) => sql,
        }
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Executable(_))
    }
}

/// Fence marker, optionally followed by a dialect tag and the whitespace
/// after it. Only dialect names count as tags, so a keyword written straight
/// after the backticks stays in place.
const FENCE_PATTERN: &str = r"(?i)```(?:(?:sql|postgresql|postgres|mysql)(?:[ \t]*\r?\n|[ \t]+|$))?";

fn fence_marker() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(FENCE_PATTERN).ok()).as_ref()
}

/// Removes code fence markers wherever they appear, then surrounding whitespace.
pub fn clean(raw: &str) -> String {
    let stripped = match fence_marker() {
        Some(fence) => fence.replace_all(raw, "").into_owned(),
        None => raw.replace("```", ""),
    };
    stripped.trim().to_string()
}

/// Classifies raw translator output.
pub fn classify(raw: &str) -> Classification {
    let cleaned = clean(raw);
    let leading: String = cleaned
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    if leading.eq_ignore_ascii_case("SELECT") {
        Classification::Executable(cleaned)
    } else {
        Classification::Explanation(cleaned)
    }
}
