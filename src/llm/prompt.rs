//! Prompt construction for translation requests.
//!
//! Builds system prompts with database schema context.

use crate::db::SchemaSnapshot;
use crate::llm::types::Message;

/// System prompt template for the SQL generator.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are an expert {dialect} query generator. Based on the database schema below, write a {dialect}-compatible SQL query to answer the user's question.
{version}
RULES:
- Treat views as if they are regular tables
- Only output the SQL query, with no surrounding prose
- Write a single SELECT statement
- If you cannot answer the question with the given schema, explain why in SQL comments

{schema}"#;

/// Builds the system prompt with the schema, dialect and server version injected.
pub fn build_system_prompt(schema: &SchemaSnapshot, dialect: &str, version: Option<&str>) -> String {
    let version_line = match version {
        Some(v) if !v.trim().is_empty() => format!("The server reports version {}.\n", v.trim()),
        _ => String::new(),
    };

    SYSTEM_PROMPT_TEMPLATE
        .replace("{dialect}", dialect)
        .replace("{version}", &version_line)
        .replace("{schema}", &schema.format_for_llm())
}

/// Builds the complete message list for one translation request.
pub fn build_messages(
    schema: &SchemaSnapshot,
    dialect: &str,
    version: Option<&str>,
    question: &str,
) -> Vec<Message> {
    vec![
        Message::system(build_system_prompt(schema, dialect, version)),
        Message::user(format!("Question: {}\nSQL Query:", question.trim())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Column, Relation};
    use crate::llm::types::Role;

    fn sample_schema() -> SchemaSnapshot {
        SchemaSnapshot {
            database_name: "shop".to_string(),
            tables: vec![Relation::table(
                "orders",
                vec![Column::new("id", "integer"), Column::new("total", "numeric")],
            )],
            views: vec![],
        }
    }

    #[test]
    fn test_build_system_prompt_contains_schema_and_dialect() {
        let prompt = build_system_prompt(&sample_schema(), "postgresql", None);

        assert!(prompt.starts_with("You are an expert postgresql query generator."));
        assert!(prompt.contains("- `orders`: id (integer), total (numeric)"));
        assert!(prompt.contains("explain why in SQL comments"));
        assert!(!prompt.contains("{version}"));
        assert!(!prompt.contains("server reports"));
    }

    #[test]
    fn test_build_system_prompt_includes_version() {
        let prompt = build_system_prompt(&sample_schema(), "mysql", Some("8.0.36"));
        assert!(prompt.contains("The server reports version 8.0.36."));
    }

    #[test]
    fn test_build_messages() {
        let messages = build_messages(&sample_schema(), "postgresql", None, "  total sales by day ");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "Question: total sales by day\nSQL Query:");
    }
}
