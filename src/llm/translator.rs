//! Natural-language to SQL translation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::db::SchemaSnapshot;
use crate::error::Result;
use crate::llm::cache::{TranslationCache, TranslationKey};
use crate::llm::prompt::build_messages;
use crate::llm::LlmClient;

/// Everything a translation depends on.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub schema: Arc<SchemaSnapshot>,
    pub dialect: String,
    pub version: Option<String>,
    pub question: String,
}

/// Turns a question into raw translator output (SQL or an explanation).
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> Result<String>;

    /// Forgets memoized translations. Called after a schema refresh.
    fn invalidate(&self) {}
}

/// Translator backed by an LLM client, memoizing successful translations.
pub struct LlmTranslator {
    client: Box<dyn LlmClient>,
    cache: TranslationCache,
}

impl LlmTranslator {
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self {
            client,
            cache: TranslationCache::new(),
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        let key = TranslationKey::new(
            request.schema.content_hash(),
            &request.dialect,
            request.version.as_deref(),
            &request.question,
        );

        if let Some(cached) = self.cache.get(&key) {
            debug!("Translation cache hit for {:?}", key.question);
            return Ok(cached);
        }

        let messages = build_messages(
            &request.schema,
            &request.dialect,
            request.version.as_deref(),
            &request.question,
        );
        debug!("Requesting translation from {}", self.client.name());
        let output = self.client.complete(&messages).await?;

        self.cache.insert(key, output.clone());
        Ok(output)
    }

    fn invalidate(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Column, Relation};
    use crate::llm::MockLlmClient;

    fn request(question: &str, schema: SchemaSnapshot) -> TranslationRequest {
        TranslationRequest {
            schema: Arc::new(schema),
            dialect: "postgresql".to_string(),
            version: None,
            question: question.to_string(),
        }
    }

    fn shop() -> SchemaSnapshot {
        SchemaSnapshot {
            database_name: "shop".to_string(),
            tables: vec![Relation::table("orders", vec![Column::new("id", "integer")])],
            views: vec![],
        }
    }

    #[tokio::test]
    async fn test_repeated_question_hits_cache() {
        let client = MockLlmClient::new();
        let observer = client.clone();
        let translator = LlmTranslator::new(Box::new(client));

        let first = translator.translate(&request("how many orders", shop())).await.unwrap();
        let second = translator.translate(&request("how many orders ", shop())).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(observer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_changed_schema_misses_cache() {
        let client = MockLlmClient::new();
        let observer = client.clone();
        let translator = LlmTranslator::new(Box::new(client));

        translator.translate(&request("how many orders", shop())).await.unwrap();
        let mut changed = shop();
        changed.tables[0].columns.push(Column::new("total", "numeric"));
        translator.translate(&request("how many orders", changed)).await.unwrap();

        assert_eq!(observer.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache() {
        let client = MockLlmClient::new();
        let observer = client.clone();
        let translator = LlmTranslator::new(Box::new(client));

        translator.translate(&request("how many orders", shop())).await.unwrap();
        translator.invalidate();
        assert!(translator.cache().is_empty());
        translator.translate(&request("how many orders", shop())).await.unwrap();

        assert_eq!(observer.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let translator = LlmTranslator::new(Box::new(MockLlmClient::new().failing("down")));
        assert!(translator.translate(&request("q", shop())).await.is_err());
        assert!(translator.cache().is_empty());
    }
}
