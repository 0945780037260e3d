//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use crate::error::{GenvizError, Result};
use crate::llm::gemini::DEFAULT_GEMINI_MODEL;
use crate::llm::openai::DEFAULT_OPENAI_MODEL;
use crate::llm::{
    GeminiClient, GeminiConfig, LlmClient, LlmProvider, MockLlmClient, OllamaClient,
    OpenAiClient, OpenAiConfig,
};

/// Creates an LLM client for the given provider.
///
/// API keys are resolved from the provided `api_key`, then the provider's
/// environment variable (`OPENAI_API_KEY` or `GEMINI_API_KEY`). The model
/// comes from `model`, then `OPENAI_MODEL` / `GEMINI_MODEL` / `OLLAMA_MODEL`,
/// then the provider default.
pub fn create_client(
    provider: LlmProvider,
    api_key: Option<String>,
    model: Option<String>,
) -> Result<Box<dyn LlmClient>> {
    match provider {
        LlmProvider::OpenAi => {
            let key = resolve_key(api_key, "OPENAI_API_KEY")?;
            let model = resolve_model(model, "OPENAI_MODEL", DEFAULT_OPENAI_MODEL);
            let mut config = OpenAiConfig::new(key, model);
            if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
                config = config.with_url(url);
            }
            Ok(Box::new(OpenAiClient::new(config)?))
        }
        LlmProvider::Gemini => {
            let key = resolve_key(api_key, "GEMINI_API_KEY")?;
            let model = resolve_model(model, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL);
            Ok(Box::new(GeminiClient::new(GeminiConfig::new(key, model))?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_env(model)?)),
        LlmProvider::Mock => Ok(Box::new(MockLlmClient::new())),
    }
}

fn resolve_key(api_key: Option<String>, env_var: &str) -> Result<String> {
    api_key
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
        .ok_or_else(|| GenvizError::config(format!("No API key configured. Set {env_var}.")))
}

fn resolve_model(model: Option<String>, env_var: &str, default: &str) -> String {
    model
        .filter(|m| !m.is_empty())
        .or_else(|| std::env::var(env_var).ok())
        .unwrap_or_else(|| default.to_string())
}
