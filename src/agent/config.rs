//! Configuration for the model gateway and chat behaviour

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Model provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProviderType {
    #[default]
    Gemini,
    Anthropic,
    /// Any OpenAI-compatible chat completions endpoint, including local Ollama
    OpenAI,
}

/// Configuration for the language model gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model provider to use
    pub provider: ModelProviderType,

    // === Gemini Configuration ===
    /// Gemini API key (can also use GEMINI_API_KEY env var)
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    pub gemini_model: String,

    /// Gemini base URL (for custom endpoints)
    pub gemini_base_url: String,

    // === Anthropic Configuration ===
    /// Anthropic API key (can also use ANTHROPIC_API_KEY env var)
    pub anthropic_api_key: Option<String>,

    /// Anthropic model name
    pub anthropic_model: String,

    /// Anthropic base URL (for custom endpoints)
    pub anthropic_base_url: String,

    // === OpenAI Configuration ===
    /// OpenAI API key (can also use OPENAI_API_KEY env var)
    pub openai_api_key: Option<String>,

    /// OpenAI model name
    pub openai_model: String,

    /// OpenAI base URL, e.g. http://localhost:11434/v1 for Ollama
    pub openai_base_url: String,

    // === Generation Parameters ===
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProviderType::Gemini,

            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),

            anthropic_api_key: None,
            anthropic_model: "claude-sonnet-4-5-20250929".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),

            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),

            temperature: 0.0,
            max_tokens: 2048,
            timeout_seconds: 60,
        }
    }
}

impl ModelConfig {
    /// Get Gemini API key from config or environment
    pub fn get_gemini_api_key(&self) -> Option<String> {
        self.gemini_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var("GEMINI_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }

    /// Get Anthropic API key from config or environment
    pub fn get_anthropic_api_key(&self) -> Option<String> {
        self.anthropic_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var("ANTHROPIC_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }

    /// Get OpenAI API key from config or environment
    pub fn get_openai_api_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Validate generation parameters. API keys are checked when the gateway is built.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".to_string());
        }

        if self.timeout_seconds == 0 {
            return Err("timeout_seconds must be greater than 0".to_string());
        }

        if self.provider == ModelProviderType::OpenAI && self.openai_base_url.is_empty() {
            return Err("openai_base_url is required for the openai provider".to_string());
        }

        Ok(())
    }
}

/// Conversation behaviour shared by the REPL and the HTTP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Echo the generated SQL above each answer
    pub show_query: bool,

    /// Maximum turns kept in a conversation (user and assistant messages count separately)
    pub history_limit: usize,

    /// Most recent turns quoted in the SQL generation prompt
    pub prompt_history_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            show_query: true,
            history_limit: 10,
            prompt_history_turns: 5,
        }
    }
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.history_limit == 0 {
            return Err("history_limit must be greater than 0".to_string());
        }

        if self.prompt_history_turns > self.history_limit {
            return Err(format!(
                "prompt_history_turns ({}) cannot exceed history_limit ({})",
                self.prompt_history_turns, self.history_limit
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, ModelProviderType::Gemini);
        assert_eq!(config.gemini_model, "gemini-2.5-flash");
        assert_eq!(config.temperature, 0.0);
        assert!(config.validate().is_ok());

        let chat = ChatConfig::default();
        assert!(chat.show_query);
        assert_eq!(chat.history_limit, 10);
        assert_eq!(chat.prompt_history_turns, 5);
    }

    #[test]
    fn test_validation() {
        let mut config = ModelConfig::default();

        config.temperature = 2.0;
        assert!(config.validate().is_err());

        config.temperature = 0.5;
        assert!(config.validate().is_ok());

        config.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chat_validation() {
        let mut chat = ChatConfig::default();
        chat.prompt_history_turns = 11;
        assert!(chat.validate().is_err());

        chat.prompt_history_turns = 5;
        chat.history_limit = 0;
        assert!(chat.validate().is_err());
    }

    #[test]
    fn test_configured_key_wins() {
        let config = ModelConfig {
            gemini_api_key: Some("from-config".to_string()),
            ..ModelConfig::default()
        };
        assert_eq!(config.get_gemini_api_key(), Some("from-config".to_string()));
    }

    #[test]
    fn test_provider_names_deserialize() {
        let config: ModelConfig = toml::from_str("provider = \"openai\"").unwrap();
        assert_eq!(config.provider, ModelProviderType::OpenAI);
    }
}
