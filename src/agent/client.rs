//! Language model gateway implementations
//!
//! The pipeline only needs "prompt in, completion out"; every provider hides
//! its wire format behind [`ModelGateway::complete`].

use crate::agent::config::{ModelConfig, ModelProviderType};
use crate::agent::error::{AgentError, AgentResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Trait for language model providers
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send a single-turn prompt and return the text of the completion
    async fn complete(&self, prompt: &str) -> AgentResult<String>;

    /// Get provider name
    fn name(&self) -> &str;
}

fn build_http_client(timeout: Duration) -> AgentResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgentError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Send a JSON request and decode a JSON reply, mapping failures onto [`AgentError`]
async fn send_json<B, R>(request: RequestBuilder, body: &B, timeout: Duration) -> AgentResult<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request.json(body).send().await.map_err(|e| {
        if e.is_timeout() {
            AgentError::Timeout {
                timeout_secs: timeout.as_secs(),
            }
        } else {
            AgentError::Network(format!(
                "Request failed: {}",
                crate::password_sanitizer::sanitize_text_for_logging(&e.to_string())
            ))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AgentError::Api {
            status_code: status.as_u16(),
            message: error_text,
        });
    }

    response.json::<R>().await.map_err(|e| {
        if e.is_timeout() {
            AgentError::Timeout {
                timeout_secs: timeout.as_secs(),
            }
        } else {
            AgentError::Provider(format!("Failed to parse API response: {}", e))
        }
    })
}

/// Google Gemini provider (generateContent REST API)
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(api_key: String, config: &ModelConfig) -> AgentResult<Self> {
        Ok(Self {
            client: build_http_client(config.timeout())?,
            api_key,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl ModelGateway for GeminiProvider {
    async fn complete(&self, prompt: &str) -> AgentResult<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        debug!(
            "Calling Gemini API with model: {}, prompt length: {} chars",
            self.model,
            prompt.len()
        );

        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key);
        let response: GeminiResponse = send_json(request, &request_body, self.timeout).await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .ok_or_else(|| AgentError::Provider("No candidates in response".to_string()))?;

        Ok(text)
    }

    fn name(&self) -> &str {
        "Google Gemini"
    }
}

/// Anthropic Claude provider (Messages API)
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(api_key: String, config: &ModelConfig) -> AgentResult<Self> {
        Ok(Self {
            client: build_http_client(config.timeout())?,
            api_key,
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            model: config.anthropic_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl ModelGateway for AnthropicProvider {
    async fn complete(&self, prompt: &str) -> AgentResult<String> {
        let url = format!("{}/v1/messages", self.base_url);

        let request_body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        debug!(
            "Calling Anthropic API with model: {}, max_tokens: {}, temperature: {}",
            self.model, self.max_tokens, self.temperature
        );

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let response: AnthropicResponse = send_json(request, &request_body, self.timeout).await?;

        // Extract text content from the first content block
        if let Some(content) = response.content.into_iter().find_map(|block| block.text) {
            Ok(content)
        } else {
            Err(AgentError::Provider("No content in response".to_string()))
        }
    }

    fn name(&self) -> &str {
        "Anthropic Claude"
    }
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, config: &ModelConfig) -> AgentResult<Self> {
        Ok(Self {
            client: build_http_client(config.timeout())?,
            api_key,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl ModelGateway for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> AgentResult<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Calling OpenAI-compatible API at {} with model: {}", self.base_url, self.model);

        let mut request = self.client.post(&url);
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response: OpenAiResponse = send_json(request, &request_body, self.timeout).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AgentError::Provider("No choices in response".to_string()))
    }

    fn name(&self) -> &str {
        "OpenAI-compatible"
    }
}

// Gemini API types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

/// Create model gateway based on configuration
pub fn create_model_gateway(config: &ModelConfig) -> AgentResult<Box<dyn ModelGateway>> {
    config.validate().map_err(AgentError::Configuration)?;

    match config.provider {
        ModelProviderType::Gemini => {
            let api_key = config.get_gemini_api_key().ok_or_else(|| {
                AgentError::Configuration(
                    "Gemini API key not configured. Set GEMINI_API_KEY environment variable or add gemini_api_key to config."
                        .to_string(),
                )
            })?;
            Ok(Box::new(GeminiProvider::new(api_key, config)?))
        }
        ModelProviderType::Anthropic => {
            let api_key = config.get_anthropic_api_key().ok_or_else(|| {
                AgentError::Configuration(
                    "Anthropic API key not configured. Set ANTHROPIC_API_KEY environment variable or add anthropic_api_key to config."
                        .to_string(),
                )
            })?;
            Ok(Box::new(AnthropicProvider::new(api_key, config)?))
        }
        ModelProviderType::OpenAI => {
            // Local OpenAI-compatible servers usually run without a key
            let provider = OpenAiProvider::new(config.get_openai_api_key(), config)?;
            Ok(Box::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_request_shape() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some("hi".to_string()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.0,
                max_output_tokens: 2048,
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_gemini_response_parsing() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"data"},{"text":"base_query"}]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        let content = response.candidates.into_iter().next().unwrap().content.unwrap();
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        assert_eq!(text, "database_query");
    }

    #[test]
    fn test_openai_response_parsing() {
        let raw = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"greeting"}}]}"#;
        let response: OpenAiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("greeting")
        );
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let config = ModelConfig {
            provider: ModelProviderType::Anthropic,
            anthropic_api_key: Some(String::new()),
            ..ModelConfig::default()
        };
        // An empty configured key is treated as absent; the env var may still supply one
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            assert!(matches!(
                create_model_gateway(&config),
                Err(AgentError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_openai_gateway_without_key() {
        let config = ModelConfig {
            provider: ModelProviderType::OpenAI,
            openai_base_url: "http://localhost:11434/v1/".to_string(),
            ..ModelConfig::default()
        };
        let gateway = create_model_gateway(&config).unwrap();
        assert_eq!(gateway.name(), "OpenAI-compatible");
    }

    #[tokio::test]
    async fn test_network_error_redacts_credentials() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let timeout = Duration::from_secs(5);
        let client = build_http_client(timeout).unwrap();
        let request = client.post(format!(
            "http://127.0.0.1:{port}/v1/chat?key=hunter2&password=swordfish"
        ));

        let err = send_json::<_, serde_json::Value>(request, &serde_json::json!({}), timeout)
            .await
            .unwrap_err();

        match err {
            AgentError::Network(message) => {
                assert!(message.starts_with("Request failed"));
                assert!(!message.contains("hunter2"));
                assert!(!message.contains("swordfish"));
            }
            other => panic!("expected a network error, got {other:?}"),
        }
    }
}
