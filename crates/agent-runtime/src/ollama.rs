//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
        TokenUsage,
    },
};
use async_trait::async_trait;
use ollama_rs::{
    generation::{
        chat::{request::ChatMessageRequest, ChatMessage, ChatMessageResponse, MessageRole},
    },
    models::ModelOptions as OllamaOptions,
    Ollama,
};

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Model used when a request does not name one
    pub model: String,

    /// Sampling temperature for the assistant
    pub temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        let generation = GenerationOptions::default();
        Self {
            host: "http://localhost".into(),
            port: 11434,
            model: generation.model,
            temperature: generation.temperature,
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST`, `OLLAMA_PORT`, `OLLAMA_MODEL` and
    /// `OLLAMA_TEMPERATURE`, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = match lookup("OLLAMA_PORT").map(|p| p.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Ignoring invalid OLLAMA_PORT");
                defaults.port
            }
            None => defaults.port,
        };

        let temperature = match lookup("OLLAMA_TEMPERATURE").map(|t| t.parse::<f32>()) {
            Some(Ok(t)) if (0.0..=2.0).contains(&t) => t,
            Some(_) => {
                tracing::warn!("Ignoring invalid OLLAMA_TEMPERATURE");
                defaults.temperature
            }
            None => defaults.temperature,
        };

        Self {
            host: lookup("OLLAMA_HOST").unwrap_or(defaults.host),
            port,
            model: lookup("OLLAMA_MODEL").unwrap_or(defaults.model),
            temperature,
        }
    }

    /// Generation options seeded from this configuration
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            ..Default::default()
        }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(&config.host, config.port),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    pub fn localhost() -> Self {
        Self::from_config(OllamaConfig::default())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Convert agent messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => ChatMessage::new(MessageRole::System, m.content.clone()),
                Role::User => ChatMessage::new(MessageRole::User, m.content.clone()),
                Role::Assistant => ChatMessage::new(MessageRole::Assistant, m.content.clone()),
                // Tool output is fed back as user context; the text-protocol
                // tool calls never use Ollama's native tool role.
                Role::Tool => ChatMessage::new(MessageRole::User, m.content.clone()),
            })
            .collect()
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        Completion {
            content: response.message.content,
            model: model.to_string(),
            usage: response.final_data.as_ref().map(|d| {
                let prompt_tokens = d.prompt_eval_count as u32;
                let completion_tokens = d.eval_count as u32;
                TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens.saturating_add(completion_tokens),
                }
            }),
            finish_reason: Some(FinishReason::Stop),
        }
    }

    fn build_options(opts: &GenerationOptions) -> OllamaOptions {
        OllamaOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "Ollama".into(),
            models,
            supports_tools: false,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "Ollama health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatMessageRequest::new(
            options.model.clone(),
            Self::convert_messages(messages),
        )
        .options(Self::build_options(options));

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
            })
            .collect())
    }
}
