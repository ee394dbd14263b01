use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use log::{info, warn};
use tokio::runtime::Runtime;

use crate::utils::cost::CostTracker;
use crate::utils::llm::{Generate, RetryPolicy};
use crate::utils::token::tiktoken::Tiktoken;
use crate::utils::token::{estimate_tokens, CountToken};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Sampling configuration of an [OpenAIGenerator].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u16,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 1000,
        }
    }
}

/// Chat-completion backed text generator.
///
/// The async client is driven on a runtime owned by the generator, so [Generate::generate] blocks the calling thread.
/// Many threads may call it at once, which is what the parallel executor does.
pub struct OpenAIGenerator {
    client: Client<OpenAIConfig>,
    runtime: Runtime,
    config: GeneratorConfig,
    system_message: Option<String>,
    technique: String,
    cost_tracker: Arc<CostTracker>,
    counter: Option<Tiktoken>,
    retry_policy: RetryPolicy,
}

/// Provider and transport errors are worth another try. Local errors such as bad arguments are not.
pub fn is_transient(error: &OpenAIError) -> bool {
    matches!(error, OpenAIError::ApiError(_) | OpenAIError::Reqwest(_))
}

/// Technique recorded for the `index`-th reply of [OpenAIGenerator::generate_multiple], counted from 1.
pub fn response_technique(technique: &str, index: usize) -> String {
    format!("{}_response_{}", technique, index)
}

impl OpenAIGenerator {
    /// Create a generator with an explicit API key.
    pub fn new(api_key: impl Into<String>, config: GeneratorConfig) -> Result<Self> {
        let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start the generator runtime")?;
        let counter = Tiktoken::new(config.model.as_str())
            .map_err(|e| warn!("Token counting falls back to estimation: {}", e))
            .ok();
        info!("OpenAI generator initialized with model: {}", config.model);
        Ok(Self {
            client,
            runtime,
            config,
            system_message: None,
            technique: "unknown".to_string(),
            cost_tracker: Arc::new(CostTracker::default()),
            counter,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Create a generator from the environment, loading a `.env` file first if there is one.
    pub fn from_env(config: GeneratorConfig) -> Result<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| anyhow!("{} environment variable is required", API_KEY_ENV))?;
        Self::new(api_key, config)
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    /// Name recorded with every usage record.
    pub fn with_technique(mut self, technique: impl Into<String>) -> Self {
        self.technique = technique.into();
        self
    }

    pub fn with_cost_tracker(mut self, cost_tracker: Arc<CostTracker>) -> Self {
        self.cost_tracker = cost_tracker;
        self
    }

    /// Retries of transient API errors within one [Generate::generate] call.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn cost_tracker(&self) -> &Arc<CostTracker> {
        &self.cost_tracker
    }

    fn count_tokens(&self, text: &str) -> usize {
        match &self.counter {
            Some(counter) => counter.count_token(text),
            None => estimate_tokens(text),
        }
    }

    fn build_messages(&self, prompt: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);
        if let Some(system_message) = &self.system_message {
            messages.push(ChatCompletionRequestSystemMessageArgs::default()
                .content(system_message.as_str())
                .build()?
                .into());
        }
        messages.push(ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?
            .into());
        Ok(messages)
    }

    /// Generate a reply, recording its usage under `technique`.
    pub fn generate_as(&self, prompt: &str, technique: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.config.model.as_str())
            .messages(self.build_messages(prompt)?)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build()?;
        info!("Generating response for {}", technique);
        let response = self.retry_policy.run(is_transient, || {
            self.runtime.block_on(self.client.chat().create(request.clone()))
        })?;
        let content = response.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("{} returned no message content", self.config.model))?;

        let (input_tokens, output_tokens) = match response.usage {
            Some(usage) => (usage.prompt_tokens as usize, usage.completion_tokens as usize),
            None => {
                let system = self.system_message.as_deref().unwrap_or("");
                (self.count_tokens(&format!("{}{}", system, prompt)), self.count_tokens(&content))
            }
        };
        self.cost_tracker.track_usage(technique, &self.config.model, input_tokens, output_tokens);
        Ok(content)
    }

    /// `n` independent replies to the same prompt, one request each, in order. A failed request does not stop the
    /// others.
    pub fn generate_multiple(&self, prompt: &str, n: usize) -> Vec<Result<String>> {
        (1..=n)
            .map(|i| self.generate_as(prompt, &response_technique(&self.technique, i)))
            .collect()
    }
}

impl Generate for OpenAIGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_as(prompt, &self.technique)
    }
}
