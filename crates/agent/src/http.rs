use std::time::Duration;

use divvy_core::config::{LlmConfig, LlmProvider};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{GenerationError, TextGenerator};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Blocking client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone, Debug)]
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    system_prompt: Option<String>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| GenerationError::Transport(error.to_string()))?;

        let base_url = config.base_url.as_deref().unwrap_or(match config.provider {
            LlmProvider::OpenAi => OPENAI_BASE_URL,
            LlmProvider::Ollama => OLLAMA_BASE_URL,
        });

        Ok(Self {
            client,
            endpoint: completions_endpoint(base_url),
            api_key: config.api_key.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body<'a>(&'a self, prompt: &'a str, model_id: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system_prompt.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });
        ChatRequest { model: model_id, messages, temperature: self.temperature }
    }
}

impl TextGenerator for ChatCompletionClient {
    fn generate(&self, prompt: &str, model_id: &str) -> Result<String, GenerationError> {
        let mut request = self.client.post(&self.endpoint).json(&self.request_body(prompt, model_id));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().map_err(|error| {
            warn!(
                event_name = "agent.llm.request_failed",
                model = model_id,
                error = %error,
                "chat completion request failed"
            );
            GenerationError::Transport(error.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status { status: status.as_u16(), body });
        }

        let payload: ChatResponse =
            response.json().map_err(|error| GenerationError::Decode(error.to_string()))?;
        let content = first_content(payload)?;
        debug!(
            event_name = "agent.llm.completed",
            model = model_id,
            response_chars = content.len(),
            "chat completion received"
        );
        Ok(content)
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn first_content(payload: ChatResponse) -> Result<String, GenerationError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)
}
