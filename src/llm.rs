//! Language-model completion backends.
//!
//! A [`Completer`] turns a fully rendered prompt into a single answer. Both
//! backends send one user message with temperature 0 and return the model's
//! reply verbatim. There is no streaming and no retry; any failure is an
//! [`RagError::Inference`] (or a [`RagError::Timeout`] when the deadline
//! passes).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{RagError, Result, Stage};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

#[async_trait]
pub trait Completer: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::config(format!("failed to build HTTP client: {}", e)))
}

async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string())
}

// ============ Ollama Provider ============

pub struct OllamaCompleter {
    model: String,
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: AssistantMessage,
}

impl OllamaCompleter {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
        };

        let resp = self
            .client
            .post(format!("{}/api/chat", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagError::from_http(Stage::Inference, e)
                } else {
                    RagError::inference(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    ))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = error_body(resp).await;
            return Err(RagError::inference(format!(
                "Ollama returned {}: {}",
                status, text
            )));
        }

        let parsed: OllamaChatResponse = resp
            .json()
            .await
            .map_err(|e| RagError::from_http(Stage::Inference, e))?;
        Ok(parsed.message.content)
    }
}

// ============ OpenAI Provider ============

pub struct OpenAICompleter {
    api_key: String,
    model: String,
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

impl OpenAICompleter {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::config("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            api_key,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Completer for OpenAICompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = OpenAIChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.url.trim_end_matches('/')
            ))
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::from_http(Stage::Inference, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = error_body(resp).await;
            return Err(RagError::inference(format!(
                "OpenAI returned {}: {}",
                status, text
            )));
        }

        let parsed: OpenAIChatResponse = resp
            .json()
            .await
            .map_err(|e| RagError::from_http(Stage::Inference, e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::inference("OpenAI response contained no choices"))
    }
}

/// Create the [`Completer`] named by `config.provider`.
pub fn create_completer(config: &LlmConfig) -> Result<Box<dyn Completer>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaCompleter::new(config)?)),
        "openai" => Ok(Box::new(OpenAICompleter::new(config)?)),
        other => Err(RagError::config(format!("Unknown llm provider: {}", other))),
    }
}
