use std::time::Duration;

use anyhow::{Context, Error};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::config::TextGeneratorConfig;
use crate::error::{ExternalService, ServiceError};

const SERVICE: ExternalService = ExternalService::TextGenerator;

/// Turns a prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Text generator speaking the OpenAI chat completions protocol.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model_name: String,
    timeout: u64,
    max_tokens: u32,
    temperature: f32,
}

impl ChatCompletionClient {
    pub fn new(config: TextGeneratorConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .context("text_generation_client - cannot build http client")?;

        Ok(ChatCompletionClient {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key,
            model_name: config.model_name,
            timeout: config.timeout,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
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

/// Text of the first choice; an empty string when the model returned none.
fn first_choice_text(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default()
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ServiceError::MissingCredentials { service: SERVICE })?;

        let body = ChatRequest {
            model: &self.model_name,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, &self.endpoint, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| ServiceError::ResponseParsing {
            service: SERVICE,
            message: e.to_string(),
        })?;

        Ok(first_choice_text(parsed))
    }
}
