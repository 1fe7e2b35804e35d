use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ProviderError, ProviderResult, TranslationProvider};
use crate::config::Config;
use crate::retry::{with_retry_if, RetryConfig};

/// Connection and sampling settings for an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl OpenAiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_url: config.translation_api_url.clone(),
            api_key: config.translation_api_key.clone(),
            model: config.translation_model.clone(),
            temperature: config.translation_temperature,
            max_tokens: config.translation_max_tokens,
            timeout: config.translation_timeout(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Reasoning models reject `temperature` and need a larger completion budget
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

fn build_system_prompt(source: &str, target: &str) -> String {
    format!(
        r#"You are a professional UI translator. Translate user interface text from locale "{}" to locale "{}".

Rules:
- Tokens of the form <VAR0>, <VAR1>, ... are placeholders. Copy every placeholder exactly once and unchanged; never translate, renumber or drop them.
- Preserve punctuation, leading and trailing whitespace, and any HTML tags.
- Keep brand and product names untranslated.
- Answer with the translation only, without quotes or explanations."#,
        source, target
    )
}

fn build_batch_prompt(texts: &[String]) -> ProviderResult<String> {
    let payload = serde_json::to_string(texts)
        .map_err(|e| ProviderError::Other(format!("failed to encode batch: {}", e)))?;
    Ok(format!(
        "Translate each string in this JSON array. Answer with a JSON array of the same length and order, containing only the translated strings:\n\n{}",
        payload
    ))
}

/// Strip a surrounding ``` or ```json fence if the model added one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Give `translated` exactly the leading and trailing whitespace of `source`.
/// Models tend to drop it or add a stray newline.
fn with_source_padding(source: &str, translated: &str) -> String {
    let leading = &source[..source.len() - source.trim_start().len()];
    let trailing = &source[source.trim_end().len()..];
    format!("{}{}{}", leading, translated.trim(), trailing)
}

fn parse_batch_response(content: &str, expected: usize) -> ProviderResult<Vec<String>> {
    let items: Vec<String> = serde_json::from_str(strip_code_fence(content)).map_err(|e| {
        ProviderError::InvalidResponse(format!("batch answer is not a JSON string array: {}", e))
    })?;
    if items.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {} translations, got {}",
            expected,
            items.len()
        )));
    }
    Ok(items)
}

/// Translation provider backed by an OpenAI-compatible chat completions API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    settings: OpenAiSettings,
    retry: RetryConfig,
}

impl OpenAiProvider {
    pub fn new(settings: OpenAiSettings) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            settings,
            retry: RetryConfig::provider_call(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn build_request(&self, system: String, user: String, items: usize) -> ChatRequest {
        let is_reasoning = is_reasoning_model(&self.settings.model);
        let max_completion_tokens = if is_reasoning {
            16000
        } else {
            self.settings.max_tokens.saturating_mul(items.max(1) as u32)
        };

        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system,
                },
                Message {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            max_completion_tokens,
            temperature: if is_reasoning {
                None
            } else {
                Some(self.settings.temperature)
            },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
        }
    }

    async fn complete(&self, request: &ChatRequest, retry: &RetryConfig, label: &str) -> ProviderResult<String> {
        with_retry_if(
            retry,
            label,
            || async {
                let mut builder = self
                    .client
                    .post(&self.settings.api_url)
                    .header("Content-Type", "application/json")
                    .json(request);
                if let Some(key) = &self.settings.api_key {
                    builder = builder.header("Authorization", format!("Bearer {}", key));
                }

                let response = builder.send().await?;

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
                    return Err(ProviderError::Api { status, body });
                }

                let chat: ChatResponse = response.json().await.map_err(|e| {
                    ProviderError::InvalidResponse(format!("failed to parse completion: {}", e))
                })?;

                chat.choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| ProviderError::InvalidResponse("response contained no choices".to_string()))
            },
            ProviderError::is_retryable,
        )
        .await
    }
}

#[async_trait]
impl TranslationProvider for OpenAiProvider {
    async fn translate_text(&self, text: &str, source: &str, target: &str) -> ProviderResult<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let request = self.build_request(build_system_prompt(source, target), text.to_string(), 1);
        let translated = self
            .complete(&request, &self.retry, &format!("Translation {} -> {}", source, target))
            .await?;

        debug!("Translated {} chars to {}", text.len(), target);
        Ok(with_source_padding(text, &translated))
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> ProviderResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.build_request(
            build_system_prompt(source, target),
            build_batch_prompt(texts)?,
            texts.len(),
        );
        let retry = RetryConfig {
            initial_delay: self.retry.initial_delay,
            ..RetryConfig::provider_batch()
        };
        let content = self
            .complete(
                &request,
                &retry,
                &format!("Batch translation {} -> {} ({} items)", source, target, texts.len()),
            )
            .await?;

        parse_batch_response(&content, texts.len())
    }

    fn name(&self) -> &str {
        &self.settings.model
    }
}
