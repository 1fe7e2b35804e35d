//! Translation providers.
//!
//! A provider turns text in one locale into text in another. The pipeline
//! never talks to a provider directly without going through variable
//! preservation first (see [`crate::translation`]).

mod mock;
mod openai;

pub use mock::{MockMode, MockProvider};
pub use openai::{OpenAiProvider, OpenAiSettings};

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::warn;

use crate::metrics::PipelineMetrics;

/// Opaque upstream failure.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network, TLS or timeout failure before a response arrived
    #[error("request failed: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A response arrived but could not be used
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Rate limits, server errors and transport failures are worth retrying;
    /// other client errors and unusable responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::InvalidResponse(_) | ProviderError::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::Transport(error.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A pluggable machine translation backend.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate_text(&self, text: &str, source: &str, target: &str) -> ProviderResult<String>;

    /// Translate several texts in one request. Output order and length must
    /// match the input.
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> ProviderResult<Vec<String>>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// One item of a degraded batch translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Translated text, or the original text when `error` is set
    pub text: String,
    pub error: Option<String>,
}

impl BatchItem {
    pub fn is_translated(&self) -> bool {
        self.error.is_none()
    }
}

/// Batch translation that never aborts.
///
/// If the batch request fails (or returns the wrong number of items) each
/// text is retried on its own; a text that still fails comes back unchanged
/// together with the error.
pub async fn translate_many(
    provider: &dyn TranslationProvider,
    texts: &[String],
    source: &str,
    target: &str,
) -> Vec<BatchItem> {
    if texts.is_empty() {
        return Vec::new();
    }

    let metrics = PipelineMetrics::global();
    metrics.record_provider_call();

    let batch_error = match provider.translate_batch(texts, source, target).await {
        Ok(translated) if translated.len() == texts.len() => {
            return translated
                .into_iter()
                .map(|text| BatchItem { text, error: None })
                .collect();
        }
        Ok(translated) => format!(
            "batch returned {} items for {} inputs",
            translated.len(),
            texts.len()
        ),
        Err(e) => e.to_string(),
    };

    metrics.record_provider_failure();
    warn!(
        "{} batch translation {} -> {} failed ({}), falling back to per-item requests",
        provider.name(),
        source,
        target,
        batch_error
    );

    let results = join_all(texts.iter().map(|text| async move {
        metrics.record_provider_call();
        match provider.translate_text(text, source, target).await {
            Ok(translated) => BatchItem {
                text: translated,
                error: None,
            },
            Err(e) => {
                metrics.record_provider_failure();
                BatchItem {
                    text: text.clone(),
                    error: Some(e.to_string()),
                }
            }
        }
    }))
    .await;

    let degraded = results.iter().filter(|item| !item.is_translated()).count();
    if degraded > 0 {
        metrics.record_degraded_items(degraded);
        warn!(
            "{} of {} items kept their original text after provider failures",
            degraded,
            texts.len()
        );
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Transport("timeout".into()).is_retryable());
        assert!(ProviderError::Api { status: 429, body: String::new() }.is_retryable());
        assert!(ProviderError::Api { status: 503, body: String::new() }.is_retryable());
        assert!(!ProviderError::Api { status: 400, body: String::new() }.is_retryable());
        assert!(!ProviderError::Api { status: 401, body: String::new() }.is_retryable());
        assert!(!ProviderError::InvalidResponse("no choices".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_translate_many_uses_batch() {
        let provider = MockProvider::new(MockMode::Prefix);
        let result = translate_many(&provider, &texts(&["Hello", "Bye"]), "en", "fr").await;

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "[fr] Hello");
        assert!(result.iter().all(BatchItem::is_translated));
        assert_eq!(provider.batch_calls(), 1);
        assert_eq!(provider.single_calls(), 0);
    }

    #[tokio::test]
    async fn test_translate_many_falls_back_per_item() {
        let provider = MockProvider::new(MockMode::FailBatch);
        let result = translate_many(&provider, &texts(&["Hello", "Bye"]), "en", "de").await;

        assert_eq!(result[0].text, "[de] Hello");
        assert_eq!(result[1].text, "[de] Bye");
        assert!(result.iter().all(BatchItem::is_translated));
        assert_eq!(provider.single_calls(), 2);
    }

    #[tokio::test]
    async fn test_translate_many_degrades_to_original_text() {
        let provider = MockProvider::new(MockMode::Error("quota exceeded".to_string()));
        let result = translate_many(&provider, &texts(&["Hello", "Bye"]), "en", "fr").await;

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "Hello");
        assert_eq!(result[1].text, "Bye");
        assert!(result[0].error.as_deref().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_translate_many_partial_degradation() {
        let mut mappings = HashMap::new();
        mappings.insert("Hello".to_string(), "Hola".to_string());
        let provider = MockProvider::new(MockMode::Mappings(mappings));

        let result = translate_many(&provider, &texts(&["Hello", "Unknown"]), "en", "es").await;
        assert_eq!(result[0].text, "Hola");
        assert!(result[0].is_translated());
        assert_eq!(result[1].text, "Unknown");
        assert!(!result[1].is_translated());
    }

    #[tokio::test]
    async fn test_translate_many_empty_input() {
        let provider = MockProvider::new(MockMode::Identity);
        assert!(translate_many(&provider, &[], "en", "fr").await.is_empty());
        assert_eq!(provider.batch_calls(), 0);
    }
}
