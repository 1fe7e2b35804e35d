//! Deterministic provider for tests and offline runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ProviderError, ProviderResult, TranslationProvider};

/// How a [`MockProvider`] answers.
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Return the input unchanged
    Identity,
    /// Prefix with the target locale: "Hello" → "[fr] Hello"
    Prefix,
    /// Look texts up in a table; unknown texts fail
    Mappings(HashMap<String, String>),
    /// Every call fails with this message
    Error(String),
    /// Batch calls fail, single calls behave like `Prefix`
    FailBatch,
}

#[derive(Debug)]
pub struct MockProvider {
    mode: MockMode,
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            single_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn translate_one(&self, text: &str, target: &str) -> ProviderResult<String> {
        match &self.mode {
            MockMode::Identity => Ok(text.to_string()),
            MockMode::Prefix | MockMode::FailBatch => Ok(format!("[{}] {}", target, text)),
            MockMode::Mappings(table) => table
                .get(text)
                .cloned()
                .ok_or_else(|| ProviderError::Other(format!("no mapping for '{}'", text))),
            MockMode::Error(message) => Err(ProviderError::Other(message.clone())),
        }
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    async fn translate_text(&self, text: &str, _source: &str, target: &str) -> ProviderResult<String> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.translate_one(text, target)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source: &str,
        target: &str,
    ) -> ProviderResult<Vec<String>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if matches!(self.mode, MockMode::FailBatch) {
            return Err(ProviderError::Api {
                status: 503,
                body: "batch endpoint unavailable".to_string(),
            });
        }
        texts.iter().map(|t| self.translate_one(t, target)).collect()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
