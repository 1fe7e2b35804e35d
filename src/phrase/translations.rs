use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PhraseError;

/// Review status of a single locale's translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    NeedsReview,
}

impl TranslationStatus {
    pub const ALL: [TranslationStatus; 4] = [
        TranslationStatus::Pending,
        TranslationStatus::Approved,
        TranslationStatus::Rejected,
        TranslationStatus::NeedsReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStatus::Pending => "pending",
            TranslationStatus::Approved => "approved",
            TranslationStatus::Rejected => "rejected",
            TranslationStatus::NeedsReview => "needs_review",
        }
    }

    /// Rejected and needs-review entries require a reviewer's attention
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            TranslationStatus::Rejected | TranslationStatus::NeedsReview
        )
    }
}

impl fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslationStatus {
    type Err = PhraseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TranslationStatus::Pending),
            "approved" => Ok(TranslationStatus::Approved),
            "rejected" => Ok(TranslationStatus::Rejected),
            "needs_review" => Ok(TranslationStatus::NeedsReview),
            other => Err(PhraseError::validation(format!(
                "unknown translation status: {}",
                other
            ))),
        }
    }
}

/// A locale-specific rendering of a phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub text: String,
    #[serde(default)]
    pub status: TranslationStatus,
    #[serde(default = "default_is_human")]
    pub is_human: bool,
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

fn default_is_human() -> bool {
    true
}

impl Translation {
    pub fn new(text: impl Into<String>, status: TranslationStatus, is_human: bool) -> Self {
        Self {
            text: text.into(),
            status,
            is_human,
            last_modified: Utc::now(),
            modified_by: None,
            reviewed_by: None,
            reviewed_at: None,
            comments: None,
        }
    }

    /// Record a review decision on this entry.
    pub fn review(
        &mut self,
        status: TranslationStatus,
        comments: Option<String>,
        reviewed_by: Option<String>,
    ) {
        let now = Utc::now();
        self.status = status;
        self.reviewed_at = Some(now);
        self.last_modified = now;
        if comments.is_some() {
            self.comments = comments;
        }
        if reviewed_by.is_some() {
            self.reviewed_by = reviewed_by;
        }
    }
}

/// Completion category derived from a phrase's translations.
///
/// This is computed on read and is independent of the phrase's lifecycle
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCategory {
    Untranslated,
    Pending,
    NeedsAttention,
    Ready,
}

impl CompletionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionCategory::Untranslated => "untranslated",
            CompletionCategory::Pending => "pending",
            CompletionCategory::NeedsAttention => "needs_attention",
            CompletionCategory::Ready => "ready",
        }
    }
}

/// Ordered locale → translation dictionary.
///
/// Locale keys are unique. Upserting an existing locale replaces the entry
/// in place, so iteration order is the order locales were first added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationMap(IndexMap<String, Translation>);

impl TranslationMap {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert or replace the entry for `locale`, returning the previous one.
    pub fn upsert(&mut self, locale: impl Into<String>, translation: Translation) -> Option<Translation> {
        self.0.insert(locale.into(), translation)
    }

    pub fn get(&self, locale: &str) -> Option<&Translation> {
        self.0.get(locale)
    }

    pub fn get_mut(&mut self, locale: &str) -> Option<&mut Translation> {
        self.0.get_mut(locale)
    }

    pub fn remove(&mut self, locale: &str) -> Option<Translation> {
        self.0.shift_remove(locale)
    }

    pub fn contains(&self, locale: &str) -> bool {
        self.0.contains_key(locale)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Translation)> {
        self.0.iter().map(|(locale, t)| (locale.as_str(), t))
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Completion category over every locale.
    pub fn completion(&self) -> CompletionCategory {
        if self.0.is_empty() {
            CompletionCategory::Untranslated
        } else if self.0.values().all(|t| t.status == TranslationStatus::Approved) {
            CompletionCategory::Ready
        } else if self.0.values().any(|t| t.status.needs_attention()) {
            CompletionCategory::NeedsAttention
        } else {
            CompletionCategory::Pending
        }
    }

    /// Completion category of a single locale.
    pub fn completion_for(&self, locale: &str) -> CompletionCategory {
        match self.0.get(locale).map(|t| t.status) {
            None => CompletionCategory::Untranslated,
            Some(TranslationStatus::Approved) => CompletionCategory::Ready,
            Some(status) if status.needs_attention() => CompletionCategory::NeedsAttention,
            Some(_) => CompletionCategory::Pending,
        }
    }

    /// True when any locale carries `status`.
    pub fn any_with_status(&self, status: TranslationStatus) -> bool {
        self.0.values().any(|t| t.status == status)
    }
}

impl FromIterator<(String, Translation)> for TranslationMap {
    fn from_iter<I: IntoIterator<Item = (String, Translation)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
