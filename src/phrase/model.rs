use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::hash;
use super::translations::{CompletionCategory, TranslationMap};
use crate::error::PhraseError;

pub type PhraseId = i64;
pub type ProjectId = i64;

/// Lifecycle status of a phrase (independent of translation completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhraseStatus {
    Published,
    #[default]
    Pending,
    NeedsReview,
    Rejected,
    Archived,
}

impl PhraseStatus {
    pub const ALL: [PhraseStatus; 5] = [
        PhraseStatus::Published,
        PhraseStatus::Pending,
        PhraseStatus::NeedsReview,
        PhraseStatus::Rejected,
        PhraseStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhraseStatus::Published => "published",
            PhraseStatus::Pending => "pending",
            PhraseStatus::NeedsReview => "needs_review",
            PhraseStatus::Rejected => "rejected",
            PhraseStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PhraseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhraseStatus {
    type Err = PhraseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "published" => Ok(PhraseStatus::Published),
            "pending" => Ok(PhraseStatus::Pending),
            "needs_review" => Ok(PhraseStatus::NeedsReview),
            "rejected" => Ok(PhraseStatus::Rejected),
            "archived" => Ok(PhraseStatus::Archived),
            other => Err(PhraseError::validation(format!(
                "unknown phrase status: {}",
                other
            ))),
        }
    }
}

/// Where a phrase was observed during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate record of how often and where a phrase was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrences {
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Occurrences {
    pub fn first(count: u64, now: DateTime<Utc>, locations: Vec<Location>) -> Self {
        Self {
            count,
            first_seen: now,
            last_seen: now,
            locations,
        }
    }

    /// Record another sighting. The count never decreases and `last_seen`
    /// never moves before `first_seen`.
    pub fn record(&mut self, count: u64, now: DateTime<Utc>, locations: Vec<Location>) {
        self.count = self.count.saturating_add(count);
        self.last_seen = now.max(self.first_seen);
        self.locations.extend(locations);
    }
}

/// One extraction hit to merge into an existing phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub count: u64,
    pub seen_at: DateTime<Utc>,
    pub locations: Vec<Location>,
    /// Backfilled onto the phrase only when it has none yet
    pub source_url: Option<String>,
    pub source_type: Option<String>,
}

/// A tracked unit of source-language text within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    pub id: PhraseId,
    pub project_id: ProjectId,
    pub key: String,
    pub source_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub source_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub status: PhraseStatus,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub translations: TranslationMap,
    pub occurrences: Occurrences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Phrase {
    /// Build an unsaved phrase (id 0) with hashes computed from its text.
    pub fn new(
        project_id: ProjectId,
        key: impl Into<String>,
        source_text: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let source_text = source_text.into();
        Self {
            id: 0,
            project_id,
            key: key.into(),
            source_hash: hash::source_hash(&source_text),
            content_hash: hash::content_hash(&source_text, context.as_deref()),
            source_text,
            context,
            status: PhraseStatus::Pending,
            is_archived: false,
            tags: Vec::new(),
            translations: TranslationMap::new(),
            occurrences: Occurrences::first(0, now, Vec::new()),
            source_url: None,
            source_type: None,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace source text and/or context, recomputing both hashes.
    pub fn set_source(&mut self, source_text: impl Into<String>, context: Option<String>) {
        self.source_text = source_text.into();
        self.context = context;
        self.source_hash = hash::source_hash(&self.source_text);
        self.content_hash = hash::content_hash(&self.source_text, self.context.as_deref());
    }

    /// Add a tag. Returns false when it was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Remove a tag. Returns false when it was not present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn completion(&self) -> CompletionCategory {
        self.translations.completion()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Merge an extraction hit: bump occurrences, move `last_seen_at`, and
    /// fill in the source fields if they are still unset.
    pub fn record_sighting(&mut self, sighting: &Sighting) {
        self.occurrences
            .record(sighting.count, sighting.seen_at, sighting.locations.clone());
        self.last_seen_at = Some(sighting.seen_at);
        if self.source_url.is_none() {
            self.source_url = sighting.source_url.clone();
        }
        if self.source_type.is_none() {
            self.source_type = sighting.source_type.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::{Translation, TranslationStatus};
    use chrono::Duration;

    #[test]
    fn test_new_phrase_hashes() {
        let phrase = Phrase::new(1, "welcome", "Welcome", Some("header".to_string()));
        assert_eq!(phrase.source_hash, hash::source_hash("welcome"));
        assert_eq!(
            phrase.content_hash,
            hash::content_hash("Welcome", Some("header"))
        );
        assert_eq!(phrase.status, PhraseStatus::Pending);
        assert!(!phrase.is_archived);
    }

    #[test]
    fn test_set_source_recomputes_hashes() {
        let mut phrase = Phrase::new(1, "welcome", "Welcome", None);
        let old_hash = phrase.source_hash.clone();

        phrase.set_source("Welcome back", Some("header".to_string()));
        assert_ne!(phrase.source_hash, old_hash);
        assert!(phrase.content_hash.is_some());
    }

    #[test]
    fn test_tags_have_set_semantics() {
        let mut phrase = Phrase::new(1, "welcome", "Welcome", None);

        assert!(phrase.add_tag("homepage"));
        assert!(!phrase.add_tag("homepage"));
        assert_eq!(phrase.tags, vec!["homepage"]);

        assert!(phrase.remove_tag("homepage"));
        assert!(!phrase.remove_tag("homepage"));
        assert!(phrase.tags.is_empty());
    }

    #[test]
    fn test_occurrences_record_is_monotonic() {
        let now = Utc::now();
        let mut occurrences = Occurrences::first(1, now, Vec::new());

        occurrences.record(3, now + Duration::seconds(5), Vec::new());
        assert_eq!(occurrences.count, 4);
        assert!(occurrences.last_seen >= occurrences.first_seen);

        // A clock going backwards never puts last_seen before first_seen
        occurrences.record(1, now - Duration::hours(1), Vec::new());
        assert_eq!(occurrences.count, 5);
        assert!(occurrences.last_seen >= occurrences.first_seen);
    }

    #[test]
    fn test_record_sighting_backfills_only_unset_source() {
        let mut phrase = Phrase::new(1, "welcome", "Welcome", None);
        phrase.source_url = Some("https://first.example.com".to_string());
        let seen_at = Utc::now();

        phrase.record_sighting(&Sighting {
            count: 2,
            seen_at,
            locations: Vec::new(),
            source_url: Some("https://second.example.com".to_string()),
            source_type: Some("crawler".to_string()),
        });

        assert_eq!(phrase.occurrences.count, 2);
        assert_eq!(phrase.last_seen_at, Some(seen_at));
        assert_eq!(phrase.source_url.as_deref(), Some("https://first.example.com"));
        assert_eq!(phrase.source_type.as_deref(), Some("crawler"));
    }

    #[test]
    fn test_phrase_status_parse() {
        assert_eq!(
            "published".parse::<PhraseStatus>().unwrap(),
            PhraseStatus::Published
        );
        assert!("live".parse::<PhraseStatus>().is_err());
    }

    #[test]
    fn test_completion_is_independent_of_status() {
        let mut phrase = Phrase::new(1, "welcome", "Welcome", None);
        phrase.status = PhraseStatus::Published;
        assert_eq!(phrase.completion(), CompletionCategory::Untranslated);

        phrase.translations.upsert(
            "fr",
            Translation::new("Bienvenue", TranslationStatus::Approved, true),
        );
        phrase.status = PhraseStatus::Rejected;
        assert_eq!(phrase.completion(), CompletionCategory::Ready);
    }

    #[test]
    fn test_phrase_json_uses_camel_case() {
        let phrase = Phrase::new(7, "welcome", "Welcome", None);
        let json = serde_json::to_string(&phrase).expect("serialize");
        assert!(json.contains("\"sourceText\":\"Welcome\""));
        assert!(json.contains("\"isArchived\":false"));
        assert!(json.contains("\"sourceHash\""));
        assert!(!json.contains("\"context\""));

        let back: Phrase = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, phrase);
    }
}
