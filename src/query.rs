//! Status-filtered reads and project statistics.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{PhraseError, Result};
use crate::phrase::{CompletionCategory, Phrase, PhraseStatus, ProjectId, TranslationStatus};
use crate::service::PhraseService;

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matches before pagination
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Cut one page out of the full match list.
    ///
    /// `page` is 1-based (0 is read as 1); `limit` is clamped to
    /// `1..=max_limit`.
    pub fn paginate(all: Vec<T>, page: u32, limit: u32, max_limit: u32) -> Self {
        let page = page.max(1);
        let limit = limit.clamp(1, max_limit.max(1));
        let total = all.len();
        let offset = (page as usize - 1).saturating_mul(limit as usize);

        Self {
            items: all.into_iter().skip(offset).take(limit as usize).collect(),
            total,
            page,
            limit,
        }
    }

    pub fn total_pages(&self) -> u32 {
        (self.total as u32).div_ceil(self.limit.max(1))
    }
}

/// Overall translation status used to filter phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Untranslated,
    Pending,
    Approved,
    Rejected,
    NeedsReview,
    Ready,
    NeedsAttention,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Untranslated => "untranslated",
            StatusFilter::Pending => "pending",
            StatusFilter::Approved => "approved",
            StatusFilter::Rejected => "rejected",
            StatusFilter::NeedsReview => "needs_review",
            StatusFilter::Ready => "ready",
            StatusFilter::NeedsAttention => "needs_attention",
        }
    }

    fn entry_status(&self) -> Option<TranslationStatus> {
        match self {
            StatusFilter::Pending => Some(TranslationStatus::Pending),
            StatusFilter::Approved => Some(TranslationStatus::Approved),
            StatusFilter::Rejected => Some(TranslationStatus::Rejected),
            StatusFilter::NeedsReview => Some(TranslationStatus::NeedsReview),
            StatusFilter::Untranslated | StatusFilter::Ready | StatusFilter::NeedsAttention => None,
        }
    }

    /// Does `phrase` match, either for one locale or across all of them?
    pub fn matches(&self, phrase: &Phrase, locale: Option<&str>) -> bool {
        let translations = &phrase.translations;

        if let Some(locale) = locale {
            let entry = translations.get(locale);
            return match self {
                StatusFilter::Untranslated => entry.is_none(),
                StatusFilter::Ready => entry.is_some_and(|t| t.status == TranslationStatus::Approved),
                StatusFilter::NeedsAttention => entry.is_some_and(|t| t.status.needs_attention()),
                _ => entry.map(|t| t.status) == self.entry_status(),
            };
        }

        match self {
            StatusFilter::Untranslated => translations.is_empty(),
            StatusFilter::Ready => translations.completion() == CompletionCategory::Ready,
            StatusFilter::NeedsAttention => translations
                .iter()
                .any(|(_, t)| t.status.needs_attention()),
            _ => self
                .entry_status()
                .is_some_and(|status| translations.any_with_status(status)),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = PhraseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "untranslated" => Ok(StatusFilter::Untranslated),
            "pending" => Ok(StatusFilter::Pending),
            "approved" => Ok(StatusFilter::Approved),
            "rejected" => Ok(StatusFilter::Rejected),
            "needs_review" => Ok(StatusFilter::NeedsReview),
            "ready" => Ok(StatusFilter::Ready),
            "needs_attention" => Ok(StatusFilter::NeedsAttention),
            other => Err(PhraseError::validation(format!(
                "unknown status filter: {}",
                other
            ))),
        }
    }
}

/// Per-locale review breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleStats {
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
    pub needs_review: usize,
    /// Active phrases with no entry for this locale
    pub missing: usize,
}

impl LocaleStats {
    fn count(&mut self, status: TranslationStatus) {
        match status {
            TranslationStatus::Approved => self.approved += 1,
            TranslationStatus::Pending => self.pending += 1,
            TranslationStatus::Rejected => self.rejected += 1,
            TranslationStatus::NeedsReview => self.needs_review += 1,
        }
    }

    fn present(&self) -> usize {
        self.approved + self.pending + self.rejected + self.needs_review
    }
}

/// Aggregate view of a project's phrases. Archived phrases only show up in
/// `archived`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseStats {
    pub total: usize,
    pub archived: usize,
    pub by_status: IndexMap<String, usize>,
    pub by_completion: IndexMap<String, usize>,
    pub locales: BTreeMap<String, LocaleStats>,
}

impl PhraseStats {
    pub fn compute(phrases: &[Phrase]) -> Self {
        let mut by_status: IndexMap<String, usize> = PhraseStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut by_completion: IndexMap<String, usize> = [
            CompletionCategory::Untranslated,
            CompletionCategory::Pending,
            CompletionCategory::NeedsAttention,
            CompletionCategory::Ready,
        ]
        .iter()
        .map(|c| (c.as_str().to_string(), 0))
        .collect();
        let mut locales: BTreeMap<String, LocaleStats> = BTreeMap::new();

        let mut total = 0;
        let mut archived = 0;

        for phrase in phrases {
            if phrase.is_archived {
                archived += 1;
                continue;
            }
            total += 1;
            *by_status.entry(phrase.status.as_str().to_string()).or_default() += 1;
            *by_completion
                .entry(phrase.completion().as_str().to_string())
                .or_default() += 1;
            for (locale, translation) in phrase.translations.iter() {
                locales
                    .entry(locale.to_string())
                    .or_default()
                    .count(translation.status);
            }
        }

        for stats in locales.values_mut() {
            stats.missing = total - stats.present();
        }

        Self {
            total,
            archived,
            by_status,
            by_completion,
            locales,
        }
    }
}

impl PhraseService {
    /// Non-archived phrases of a project matching `status`, paginated.
    pub async fn get_phrases_by_overall_status(
        &self,
        project_id: ProjectId,
        status: StatusFilter,
        page: u32,
        limit: u32,
        locale: Option<&str>,
    ) -> Result<Page<Phrase>> {
        self.project_by_id(project_id).await?;

        let matches: Vec<Phrase> = self
            .store()
            .list_by_project(project_id)
            .await?
            .into_iter()
            .filter(|p| !p.is_archived && status.matches(p, locale))
            .collect();

        debug!(
            "Status query {} (locale {:?}) matched {} phrases in project {}",
            status,
            locale,
            matches.len(),
            project_id
        );

        Ok(Page::paginate(
            matches,
            page,
            limit,
            self.settings().max_page_size,
        ))
    }

    pub async fn get_project_phrase_stats(&self, project_id: ProjectId) -> Result<PhraseStats> {
        self.project_by_id(project_id).await?;
        let phrases = self.store().list_by_project(project_id).await?;
        Ok(PhraseStats::compute(&phrases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::Translation;
    use crate::store::{InsertOutcome, MemoryStore, PhraseStore};

    fn phrase_with(text: &str, entries: &[(&str, TranslationStatus)]) -> Phrase {
        let mut phrase = Phrase::new(1, text.to_lowercase(), text, None);
        for (locale, status) in entries {
            phrase
                .translations
                .upsert(*locale, Translation::new(format!("{}-{}", text, locale), *status, true));
        }
        phrase
    }

    // ==================== Pagination Tests ====================

    #[test]
    fn test_paginate_first_page() {
        let page = Page::paginate((1..=25).collect::<Vec<_>>(), 1, 10, 200);
        assert_eq!(page.items, (1..=10).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_paginate_page_zero_is_first_page() {
        let page = Page::paginate(vec![1, 2, 3], 0, 2, 200);
        assert_eq!(page.page, 1);
        assert_eq!(page.items, vec![1, 2]);
    }

    #[test]
    fn test_paginate_clamps_limit() {
        let page = Page::paginate((1..=10).collect::<Vec<_>>(), 1, 0, 200);
        assert_eq!(page.limit, 1);

        let page = Page::paginate((1..=10).collect::<Vec<_>>(), 1, 500, 4);
        assert_eq!(page.limit, 4);
        assert_eq!(page.items.len(), 4);
    }

    #[test]
    fn test_paginate_past_end_is_empty() {
        let page = Page::paginate(vec![1, 2, 3], 5, 2, 200);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    // ==================== Status Filter Tests ====================

    #[test]
    fn test_filter_parse() {
        assert_eq!("ready".parse::<StatusFilter>().unwrap(), StatusFilter::Ready);
        assert_eq!(
            "NEEDS_ATTENTION".parse::<StatusFilter>().unwrap(),
            StatusFilter::NeedsAttention
        );
        assert!("published".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_mixed_approved_and_pending() {
        let phrase = phrase_with(
            "Save",
            &[("en", TranslationStatus::Approved), ("fr", TranslationStatus::Pending)],
        );

        assert!(StatusFilter::Pending.matches(&phrase, None));
        assert!(StatusFilter::Approved.matches(&phrase, None));
        assert!(!StatusFilter::Ready.matches(&phrase, None));
        assert!(!StatusFilter::Untranslated.matches(&phrase, None));
    }

    #[test]
    fn test_all_approved_is_ready() {
        let phrase = phrase_with(
            "Save",
            &[("en", TranslationStatus::Approved), ("fr", TranslationStatus::Approved)],
        );
        assert!(StatusFilter::Ready.matches(&phrase, None));
        assert!(!StatusFilter::Pending.matches(&phrase, None));
    }

    #[test]
    fn test_untranslated_only_matches_empty() {
        let empty = phrase_with("Save", &[]);
        assert!(StatusFilter::Untranslated.matches(&empty, None));
        assert!(!StatusFilter::Ready.matches(&empty, None));
        assert!(!StatusFilter::Pending.matches(&empty, None));
    }

    #[test]
    fn test_locale_scoped_matching() {
        let phrase = phrase_with(
            "Save",
            &[("fr", TranslationStatus::Rejected), ("de", TranslationStatus::Approved)],
        );

        assert!(StatusFilter::Rejected.matches(&phrase, Some("fr")));
        assert!(StatusFilter::NeedsAttention.matches(&phrase, Some("fr")));
        assert!(!StatusFilter::Rejected.matches(&phrase, Some("de")));
        assert!(StatusFilter::Ready.matches(&phrase, Some("de")));
        assert!(StatusFilter::Untranslated.matches(&phrase, Some("ja")));
        assert!(!StatusFilter::Untranslated.matches(&phrase, Some("fr")));
    }

    // ==================== Stats Tests ====================

    #[test]
    fn test_stats_breakdown() {
        let mut archived = phrase_with("Old", &[("fr", TranslationStatus::Approved)]);
        archived.is_archived = true;

        let mut published = phrase_with("Save", &[("fr", TranslationStatus::Approved)]);
        published.status = PhraseStatus::Published;

        let phrases = vec![
            published,
            phrase_with("Cancel", &[("fr", TranslationStatus::Rejected), ("de", TranslationStatus::Pending)]),
            phrase_with("Close", &[]),
            archived,
        ];

        let stats = PhraseStats::compute(&phrases);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.archived, 1);
        assert_eq!(stats.by_status["published"], 1);
        assert_eq!(stats.by_status["pending"], 2);
        assert_eq!(stats.by_status["archived"], 0);
        assert_eq!(stats.by_completion["ready"], 1);
        assert_eq!(stats.by_completion["needs_attention"], 1);
        assert_eq!(stats.by_completion["untranslated"], 1);

        let fr = &stats.locales["fr"];
        assert_eq!(fr.approved, 1);
        assert_eq!(fr.rejected, 1);
        assert_eq!(fr.missing, 1);

        let de = &stats.locales["de"];
        assert_eq!(de.pending, 1);
        assert_eq!(de.missing, 2);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = PhraseStats::compute(&[phrase_with("Save", &[("fr", TranslationStatus::NeedsReview)])]);
        let json = serde_json::to_string(&stats).expect("serialize");
        assert!(json.contains("\"byCompletion\""));
        assert!(json.contains("\"needsReview\":1"));
    }

    // ==================== Service Query Tests ====================

    async fn service_with(phrases: Vec<Phrase>) -> (PhraseService, ProjectId) {
        let store = MemoryStore::new();
        let project = store.add_project("web", "Web").unwrap();
        for mut phrase in phrases {
            phrase.project_id = project.id;
            assert!(matches!(store.insert(phrase).await.unwrap(), InsertOutcome::Inserted(_)));
        }
        (PhraseService::from_store(store, Default::default()), project.id)
    }

    #[tokio::test]
    async fn test_query_excludes_archived() {
        let mut archived = phrase_with("Old", &[]);
        archived.is_archived = true;
        let (service, project_id) = service_with(vec![phrase_with("Save", &[]), archived]).await;

        let page = service
            .get_phrases_by_overall_status(project_id, StatusFilter::Untranslated, 1, 50, None)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].source_text, "Save");
    }

    #[tokio::test]
    async fn test_query_paginates_in_id_order() {
        let phrases = (0..5).map(|i| phrase_with(&format!("Item {}", i), &[])).collect();
        let (service, project_id) = service_with(phrases).await;

        let page = service
            .get_phrases_by_overall_status(project_id, StatusFilter::Untranslated, 2, 2, None)
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        let texts: Vec<_> = page.items.iter().map(|p| p.source_text.as_str()).collect();
        assert_eq!(texts, vec!["Item 2", "Item 3"]);
    }

    #[tokio::test]
    async fn test_query_unknown_project() {
        let (service, _) = service_with(vec![]).await;
        let err = service
            .get_phrases_by_overall_status(999, StatusFilter::Ready, 1, 10, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_project_stats() {
        let (service, project_id) = service_with(vec![
            phrase_with("Save", &[("fr", TranslationStatus::Approved)]),
            phrase_with("Cancel", &[]),
        ])
        .await;

        let stats = service.get_project_phrase_stats(project_id).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.locales["fr"].missing, 1);
    }
}
