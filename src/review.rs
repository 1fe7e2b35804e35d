//! Per-locale translation entries and their review workflow.
//!
//! Every status is reachable from every other through an explicit review
//! action; the only guarded transition is publishing, which needs at least
//! one translation.

use chrono::Utc;
use tracing::info;

use crate::error::{PhraseError, Result};
use crate::phrase::{Phrase, PhraseId, PhraseStatus, Translation, TranslationStatus};
use crate::service::PhraseService;

/// Input for [`PhraseService::add_or_update_translation`].
#[derive(Debug, Clone)]
pub struct TranslationInput {
    pub text: String,
    pub status: TranslationStatus,
    pub is_human: bool,
    pub modified_by: Option<String>,
}

impl TranslationInput {
    /// Human-entered text awaiting review
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: TranslationStatus::Pending,
            is_human: true,
            modified_by: None,
        }
    }

    pub fn with_status(mut self, status: TranslationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn machine(mut self) -> Self {
        self.is_human = false;
        self
    }

    pub fn modified_by(mut self, user: impl Into<String>) -> Self {
        self.modified_by = Some(user.into());
        self
    }
}

fn check_locale(locale: &str) -> Result<&str> {
    let locale = locale.trim();
    if locale.is_empty() {
        return Err(PhraseError::validation("locale must not be empty"));
    }
    Ok(locale)
}

fn missing_translation(phrase_id: PhraseId, locale: &str) -> PhraseError {
    PhraseError::not_found("translation", format!("{}/{}", phrase_id, locale))
}

impl PhraseService {
    /// Insert or overwrite the entry for `locale`.
    pub async fn add_or_update_translation(
        &self,
        phrase_id: PhraseId,
        locale: &str,
        input: TranslationInput,
    ) -> Result<Phrase> {
        let locale = check_locale(locale)?;
        let mut phrase = self.load_phrase(phrase_id).await?;

        let mut translation = Translation::new(input.text, input.status, input.is_human);
        translation.modified_by = input.modified_by;
        phrase.translations.upsert(locale, translation);

        self.save_phrase(&mut phrase).await?;
        info!("Stored {} translation for phrase {}", locale, phrase_id);
        Ok(phrase)
    }

    /// Record a review decision on an existing entry.
    pub async fn update_translation_status(
        &self,
        phrase_id: PhraseId,
        locale: &str,
        status: TranslationStatus,
        review_comments: Option<String>,
        reviewed_by: Option<String>,
    ) -> Result<Phrase> {
        let locale = check_locale(locale)?;
        let mut phrase = self.load_phrase(phrase_id).await?;

        let translation = phrase
            .translations
            .get_mut(locale)
            .ok_or_else(|| missing_translation(phrase_id, locale))?;
        let previous = translation.status;
        translation.review(status, review_comments, reviewed_by);

        self.save_phrase(&mut phrase).await?;
        info!(
            "Phrase {} {} translation: {} -> {}",
            phrase_id, locale, previous, status
        );
        Ok(phrase)
    }

    /// Mark a phrase published. Fails without touching the phrase when it
    /// has no translations.
    pub async fn publish_phrase(&self, phrase_id: PhraseId) -> Result<Phrase> {
        let mut phrase = self.load_phrase(phrase_id).await?;

        if phrase.translations.is_empty() {
            return Err(PhraseError::validation(format!(
                "phrase {} has no translations to publish",
                phrase_id
            )));
        }

        phrase.status = PhraseStatus::Published;
        self.save_phrase(&mut phrase).await?;
        info!("Published phrase {} ({})", phrase_id, phrase.key);
        Ok(phrase)
    }

    pub async fn remove_translation(&self, phrase_id: PhraseId, locale: &str) -> Result<Phrase> {
        let locale = check_locale(locale)?;
        let mut phrase = self.load_phrase(phrase_id).await?;

        if phrase.translations.remove(locale).is_none() {
            return Err(missing_translation(phrase_id, locale));
        }

        self.save_phrase(&mut phrase).await?;
        info!("Removed {} translation from phrase {}", locale, phrase_id);
        Ok(phrase)
    }
}

/// Apply a review decision in memory, used by bulk approve/reject.
/// Returns false when the phrase has no entry for `locale`.
pub(crate) fn review_in_place(
    phrase: &mut Phrase,
    locale: &str,
    status: TranslationStatus,
    reviewed_by: Option<String>,
) -> bool {
    match phrase.translations.get_mut(locale) {
        Some(translation) => {
            translation.review(status, None, reviewed_by);
            phrase.updated_at = Utc::now();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineSettings;
    use crate::phrase::CompletionCategory;
    use crate::service::NewPhrase;
    use crate::store::MemoryStore;

    async fn setup() -> (PhraseService, PhraseId) {
        let store = MemoryStore::new();
        let project = store.add_project("web", "Web").unwrap();
        let service = PhraseService::from_store(store, PipelineSettings::default());
        let phrase = service
            .create_phrase(
                project.id,
                NewPhrase {
                    key: "welcome".into(),
                    source_text: "Welcome".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        (service, phrase.id)
    }

    #[tokio::test]
    async fn test_add_translation_defaults() {
        let (service, id) = setup().await;
        let phrase = service
            .add_or_update_translation(id, "fr", TranslationInput::new("Bienvenue"))
            .await
            .unwrap();

        let fr = phrase.translations.get("fr").unwrap();
        assert_eq!(fr.text, "Bienvenue");
        assert_eq!(fr.status, TranslationStatus::Pending);
        assert!(fr.is_human);
        assert_eq!(phrase.completion(), CompletionCategory::Pending);
    }

    #[tokio::test]
    async fn test_update_overwrites_in_place() {
        let (service, id) = setup().await;
        service
            .add_or_update_translation(id, "fr", TranslationInput::new("Bienvenu"))
            .await
            .unwrap();
        service
            .add_or_update_translation(id, "de", TranslationInput::new("Willkommen"))
            .await
            .unwrap();
        let phrase = service
            .add_or_update_translation(
                id,
                "fr",
                TranslationInput::new("Bienvenue")
                    .with_status(TranslationStatus::Approved)
                    .modified_by("editor"),
            )
            .await
            .unwrap();

        assert_eq!(phrase.translations.len(), 2);
        assert_eq!(phrase.translations.locales().collect::<Vec<_>>(), vec!["fr", "de"]);
        let fr = phrase.translations.get("fr").unwrap();
        assert_eq!(fr.text, "Bienvenue");
        assert_eq!(fr.modified_by.as_deref(), Some("editor"));
    }

    #[tokio::test]
    async fn test_add_translation_validation() {
        let (service, id) = setup().await;
        let err = service
            .add_or_update_translation(id, "  ", TranslationInput::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = service
            .add_or_update_translation(999, "fr", TranslationInput::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (service, id) = setup().await;
        service
            .add_or_update_translation(id, "fr", TranslationInput::new("Bienvenue"))
            .await
            .unwrap();

        let phrase = service
            .update_translation_status(
                id,
                "fr",
                TranslationStatus::Rejected,
                Some("Wrong register".into()),
                Some("reviewer".into()),
            )
            .await
            .unwrap();
        let fr = phrase.translations.get("fr").unwrap();
        assert_eq!(fr.status, TranslationStatus::Rejected);
        assert_eq!(fr.comments.as_deref(), Some("Wrong register"));
        assert!(fr.reviewed_at.is_some());
        assert_eq!(phrase.completion(), CompletionCategory::NeedsAttention);

        let phrase = service
            .update_translation_status(id, "fr", TranslationStatus::Approved, None, None)
            .await
            .unwrap();
        assert_eq!(phrase.completion(), CompletionCategory::Ready);
    }

    #[tokio::test]
    async fn test_status_update_requires_entry() {
        let (service, id) = setup().await;
        let err = service
            .update_translation_status(id, "ja", TranslationStatus::Approved, None, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_publish_without_translations_fails_and_keeps_status() {
        let (service, id) = setup().await;

        let err = service.publish_phrase(id).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(service.get_phrase(id).await.unwrap().status, PhraseStatus::Pending);
    }

    #[tokio::test]
    async fn test_publish() {
        let (service, id) = setup().await;
        service
            .add_or_update_translation(id, "fr", TranslationInput::new("Bienvenue"))
            .await
            .unwrap();

        let phrase = service.publish_phrase(id).await.unwrap();
        assert_eq!(phrase.status, PhraseStatus::Published);
        // Publishing does not change translation review state
        assert_eq!(phrase.completion(), CompletionCategory::Pending);
    }

    #[tokio::test]
    async fn test_remove_translation() {
        let (service, id) = setup().await;
        service
            .add_or_update_translation(id, "fr", TranslationInput::new("Bienvenue"))
            .await
            .unwrap();

        let phrase = service.remove_translation(id, "fr").await.unwrap();
        assert!(phrase.translations.is_empty());
        assert!(service.remove_translation(id, "fr").await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_review_in_place_skips_missing_locale() {
        let mut phrase = Phrase::new(1, "welcome", "Welcome", None);
        assert!(!review_in_place(&mut phrase, "fr", TranslationStatus::Approved, None));

        phrase
            .translations
            .upsert("fr", Translation::new("Bienvenue", TranslationStatus::Pending, false));
        assert!(review_in_place(&mut phrase, "fr", TranslationStatus::Approved, None));
        assert_eq!(
            phrase.translations.get("fr").unwrap().status,
            TranslationStatus::Approved
        );
    }
}
