//! Machine translation of stored phrases.
//!
//! Source text goes through variable preservation before it reaches the
//! provider. Results are stored as machine translations (`is_human = false`)
//! with status pending, or needs_review when the variables did not survive.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PhraseError, Result};
use crate::metrics::PipelineMetrics;
use crate::phrase::{Phrase, PhraseId, ProjectId, Translation, TranslationStatus};
use crate::provider::{translate_many, TranslationProvider};
use crate::service::PhraseService;
use crate::variables::{protect_variables, translate_with_variable_preservation, validate_variables};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationFailure {
    pub id: PhraseId,
    pub message: String,
}

/// Outcome of [`PhraseService::translate_phrases`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTranslationResult {
    pub locale: String,
    pub requested: usize,
    /// Ids whose translation was stored
    pub translated: Vec<PhraseId>,
    /// Stored ids flagged needs_review because of a variable mismatch
    pub needs_review: Vec<PhraseId>,
    pub failures: Vec<TranslationFailure>,
}

/// Pick the review status for a machine translation of `source`.
fn machine_status(source: &str, translated: &str) -> TranslationStatus {
    let validation = validate_variables(source, translated);
    if validation.is_valid {
        return TranslationStatus::Pending;
    }
    PipelineMetrics::global().record_variable_mismatch();
    warn!(
        "Variable mismatch in machine translation (missing {:?}, extra {:?})",
        validation.missing_variables, validation.extra_variables
    );
    TranslationStatus::NeedsReview
}

fn store_machine_translation(phrase: &mut Phrase, locale: &str, text: String) -> TranslationStatus {
    let status = machine_status(&phrase.source_text, &text);
    phrase
        .translations
        .upsert(locale, Translation::new(text, status, false));
    status
}

impl PhraseService {
    fn check_target_locale<'a>(&self, target_locale: &'a str) -> Result<&'a str> {
        let target = target_locale.trim();
        if target.is_empty() {
            return Err(PhraseError::validation("target locale must not be empty"));
        }
        if target == self.settings().source_locale {
            return Err(PhraseError::validation(format!(
                "target locale {} is the source locale",
                target
            )));
        }
        Ok(target)
    }

    /// Machine-translate one phrase into `target_locale`. Provider failures
    /// propagate and leave the phrase untouched.
    pub async fn translate_phrase(
        &self,
        provider: &dyn TranslationProvider,
        phrase_id: PhraseId,
        target_locale: &str,
    ) -> Result<Phrase> {
        let target = self.check_target_locale(target_locale)?;
        let mut phrase = self.load_phrase(phrase_id).await?;
        let source = self.settings().source_locale.as_str();
        let metrics = PipelineMetrics::global();

        metrics.record_provider_call();
        let translated = translate_with_variable_preservation(&phrase.source_text, |text| async move {
            provider.translate_text(&text, source, target).await
        })
        .await
        .inspect_err(|e| {
            metrics.record_provider_failure();
            warn!("{} failed on phrase {}: {}", provider.name(), phrase_id, e);
        })?;

        let status = store_machine_translation(&mut phrase, target, translated);
        self.save_phrase(&mut phrase).await?;

        info!(
            "Machine-translated phrase {} to {} ({})",
            phrase_id, target, status
        );
        Ok(phrase)
    }

    /// Machine-translate many phrases in one provider batch.
    ///
    /// Missing phrases, items the provider could not translate and failed
    /// writes are all reported in `failures`; nothing is dropped silently.
    pub async fn translate_phrases(
        &self,
        provider: &dyn TranslationProvider,
        ids: &[PhraseId],
        target_locale: &str,
    ) -> Result<BatchTranslationResult> {
        let target = self.check_target_locale(target_locale)?;
        let source = self.settings().source_locale.clone();

        let phrases = self.store().find_many(ids).await?;
        let mut result = BatchTranslationResult {
            locale: target.to_string(),
            requested: ids.len(),
            ..Default::default()
        };

        for id in ids {
            if !phrases.iter().any(|p| p.id == *id) {
                result.failures.push(TranslationFailure {
                    id: *id,
                    message: "phrase not found".to_string(),
                });
            }
        }

        let protected: Vec<_> = phrases
            .iter()
            .map(|p| protect_variables(&p.source_text))
            .collect();
        let texts: Vec<String> = protected.iter().map(|p| p.sanitized.clone()).collect();
        let items = translate_many(provider, &texts, &source, target).await;

        for ((mut phrase, protected), item) in phrases.into_iter().zip(&protected).zip(items) {
            if let Some(error) = item.error {
                result.failures.push(TranslationFailure {
                    id: phrase.id,
                    message: error,
                });
                continue;
            }

            let status = store_machine_translation(&mut phrase, target, protected.restore(&item.text));
            phrase.touch();
            match self.store().update(&phrase).await {
                Ok(true) => {
                    result.translated.push(phrase.id);
                    if status == TranslationStatus::NeedsReview {
                        result.needs_review.push(phrase.id);
                    }
                }
                Ok(false) => result.failures.push(TranslationFailure {
                    id: phrase.id,
                    message: "phrase not found".to_string(),
                }),
                Err(e) => result.failures.push(TranslationFailure {
                    id: phrase.id,
                    message: e.to_string(),
                }),
            }
        }

        info!(
            "Batch translation to {}: {} requested, {} stored, {} need review, {} failed",
            target,
            result.requested,
            result.translated.len(),
            result.needs_review.len(),
            result.failures.len()
        );
        Ok(result)
    }

    /// Machine-translate every active phrase of a project that has no entry
    /// for `target_locale` yet.
    pub async fn translate_untranslated(
        &self,
        provider: &dyn TranslationProvider,
        project_id: ProjectId,
        target_locale: &str,
    ) -> Result<BatchTranslationResult> {
        let target = self.check_target_locale(target_locale)?;
        self.project_by_id(project_id).await?;

        let ids: Vec<PhraseId> = self
            .store()
            .list_by_project(project_id)
            .await?
            .into_iter()
            .filter(|p| !p.is_archived && !p.translations.contains(target))
            .map(|p| p.id)
            .collect();

        if ids.is_empty() {
            info!("Nothing to translate to {} in project {}", target, project_id);
            return Ok(BatchTranslationResult {
                locale: target.to_string(),
                ..Default::default()
            });
        }

        self.translate_phrases(provider, &ids, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineSettings;
    use crate::provider::{MockMode, MockProvider};
    use crate::service::NewPhrase;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    async fn setup(texts: &[&str]) -> (PhraseService, ProjectId, Vec<PhraseId>) {
        let store = MemoryStore::new();
        let project = store.add_project("web", "Web").unwrap();
        let service = PhraseService::from_store(store, PipelineSettings::default());

        let mut ids = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let phrase = service
                .create_phrase(
                    project.id,
                    NewPhrase {
                        key: format!("key_{}", i),
                        source_text: text.to_string(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            ids.push(phrase.id);
        }
        (service, project.id, ids)
    }

    fn mappings(entries: &[(&str, &str)]) -> MockProvider {
        let table: HashMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MockProvider::new(MockMode::Mappings(table))
    }

    #[tokio::test]
    async fn test_translate_phrase_preserves_variables() {
        let (service, _, ids) = setup(&["Hello {{name}}, you have {{count}} messages"]).await;
        let provider = mappings(&[(
            "Hello <VAR0>, you have <VAR1> messages",
            "Bonjour <VAR0>, vous avez <VAR1> messages",
        )]);

        let phrase = service.translate_phrase(&provider, ids[0], "fr").await.unwrap();
        let fr = phrase.translations.get("fr").unwrap();
        assert_eq!(fr.text, "Bonjour {{name}}, vous avez {{count}} messages");
        assert_eq!(fr.status, TranslationStatus::Pending);
        assert!(!fr.is_human);
    }

    #[tokio::test]
    async fn test_translate_phrase_variable_loss_needs_review() {
        let (service, _, ids) = setup(&["Hello {{name}}"]).await;
        let provider = mappings(&[("Hello <VAR0>", "Bonjour")]);

        let phrase = service.translate_phrase(&provider, ids[0], "fr").await.unwrap();
        let fr = phrase.translations.get("fr").unwrap();
        assert_eq!(fr.text, "Bonjour");
        assert_eq!(fr.status, TranslationStatus::NeedsReview);
    }

    #[tokio::test]
    async fn test_translate_phrase_provider_failure_propagates() {
        let (service, _, ids) = setup(&["Hello"]).await;
        let provider = MockProvider::new(MockMode::Error("quota exceeded".into()));

        let err = service.translate_phrase(&provider, ids[0], "fr").await.unwrap_err();
        assert!(matches!(err, PhraseError::Provider(_)));
        assert!(service.get_phrase(ids[0]).await.unwrap().translations.is_empty());
    }

    #[tokio::test]
    async fn test_translate_phrase_rejects_source_locale() {
        let (service, _, ids) = setup(&["Hello"]).await;
        let provider = MockProvider::new(MockMode::Identity);

        assert!(service
            .translate_phrase(&provider, ids[0], "en")
            .await
            .unwrap_err()
            .is_validation());
        assert!(service
            .translate_phrase(&provider, 999, "fr")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_translate_phrases_reports_missing_and_degraded() {
        let (service, _, ids) = setup(&["Save", "Cancel {{item}}", "Unknown"]).await;
        let provider = mappings(&[("Save", "Enregistrer"), ("Cancel <VAR0>", "Annuler <VAR0>")]);

        let mut requested = ids.clone();
        requested.push(999);
        let result = service.translate_phrases(&provider, &requested, "fr").await.unwrap();

        assert_eq!(result.requested, 4);
        assert_eq!(result.translated, vec![ids[0], ids[1]]);
        assert!(result.needs_review.is_empty());

        let failed: Vec<_> = result.failures.iter().map(|f| f.id).collect();
        assert!(failed.contains(&999));
        assert!(failed.contains(&ids[2]));

        let cancel = service.get_phrase(ids[1]).await.unwrap();
        assert_eq!(cancel.translations.get("fr").unwrap().text, "Annuler {{item}}");

        // Degraded items are reported, not stored with their original text
        let unknown = service.get_phrase(ids[2]).await.unwrap();
        assert!(unknown.translations.is_empty());
    }

    #[tokio::test]
    async fn test_translate_untranslated_skips_existing_locale() {
        let (service, project_id, ids) = setup(&["Save", "Cancel"]).await;
        let provider = MockProvider::new(MockMode::Prefix);

        service.translate_phrase(&provider, ids[0], "de").await.unwrap();
        let result = service
            .translate_untranslated(&provider, project_id, "de")
            .await
            .unwrap();

        assert_eq!(result.requested, 1);
        assert_eq!(result.translated, vec![ids[1]]);
        let cancel = service.get_phrase(ids[1]).await.unwrap();
        assert_eq!(cancel.translations.get("de").unwrap().text, "[de] Cancel");
    }
}
