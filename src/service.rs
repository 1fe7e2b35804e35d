//! The phrase service and explicit phrase management.
//!
//! `PhraseService` is the entry point for every pipeline operation. Its
//! methods are spread across modules by concern: extraction, review,
//! machine translation, batch operations, queries and import/export.

use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::config::PipelineSettings;
use crate::error::{PhraseError, Result};
use crate::phrase::{Phrase, PhraseId, PhraseStatus, ProjectId};
use crate::query::Page;
use crate::store::{InsertOutcome, PhraseStore, Project, ProjectDirectory};

#[derive(Clone)]
pub struct PhraseService {
    store: Arc<dyn PhraseStore>,
    projects: Arc<dyn ProjectDirectory>,
    settings: PipelineSettings,
}

/// Input for [`PhraseService::create_phrase`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhrase {
    pub key: String,
    pub source_text: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<PhraseStatus>,
}

/// Partial update for [`PhraseService::update_phrase`]. `None` leaves a
/// field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseUpdate {
    pub key: Option<String>,
    pub source_text: Option<String>,
    pub context: Option<String>,
    pub status: Option<PhraseStatus>,
    pub tags: Option<Vec<String>>,
    pub is_archived: Option<bool>,
}

/// Filters for [`PhraseService::list_phrases`].
#[derive(Debug, Clone, Default)]
pub struct PhraseListQuery {
    pub page: u32,
    pub limit: u32,
    /// Case-insensitive match against key and source text
    pub search: Option<String>,
    pub tag: Option<String>,
    pub include_archived: bool,
}

impl PhraseService {
    pub fn new(
        store: Arc<dyn PhraseStore>,
        projects: Arc<dyn ProjectDirectory>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            projects,
            settings,
        }
    }

    /// Build a service over a backend that is both phrase store and project
    /// directory (both `MemoryStore` and `Database` are).
    pub fn from_store<S>(store: S, settings: PipelineSettings) -> Self
    where
        S: PhraseStore + ProjectDirectory + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store, settings)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub(crate) fn store(&self) -> &dyn PhraseStore {
        self.store.as_ref()
    }

    pub(crate) async fn project_by_key(&self, key: &str) -> Result<Project> {
        self.projects
            .find_project_by_key(key)
            .await?
            .ok_or_else(|| PhraseError::not_found("project", key))
    }

    pub(crate) async fn project_by_id(&self, id: ProjectId) -> Result<Project> {
        self.projects
            .find_project_by_id(id)
            .await?
            .ok_or_else(|| PhraseError::not_found("project", id))
    }

    pub(crate) async fn load_phrase(&self, id: PhraseId) -> Result<Phrase> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| PhraseError::not_found("phrase", id))
    }

    /// Write back a modified phrase, bumping `updated_at`.
    pub(crate) async fn save_phrase(&self, phrase: &mut Phrase) -> Result<()> {
        phrase.touch();
        if !self.store.update(phrase).await? {
            return Err(PhraseError::not_found("phrase", phrase.id));
        }
        Ok(())
    }

    pub async fn create_phrase(&self, project_id: ProjectId, input: NewPhrase) -> Result<Phrase> {
        self.project_by_id(project_id).await?;

        let key = input.key.trim();
        if key.is_empty() {
            return Err(PhraseError::validation("phrase key must not be empty"));
        }
        if input.source_text.trim().is_empty() {
            return Err(PhraseError::validation("source text must not be empty"));
        }
        if self.store.find_by_key(project_id, key).await?.is_some() {
            return Err(PhraseError::validation(format!(
                "phrase key '{}' already exists in this project",
                key
            )));
        }

        let mut phrase = Phrase::new(project_id, key, input.source_text, input.context);
        if let Some(existing) = self.store.find_by_hash(project_id, &phrase.source_hash).await? {
            return Err(PhraseError::validation(format!(
                "identical source text is already tracked as '{}'",
                existing.key
            )));
        }
        for tag in &input.tags {
            phrase.add_tag(tag);
        }
        if let Some(status) = input.status {
            phrase.status = status;
            phrase.is_archived = status == PhraseStatus::Archived;
        }

        match self.store.insert(phrase).await? {
            InsertOutcome::Inserted(phrase) => {
                info!("Created phrase {} ({}) in project {}", phrase.id, phrase.key, project_id);
                Ok(phrase)
            }
            InsertOutcome::Conflict => Err(PhraseError::validation(
                "identical source text is already tracked in this project",
            )),
        }
    }

    pub async fn get_phrase(&self, id: PhraseId) -> Result<Phrase> {
        self.load_phrase(id).await
    }

    pub async fn update_phrase(&self, id: PhraseId, update: PhraseUpdate) -> Result<Phrase> {
        let mut phrase = self.load_phrase(id).await?;

        if let Some(key) = update.key {
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(PhraseError::validation("phrase key must not be empty"));
            }
            if key != phrase.key {
                if let Some(other) = self.store.find_by_key(phrase.project_id, &key).await? {
                    if other.id != phrase.id {
                        return Err(PhraseError::validation(format!(
                            "phrase key '{}' already exists in this project",
                            key
                        )));
                    }
                }
                phrase.key = key;
            }
        }

        if update.source_text.is_some() || update.context.is_some() {
            let source_text = update
                .source_text
                .unwrap_or_else(|| phrase.source_text.clone());
            if source_text.trim().is_empty() {
                return Err(PhraseError::validation("source text must not be empty"));
            }
            let context = update.context.or_else(|| phrase.context.clone());
            phrase.set_source(source_text, context);
        }

        if let Some(status) = update.status {
            phrase.status = status;
        }
        if let Some(is_archived) = update.is_archived {
            phrase.is_archived = is_archived;
        }
        if let Some(tags) = update.tags {
            phrase.tags.clear();
            for tag in &tags {
                phrase.add_tag(tag);
            }
        }

        match self.save_phrase(&mut phrase).await {
            Err(PhraseError::Conflict(_)) => Err(PhraseError::validation(
                "identical source text is already tracked in this project",
            )),
            other => other.map(|_| phrase),
        }
    }

    pub async fn delete_phrase(&self, id: PhraseId) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(PhraseError::not_found("phrase", id));
        }
        info!("Deleted phrase {}", id);
        Ok(())
    }

    pub async fn list_phrases(&self, project_id: ProjectId, query: PhraseListQuery) -> Result<Page<Phrase>> {
        self.project_by_id(project_id).await?;

        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let matches: Vec<Phrase> = self
            .store
            .list_by_project(project_id)
            .await?
            .into_iter()
            .filter(|p| query.include_archived || !p.is_archived)
            .filter(|p| query.tag.as_deref().map_or(true, |tag| p.has_tag(tag)))
            .filter(|p| {
                search.as_deref().map_or(true, |needle| {
                    p.key.to_lowercase().contains(needle)
                        || p.source_text.to_lowercase().contains(needle)
                })
            })
            .collect();

        Ok(Page::paginate(
            matches,
            query.page,
            query.limit,
            self.settings.max_page_size,
        ))
    }
}
