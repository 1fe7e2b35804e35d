use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{InsertOutcome, PhraseStore, Project, ProjectDirectory};
use crate::error::{PhraseError, Result};
use crate::phrase::{Phrase, PhraseId, ProjectId, Sighting};

#[derive(Default)]
struct Inner {
    next_phrase_id: PhraseId,
    next_project_id: ProjectId,
    projects: BTreeMap<ProjectId, Project>,
    phrases: BTreeMap<PhraseId, Phrase>,
    /// (project, source hash) → phrase id
    hash_index: HashMap<(ProjectId, String), PhraseId>,
}

impl Inner {
    fn hash_owner(&self, project_id: ProjectId, source_hash: &str) -> Option<PhraseId> {
        self.hash_index
            .get(&(project_id, source_hash.to_string()))
            .copied()
    }

    /// Check that storing `phrase` would not collide with a different phrase.
    fn check_unique(&self, phrase: &Phrase) -> Result<()> {
        match self.hash_owner(phrase.project_id, &phrase.source_hash) {
            Some(owner) if owner != phrase.id => Err(PhraseError::Conflict(format!(
                "source hash already used by phrase {}",
                owner
            ))),
            _ => Ok(()),
        }
    }

    fn replace(&mut self, phrase: &Phrase) {
        if let Some(old) = self.phrases.get(&phrase.id) {
            self.hash_index
                .remove(&(old.project_id, old.source_hash.clone()));
        }
        self.hash_index
            .insert((phrase.project_id, phrase.source_hash.clone()), phrase.id);
        self.phrases.insert(phrase.id, phrase.clone());
    }

    fn remove(&mut self, id: PhraseId) -> bool {
        match self.phrases.remove(&id) {
            Some(old) => {
                self.hash_index.remove(&(old.project_id, old.source_hash));
                true
            }
            None => false,
        }
    }
}

/// In-process phrase store.
///
/// Enforces the same `(project, source hash)` uniqueness as the database.
/// The lock is never held across an `.await`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PhraseError::Storage("memory store lock poisoned".to_string()))
    }

    /// Register a project and return it with its assigned id.
    pub fn add_project(&self, key: &str, name: &str) -> Result<Project> {
        let mut inner = self.lock()?;
        if inner.projects.values().any(|p| p.key == key) {
            return Err(PhraseError::Conflict(format!(
                "project key already exists: {}",
                key
            )));
        }
        inner.next_project_id += 1;
        let project = Project {
            id: inner.next_project_id,
            key: key.to_string(),
            name: name.to_string(),
        };
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    pub fn phrase_count(&self) -> Result<usize> {
        Ok(self.lock()?.phrases.len())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phrases = self.inner.lock().map(|i| i.phrases.len()).unwrap_or(0);
        f.debug_struct("MemoryStore")
            .field("phrases", &phrases)
            .finish()
    }
}

#[async_trait]
impl ProjectDirectory for MemoryStore {
    async fn find_project_by_id(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.lock()?.projects.get(&id).cloned())
    }

    async fn find_project_by_key(&self, key: &str) -> Result<Option<Project>> {
        Ok(self
            .lock()?
            .projects
            .values()
            .find(|p| p.key == key)
            .cloned())
    }
}

#[async_trait]
impl PhraseStore for MemoryStore {
    async fn find_by_id(&self, id: PhraseId) -> Result<Option<Phrase>> {
        Ok(self.lock()?.phrases.get(&id).cloned())
    }

    async fn find_by_hash(&self, project_id: ProjectId, source_hash: &str) -> Result<Option<Phrase>> {
        let inner = self.lock()?;
        Ok(inner
            .hash_owner(project_id, source_hash)
            .and_then(|id| inner.phrases.get(&id).cloned()))
    }

    async fn find_by_key(&self, project_id: ProjectId, key: &str) -> Result<Option<Phrase>> {
        Ok(self
            .lock()?
            .phrases
            .values()
            .find(|p| p.project_id == project_id && p.key == key)
            .cloned())
    }

    async fn list_by_project(&self, project_id: ProjectId) -> Result<Vec<Phrase>> {
        Ok(self
            .lock()?
            .phrases
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn find_many(&self, ids: &[PhraseId]) -> Result<Vec<Phrase>> {
        let inner = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.phrases.get(id).cloned())
            .collect())
    }

    async fn insert(&self, mut phrase: Phrase) -> Result<InsertOutcome> {
        let mut inner = self.lock()?;
        if inner
            .hash_owner(phrase.project_id, &phrase.source_hash)
            .is_some()
        {
            return Ok(InsertOutcome::Conflict);
        }

        inner.next_phrase_id += 1;
        phrase.id = inner.next_phrase_id;
        inner.replace(&phrase);
        Ok(InsertOutcome::Inserted(phrase))
    }

    async fn update(&self, phrase: &Phrase) -> Result<bool> {
        let mut inner = self.lock()?;
        if !inner.phrases.contains_key(&phrase.id) {
            return Ok(false);
        }
        inner.check_unique(phrase)?;
        inner.replace(phrase);
        Ok(true)
    }

    async fn record_occurrence(&self, id: PhraseId, sighting: &Sighting) -> Result<Option<Phrase>> {
        let mut inner = self.lock()?;
        Ok(inner.phrases.get_mut(&id).map(|phrase| {
            phrase.record_sighting(sighting);
            phrase.touch();
            phrase.clone()
        }))
    }

    async fn update_many(&self, phrases: &[Phrase]) -> Result<u64> {
        let mut inner = self.lock()?;
        // Validate everything before the first write
        for phrase in phrases {
            if inner.phrases.contains_key(&phrase.id) {
                inner.check_unique(phrase)?;
            }
        }

        let mut updated = 0;
        for phrase in phrases {
            if inner.phrases.contains_key(&phrase.id) {
                inner.replace(phrase);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, id: PhraseId) -> Result<bool> {
        Ok(self.lock()?.remove(id))
    }

    async fn delete_many(&self, ids: &[PhraseId]) -> Result<u64> {
        let mut inner = self.lock()?;
        Ok(ids.iter().filter(|id| inner.remove(**id)).count() as u64)
    }
}
