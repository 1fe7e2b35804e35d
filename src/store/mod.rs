//! Persistence seam for phrases and the project lookup.
//!
//! The pipeline only needs document-style access: find, create, update by
//! id and delete by id, plus a uniqueness constraint on
//! `(project_id, source_hash)`. Two implementations exist: [`MemoryStore`]
//! and the PostgreSQL-backed [`crate::db::Database`].

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::phrase::{Phrase, PhraseId, ProjectId, Sighting};

/// Minimal view of a project, owned by the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub key: String,
    pub name: String,
}

/// Read-only project lookup.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn find_project_by_id(&self, id: ProjectId) -> Result<Option<Project>>;

    async fn find_project_by_key(&self, key: &str) -> Result<Option<Project>>;
}

/// Outcome of inserting a phrase.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// Stored; the phrase carries its assigned id
    Inserted(Phrase),
    /// Another phrase with the same (project, source hash) already exists
    Conflict,
}

/// Document store for phrases.
///
/// Single-document writes are atomic; concurrent `update`s of the same
/// phrase resolve as last-write-wins. Occurrence merges go through
/// `record_occurrence` and are never lost. `update_many` and `delete_many`
/// apply all or nothing.
#[async_trait]
pub trait PhraseStore: Send + Sync {
    async fn find_by_id(&self, id: PhraseId) -> Result<Option<Phrase>>;

    async fn find_by_hash(&self, project_id: ProjectId, source_hash: &str) -> Result<Option<Phrase>>;

    async fn find_by_key(&self, project_id: ProjectId, key: &str) -> Result<Option<Phrase>>;

    /// All phrases of a project in id order.
    async fn list_by_project(&self, project_id: ProjectId) -> Result<Vec<Phrase>>;

    async fn find_many(&self, ids: &[PhraseId]) -> Result<Vec<Phrase>>;

    /// Insert a new phrase; its `id` field is ignored and assigned by the store.
    async fn insert(&self, phrase: Phrase) -> Result<InsertOutcome>;

    /// Replace a stored phrase. Returns false when the id does not exist.
    /// Fails with `Conflict` if the new source hash collides with another phrase.
    async fn update(&self, phrase: &Phrase) -> Result<bool>;

    /// Merge a sighting into a stored phrase as one atomic read-modify-write,
    /// so concurrent sightings never lose each other's counts. Returns the
    /// merged phrase, or `None` when the id does not exist.
    async fn record_occurrence(&self, id: PhraseId, sighting: &Sighting) -> Result<Option<Phrase>>;

    /// Replace several phrases in one atomic step. Returns how many existed.
    async fn update_many(&self, phrases: &[Phrase]) -> Result<u64>;

    async fn delete(&self, id: PhraseId) -> Result<bool>;

    /// Delete several phrases in one atomic step. Returns how many existed.
    async fn delete_many(&self, ids: &[PhraseId]) -> Result<u64>;
}
