use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::Result;
use crate::phrase::{Phrase, PhraseId, ProjectId, Sighting};
use crate::store::{InsertOutcome, PhraseStore, Project, ProjectDirectory};

/// PostgreSQL-backed phrase store.
///
/// Each phrase is kept as a JSON document next to the columns needed for
/// lookups. `UNIQUE (project_id, source_hash)` is the dedup constraint.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

const PHRASE_COLUMNS: &str = "id, document";

impl Database {
    /// Connect and create tables if needed
    pub async fn new(database_url: &str) -> AnyResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.migrate().await?;
        info!("Database ready");
        Ok(db)
    }

    async fn migrate(&self) -> AnyResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS projects (
                id BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create projects table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS phrases (
                id BIGSERIAL PRIMARY KEY,
                project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                key TEXT NOT NULL,
                source_hash TEXT NOT NULL,
                is_archived BOOLEAN NOT NULL DEFAULT FALSE,
                document TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (project_id, source_hash)
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create phrases table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS phrases_project_key_idx ON phrases (project_id, key)")
            .execute(&self.pool)
            .await
            .context("Failed to create phrase key index")?;

        Ok(())
    }

    /// Register a project (admin helper; project CRUD lives elsewhere)
    pub async fn create_project(&self, key: &str, name: &str) -> Result<Project> {
        let row = sqlx::query("INSERT INTO projects (key, name) VALUES ($1, $2) RETURNING id")
            .bind(key)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(Project {
            id: row.try_get("id")?,
            key: key.to_string(),
            name: name.to_string(),
        })
    }

    fn phrase_from_row(row: &PgRow) -> Result<Phrase> {
        let id: i64 = row.try_get("id")?;
        let document: String = row.try_get("document")?;
        let mut phrase: Phrase = serde_json::from_str(&document)?;
        phrase.id = id;
        Ok(phrase)
    }

    fn project_from_row(row: &PgRow) -> Result<Project> {
        Ok(Project {
            id: row.try_get("id")?,
            key: row.try_get("key")?,
            name: row.try_get("name")?,
        })
    }

    async fn find_phrase_where(&self, clause: &str, binds: (ProjectId, &str)) -> Result<Option<Phrase>> {
        let sql = format!("SELECT {} FROM phrases WHERE {}", PHRASE_COLUMNS, clause);
        let row = sqlx::query(&sql)
            .bind(binds.0)
            .bind(binds.1)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::phrase_from_row).transpose()
    }
}

#[async_trait]
impl ProjectDirectory for Database {
    async fn find_project_by_id(&self, id: ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT id, key, name FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::project_from_row).transpose()
    }

    async fn find_project_by_key(&self, key: &str) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT id, key, name FROM projects WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::project_from_row).transpose()
    }
}

#[async_trait]
impl PhraseStore for Database {
    async fn find_by_id(&self, id: PhraseId) -> Result<Option<Phrase>> {
        let sql = format!("SELECT {} FROM phrases WHERE id = $1", PHRASE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::phrase_from_row).transpose()
    }

    async fn find_by_hash(&self, project_id: ProjectId, source_hash: &str) -> Result<Option<Phrase>> {
        self.find_phrase_where("project_id = $1 AND source_hash = $2", (project_id, source_hash))
            .await
    }

    async fn find_by_key(&self, project_id: ProjectId, key: &str) -> Result<Option<Phrase>> {
        self.find_phrase_where(
            "project_id = $1 AND key = $2 ORDER BY id LIMIT 1",
            (project_id, key),
        )
        .await
    }

    async fn list_by_project(&self, project_id: ProjectId) -> Result<Vec<Phrase>> {
        let sql = format!(
            "SELECT {} FROM phrases WHERE project_id = $1 ORDER BY id",
            PHRASE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::phrase_from_row).collect()
    }

    async fn find_many(&self, ids: &[PhraseId]) -> Result<Vec<Phrase>> {
        let sql = format!(
            "SELECT {} FROM phrases WHERE id = ANY($1) ORDER BY id",
            PHRASE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::phrase_from_row).collect()
    }

    async fn insert(&self, mut phrase: Phrase) -> Result<InsertOutcome> {
        let document = serde_json::to_string(&phrase)?;
        let row = sqlx::query(
            "INSERT INTO phrases (project_id, key, source_hash, is_archived, document, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (project_id, source_hash) DO NOTHING
             RETURNING id",
        )
        .bind(phrase.project_id)
        .bind(&phrase.key)
        .bind(&phrase.source_hash)
        .bind(phrase.is_archived)
        .bind(&document)
        .bind(phrase.created_at)
        .bind(phrase.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                phrase.id = row.try_get("id")?;
                Ok(InsertOutcome::Inserted(phrase))
            }
            None => {
                debug!(
                    "Insert skipped, source hash {} already exists in project {}",
                    phrase.source_hash, phrase.project_id
                );
                Ok(InsertOutcome::Conflict)
            }
        }
    }

    async fn update(&self, phrase: &Phrase) -> Result<bool> {
        let document = serde_json::to_string(phrase)?;
        let result = sqlx::query(
            "UPDATE phrases
             SET key = $1, source_hash = $2, is_archived = $3, document = $4, updated_at = $5
             WHERE id = $6",
        )
        .bind(&phrase.key)
        .bind(&phrase.source_hash)
        .bind(phrase.is_archived)
        .bind(&document)
        .bind(Utc::now())
        .bind(phrase.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_occurrence(&self, id: PhraseId, sighting: &Sighting) -> Result<Option<Phrase>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM phrases WHERE id = $1 FOR UPDATE", PHRASE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut phrase = Self::phrase_from_row(&row)?;
        phrase.record_sighting(sighting);
        phrase.touch();

        let document = serde_json::to_string(&phrase)?;
        sqlx::query("UPDATE phrases SET document = $1, updated_at = $2 WHERE id = $3")
            .bind(&document)
            .bind(phrase.updated_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(phrase))
    }

    async fn update_many(&self, phrases: &[Phrase]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for phrase in phrases {
            let document = serde_json::to_string(phrase)?;
            let result = sqlx::query(
                "UPDATE phrases
                 SET key = $1, source_hash = $2, is_archived = $3, document = $4, updated_at = $5
                 WHERE id = $6",
            )
            .bind(&phrase.key)
            .bind(&phrase.source_hash)
            .bind(phrase.is_archived)
            .bind(&document)
            .bind(Utc::now())
            .bind(phrase.id)
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: PhraseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM phrases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, ids: &[PhraseId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM phrases WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
