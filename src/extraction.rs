//! Batch ingestion of scraped source strings.
//!
//! Each item is deduplicated by `(project, source_hash)`: a hit merges the
//! new sighting into the stored phrase, a miss creates a phrase with a
//! generated key.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PhraseError, Result};
use crate::metrics::PipelineMetrics;
use crate::phrase::{hash, Location, Occurrences, Phrase, PhraseId, ProjectId, Sighting};
use crate::service::PhraseService;
use crate::store::InsertOutcome;

/// Attempts per item when an insert loses the uniqueness race
const MAX_RACE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub project_key: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    pub items: Vec<ExtractionItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionItem {
    pub source_text: String,
    #[serde(default)]
    pub context: Option<String>,
    /// Sightings represented by this item; missing or 0 counts as 1
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub locations: Vec<LocationInput>,
}

/// A location as submitted by a client; the timestamp is assigned on ingest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInput {
    pub url: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub element: Option<String>,
}

impl LocationInput {
    fn stamp(&self, now: DateTime<Utc>) -> Location {
        Location {
            url: self.url.clone(),
            path: self.path.clone(),
            context: self.context.clone(),
            element: self.element.clone(),
            timestamp: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub index: usize,
    pub created: bool,
    pub id: PhraseId,
    pub hash: String,
    /// The stored text normalizes differently from the submitted text
    pub text_changed: bool,
}

/// Submission indexes that share one source hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCluster {
    pub hash: String,
    pub indexes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub results: Vec<ExtractionResult>,
    pub duplicates: Vec<DuplicateCluster>,
    pub errors: Vec<ItemError>,
    pub created: usize,
    pub updated: usize,
}

/// Group submission indexes by hash, keeping only hashes seen more than once.
fn duplicate_clusters(hashes: &[(usize, String)]) -> Vec<DuplicateCluster> {
    let mut groups: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (index, hash) in hashes {
        groups.entry(hash.as_str()).or_default().push(*index);
    }
    groups
        .into_iter()
        .filter(|(_, indexes)| indexes.len() > 1)
        .map(|(hash, indexes)| DuplicateCluster {
            hash: hash.to_string(),
            indexes,
        })
        .collect()
}

struct ItemContext<'a> {
    project_id: ProjectId,
    source_url: Option<&'a str>,
    source_type: Option<&'a str>,
}

impl PhraseService {
    /// Ingest a batch of extracted strings.
    ///
    /// An unknown project fails the whole call. Per-item failures are
    /// collected in `errors` and never abort the batch.
    pub async fn batch_extract(&self, request: ExtractionRequest) -> Result<ExtractionResponse> {
        let project = self.project_by_key(&request.project_key).await?;
        let ctx = ItemContext {
            project_id: project.id,
            source_url: request.source_url.as_deref(),
            source_type: request.source_type.as_deref(),
        };

        let mut response = ExtractionResponse::default();
        let mut hashes = Vec::with_capacity(request.items.len());

        for (index, item) in request.items.iter().enumerate() {
            if item.source_text.trim().is_empty() {
                response.errors.push(ItemError {
                    index,
                    message: "source text must not be empty".to_string(),
                });
                continue;
            }

            let source_hash = hash::source_hash(&item.source_text);
            hashes.push((index, source_hash.clone()));

            match self.extract_item(&ctx, item, &source_hash).await {
                Ok((id, created, text_changed)) => {
                    if created {
                        response.created += 1;
                    } else {
                        response.updated += 1;
                    }
                    response.results.push(ExtractionResult {
                        index,
                        created,
                        id,
                        hash: source_hash,
                        text_changed,
                    });
                }
                Err(e) => {
                    warn!("Extraction item {} failed: {}", index, e);
                    response.errors.push(ItemError {
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }

        response.duplicates = duplicate_clusters(&hashes);

        info!(
            "Extraction for project {}: {} created, {} updated, {} errors, {} duplicate clusters",
            project.key,
            response.created,
            response.updated,
            response.errors.len(),
            response.duplicates.len()
        );

        Ok(response)
    }

    /// Returns `(id, created, text_changed)`.
    async fn extract_item(
        &self,
        ctx: &ItemContext<'_>,
        item: &ExtractionItem,
        source_hash: &str,
    ) -> Result<(PhraseId, bool, bool)> {
        let count = item.count.filter(|&c| c > 0).unwrap_or(1);

        for attempt in 1..=MAX_RACE_ATTEMPTS {
            let now = Utc::now();
            let locations: Vec<Location> = item.locations.iter().map(|l| l.stamp(now)).collect();

            if let Some(existing) = self.store().find_by_hash(ctx.project_id, source_hash).await? {
                let text_changed = hash::source_hash(&existing.source_text) != source_hash;
                let sighting = Sighting {
                    count,
                    seen_at: now,
                    locations,
                    source_url: ctx.source_url.map(str::to_string),
                    source_type: ctx.source_type.map(str::to_string),
                };

                if self.store().record_occurrence(existing.id, &sighting).await?.is_some() {
                    return Ok((existing.id, false, text_changed));
                }
                debug!(
                    "Phrase {} was deleted before its sighting was recorded (attempt {}/{})",
                    existing.id, attempt, MAX_RACE_ATTEMPTS
                );
                continue;
            }

            let key = hash::generate_key(&item.source_text, self.settings().key_max_length);
            let mut phrase = Phrase::new(ctx.project_id, key, item.source_text.clone(), item.context.clone());
            phrase.occurrences = Occurrences::first(count, now, locations);
            phrase.last_seen_at = Some(now);
            phrase.source_url = ctx.source_url.map(str::to_string);
            phrase.source_type = ctx.source_type.map(str::to_string);

            match self.store().insert(phrase).await? {
                InsertOutcome::Inserted(phrase) => {
                    debug!("Created phrase {} ({})", phrase.id, phrase.key);
                    return Ok((phrase.id, true, false));
                }
                InsertOutcome::Conflict => {
                    PipelineMetrics::global().record_extraction_conflict();
                    debug!(
                        "Insert of {} lost a race (attempt {}/{}), merging instead",
                        source_hash, attempt, MAX_RACE_ATTEMPTS
                    );
                }
            }
        }

        Err(PhraseError::Storage(format!(
            "phrase {} kept conflicting after {} attempts",
            source_hash, MAX_RACE_ATTEMPTS
        )))
    }
}
