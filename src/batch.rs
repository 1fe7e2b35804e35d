//! Bulk operations over a list of phrase ids.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{PhraseError, Result};
use crate::phrase::{Phrase, PhraseId, TranslationStatus};
use crate::review::review_in_place;
use crate::service::PhraseService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOperation {
    Archive,
    Delete,
    Tag,
    Untag,
    ApproveTranslations,
    RejectTranslations,
}

impl BatchOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOperation::Archive => "archive",
            BatchOperation::Delete => "delete",
            BatchOperation::Tag => "tag",
            BatchOperation::Untag => "untag",
            BatchOperation::ApproveTranslations => "approve_translations",
            BatchOperation::RejectTranslations => "reject_translations",
        }
    }
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchOperation {
    type Err = PhraseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "archive" => Ok(BatchOperation::Archive),
            "delete" => Ok(BatchOperation::Delete),
            "tag" => Ok(BatchOperation::Tag),
            "untag" => Ok(BatchOperation::Untag),
            "approve_translations" => Ok(BatchOperation::ApproveTranslations),
            "reject_translations" => Ok(BatchOperation::RejectTranslations),
            other => Err(PhraseError::validation(format!(
                "unsupported batch operation: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub id: PhraseId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub operation: BatchOperation,
    /// Ids that exist in the store
    pub matched: usize,
    /// Phrases actually changed (or deleted)
    pub modified: usize,
    /// Matched phrases left unchanged (tag already present, no entry for the locale, ...)
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchResult {
    fn new(operation: BatchOperation, matched: usize) -> Self {
        Self {
            operation,
            matched,
            modified: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }
}

fn require<'a>(value: Option<&'a str>, what: &str, operation: BatchOperation) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PhraseError::validation(format!("{} requires a {}", operation, what)))
}

impl PhraseService {
    /// Apply `operation` to every phrase in `ids`.
    ///
    /// Archive, delete, tag and untag are written in one atomic store call.
    /// Approve and reject are applied phrase by phrase and collect failures.
    pub async fn process_batch(
        &self,
        operation: BatchOperation,
        ids: &[PhraseId],
        tag: Option<&str>,
        locale: Option<&str>,
    ) -> Result<BatchResult> {
        let tag = match operation {
            BatchOperation::Tag | BatchOperation::Untag => Some(require(tag, "tag", operation)?),
            _ => None,
        };
        let locale = match operation {
            BatchOperation::ApproveTranslations | BatchOperation::RejectTranslations => {
                Some(require(locale, "locale", operation)?)
            }
            _ => None,
        };

        let phrases = self.store().find_many(ids).await?;
        let mut result = BatchResult::new(operation, phrases.len());

        match operation {
            BatchOperation::Delete => {
                let matched: Vec<PhraseId> = phrases.iter().map(|p| p.id).collect();
                result.modified = self.store().delete_many(&matched).await? as usize;
            }
            BatchOperation::Archive | BatchOperation::Tag | BatchOperation::Untag => {
                let mut changed: Vec<Phrase> = Vec::new();
                for mut phrase in phrases {
                    let modified = match operation {
                        BatchOperation::Archive => !std::mem::replace(&mut phrase.is_archived, true),
                        BatchOperation::Tag => phrase.add_tag(tag.unwrap_or_default()),
                        _ => phrase.remove_tag(tag.unwrap_or_default()),
                    };
                    if modified {
                        phrase.touch();
                        changed.push(phrase);
                    } else {
                        result.skipped += 1;
                    }
                }
                if !changed.is_empty() {
                    result.modified = self.store().update_many(&changed).await? as usize;
                }
            }
            BatchOperation::ApproveTranslations | BatchOperation::RejectTranslations => {
                let status = if operation == BatchOperation::ApproveTranslations {
                    TranslationStatus::Approved
                } else {
                    TranslationStatus::Rejected
                };
                let locale = locale.unwrap_or_default();

                for mut phrase in phrases {
                    if !review_in_place(&mut phrase, locale, status, None) {
                        result.skipped += 1;
                        continue;
                    }
                    match self.store().update(&phrase).await {
                        Ok(true) => result.modified += 1,
                        Ok(false) => result.failures.push(BatchFailure {
                            id: phrase.id,
                            message: "phrase disappeared during batch".to_string(),
                        }),
                        Err(e) => {
                            warn!("Batch {} failed for phrase {}: {}", operation, phrase.id, e);
                            result.failures.push(BatchFailure {
                                id: phrase.id,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        info!(
            "Batch {}: {} requested, {} matched, {} modified, {} skipped, {} failed",
            operation,
            ids.len(),
            result.matched,
            result.modified,
            result.skipped,
            result.failures.len()
        );
        Ok(result)
    }
}
