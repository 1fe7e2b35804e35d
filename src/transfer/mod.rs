//! Import and export of phrase data as JSON, CSV or XLSX.
//!
//! - `records`: wire records and the flat table layout
//! - `delimited`: CSV codec
//! - `spreadsheet`: XLSX codec

mod delimited;
mod records;
mod spreadsheet;

pub use records::{ExportRecord, ImportRecord, ImportTranslation, Table, TranslationRecord};

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{PhraseError, Result};
use crate::phrase::{Phrase, PhraseStatus, ProjectId};
use crate::service::PhraseService;
use crate::store::InsertOutcome;
use records::ValidRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    /// Pick the format from a file's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                PhraseError::validation(format!("{} has no file extension", path.display()))
            })?
            .parse()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = PhraseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(PhraseError::validation(format!(
                "unsupported format: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Locales to emit; discovered from the data when `None`
    pub locales: Option<Vec<String>>,
    /// Only export phrases with this lifecycle status
    pub status: Option<PhraseStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Update phrases whose key already exists instead of skipping them
    pub overwrite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub diagnostics: Vec<String>,
}

enum RowOutcome {
    Imported,
    Updated,
    Skipped,
}

/// Deletes the uploaded file when dropped, whatever the import outcome.
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!("Removed import file {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove import file {}: {}", self.0.display(), e),
        }
    }
}

/// Locales in first-seen order across `phrases`.
fn discover_locales(phrases: &[Phrase]) -> Vec<String> {
    let mut locales: Vec<String> = Vec::new();
    for phrase in phrases {
        for locale in phrase.translations.locales() {
            if !locales.iter().any(|l| l == locale) {
                locales.push(locale.to_string());
            }
        }
    }
    locales
}

fn encode(format: ExportFormat, records: &[ExportRecord], locales: &[String]) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Json => serde_json::to_vec_pretty(records)
            .map_err(|e| PhraseError::Export(format!("json: {}", e))),
        ExportFormat::Csv => delimited::encode(&Table::from_records(records, locales)),
        ExportFormat::Xlsx => spreadsheet::encode(&Table::from_records(records, locales)),
    }
}

fn decode(format: ExportFormat, bytes: &[u8]) -> Result<Vec<std::result::Result<ImportRecord, String>>> {
    match format {
        ExportFormat::Json => {
            let rows: Vec<serde_json::Value> = serde_json::from_slice(bytes).map_err(|e| {
                PhraseError::validation(format!("import file is not a JSON array: {}", e))
            })?;
            Ok(rows
                .into_iter()
                .map(|row| {
                    serde_json::from_value::<ImportRecord>(row)
                        .map_err(|e| format!("malformed record: {}", e))
                })
                .collect())
        }
        ExportFormat::Csv => Ok(delimited::decode(bytes)?.into_records()),
        ExportFormat::Xlsx => Ok(spreadsheet::decode(bytes)?.into_records()),
    }
}

impl PhraseService {
    /// Serialize a project's phrases. An unknown format fails before the
    /// store is touched; an encoding failure yields no payload at all.
    pub async fn export_phrases(
        &self,
        project_id: ProjectId,
        format: &str,
        options: ExportOptions,
    ) -> Result<ExportPayload> {
        let format: ExportFormat = format.parse()?;
        let project = self.project_by_id(project_id).await?;

        let phrases: Vec<Phrase> = self
            .store()
            .list_by_project(project_id)
            .await?
            .into_iter()
            .filter(|p| options.status.map_or(true, |s| p.status == s))
            .collect();

        let locales = match options.locales {
            Some(locales) => locales
                .into_iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            None => discover_locales(&phrases),
        };

        let records: Vec<ExportRecord> = phrases
            .iter()
            .map(|p| ExportRecord::from_phrase(p, Some(&locales)))
            .collect();
        let bytes = encode(format, &records, &locales)?;

        let filename = format!(
            "{}-phrases-{}.{}",
            project.key,
            Utc::now().format("%Y%m%d%H%M%S"),
            format.extension()
        );
        info!(
            "Exported {} phrases ({} locales) from {} as {}",
            records.len(),
            locales.len(),
            project.key,
            format
        );

        Ok(ExportPayload {
            bytes,
            filename,
            mime_type: format.mime_type(),
        })
    }

    /// Import phrases from an uploaded file, which is removed afterwards on
    /// every path.
    pub async fn import_phrases(
        &self,
        project_id: ProjectId,
        path: impl AsRef<Path>,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        let path = path.as_ref();
        let _cleanup = RemoveOnDrop(path.to_path_buf());

        let project = self.project_by_id(project_id).await?;
        let format = ExportFormat::from_path(path)?;
        let bytes = tokio::fs::read(path).await?;
        let records = decode(format, &bytes)?;

        let mut summary = ImportSummary::default();
        for (i, record) in records.into_iter().enumerate() {
            let row = i + 1;
            let outcome = match record.and_then(ImportRecord::validate) {
                Ok(valid) => {
                    for note in &valid.skipped {
                        summary.diagnostics.push(format!("row {}: {}", row, note));
                    }
                    self.import_record(project_id, valid, options.overwrite)
                        .await
                        .map_err(|e| e.to_string())
                }
                Err(message) => Err(message),
            };

            match outcome {
                Ok(RowOutcome::Imported) => summary.imported += 1,
                Ok(RowOutcome::Updated) => summary.updated += 1,
                Ok(RowOutcome::Skipped) => summary.skipped += 1,
                Err(message) => {
                    summary.errors += 1;
                    summary.diagnostics.push(format!("row {}: {}", row, message));
                }
            }
        }

        info!(
            "Imported {} into {}: {} new, {} updated, {} skipped, {} errors",
            path.display(),
            project.key,
            summary.imported,
            summary.updated,
            summary.skipped,
            summary.errors
        );
        Ok(summary)
    }

    async fn import_record(
        &self,
        project_id: ProjectId,
        record: ValidRecord,
        overwrite: bool,
    ) -> Result<RowOutcome> {
        if let Some(mut existing) = self.store().find_by_key(project_id, &record.key).await? {
            if !overwrite {
                return Ok(RowOutcome::Skipped);
            }
            record.apply_to(&mut existing);
            self.save_phrase(&mut existing).await?;
            return Ok(RowOutcome::Updated);
        }

        let mut phrase = Phrase::new(
            project_id,
            record.key.clone(),
            record.source_text.clone(),
            record.context.clone(),
        );
        record.apply_to(&mut phrase);

        match self.store().insert(phrase).await? {
            InsertOutcome::Inserted(_) => Ok(RowOutcome::Imported),
            InsertOutcome::Conflict => Err(PhraseError::Conflict(
                "identical source text is already tracked under another key".to_string(),
            )),
        }
    }
}
