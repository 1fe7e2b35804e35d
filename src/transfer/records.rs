//! Wire records shared by every export format, and the flat table layout
//! used by CSV and XLSX.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::phrase::{Phrase, PhraseId, PhraseStatus, Translation, TranslationStatus};

pub const BASE_COLUMNS: [&str; 7] = [
    "id",
    "key",
    "sourceText",
    "context",
    "status",
    "isArchived",
    "tags",
];

const TEXT_SUFFIX: &str = "_text";
const STATUS_SUFFIX: &str = "_status";
const HUMAN_SUFFIX: &str = "_isHuman";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    pub text: String,
    pub status: TranslationStatus,
    pub is_human: bool,
}

/// One exported phrase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub id: PhraseId,
    pub key: String,
    pub source_text: String,
    pub context: Option<String>,
    pub status: PhraseStatus,
    pub is_archived: bool,
    pub tags: Vec<String>,
    pub translations: IndexMap<String, TranslationRecord>,
}

impl ExportRecord {
    /// Build a record, keeping only `locales` when given.
    pub fn from_phrase(phrase: &Phrase, locales: Option<&[String]>) -> Self {
        let translations = phrase
            .translations
            .iter()
            .filter(|(locale, _)| locales.map_or(true, |l| l.iter().any(|x| x == locale)))
            .map(|(locale, t)| {
                (
                    locale.to_string(),
                    TranslationRecord {
                        text: t.text.clone(),
                        status: t.status,
                        is_human: t.is_human,
                    },
                )
            })
            .collect();

        Self {
            id: phrase.id,
            key: phrase.key.clone(),
            source_text: phrase.source_text.clone(),
            context: phrase.context.clone(),
            status: phrase.status,
            is_archived: phrase.is_archived,
            tags: phrase.tags.clone(),
            translations,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTranslation {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_human: Option<bool>,
}

/// One imported phrase before validation. Every field is optional so a
/// malformed row becomes a diagnostic instead of failing the whole file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportRecord {
    pub key: Option<String>,
    pub source_text: Option<String>,
    pub context: Option<String>,
    pub status: Option<String>,
    pub is_archived: Option<bool>,
    pub tags: Vec<String>,
    pub translations: IndexMap<String, ImportTranslation>,
}

/// A validated import row.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    pub key: String,
    pub source_text: String,
    pub context: Option<String>,
    pub status: Option<PhraseStatus>,
    pub is_archived: Option<bool>,
    pub tags: Vec<String>,
    pub translations: Vec<(String, Translation)>,
    /// Translation entries that were present but not imported, with the reason
    pub skipped: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ImportRecord {
    pub fn validate(self) -> Result<ValidRecord, String> {
        let key = non_empty(self.key).ok_or("missing key")?;
        let source_text = self
            .source_text
            .filter(|t| !t.trim().is_empty())
            .ok_or("missing sourceText")?;

        let status = non_empty(self.status)
            .map(|s| s.parse::<PhraseStatus>())
            .transpose()
            .map_err(|e| e.to_string())?;

        let mut translations = Vec::new();
        let mut skipped = Vec::new();
        for (locale, entry) in self.translations {
            let locale = locale.trim().to_string();
            if locale.is_empty() {
                skipped.push("translation with an empty locale skipped".to_string());
                continue;
            }
            if entry.text.is_empty() {
                skipped.push(format!("{} translation has no text, skipped", locale));
                continue;
            }
            let status = non_empty(entry.status)
                .map(|s| s.parse::<TranslationStatus>())
                .transpose()
                .map_err(|e| format!("{}: {}", locale, e))?
                .unwrap_or_default();
            translations.push((
                locale,
                Translation::new(entry.text, status, entry.is_human.unwrap_or(true)),
            ));
        }

        Ok(ValidRecord {
            key,
            source_text,
            context: non_empty(self.context),
            status,
            is_archived: self.is_archived,
            tags: self
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            translations,
            skipped,
        })
    }
}

impl ValidRecord {
    /// Copy the imported fields onto `phrase`. Translations are upserted so
    /// locales missing from the row are kept.
    pub fn apply_to(self, phrase: &mut Phrase) {
        if phrase.source_text != self.source_text || phrase.context != self.context {
            phrase.set_source(self.source_text, self.context);
        }
        if let Some(status) = self.status {
            phrase.status = status;
        }
        if let Some(is_archived) = self.is_archived {
            phrase.is_archived = is_archived;
        }
        if !self.tags.is_empty() {
            phrase.tags.clear();
            for tag in &self.tags {
                phrase.add_tag(tag);
            }
        }
        for (locale, translation) in self.translations {
            phrase.translations.upsert(locale, translation);
        }
    }
}

/// A header row plus string cells, the common shape of CSV and XLSX.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows that could not be read, by position in `rows` (those rows are empty)
    pub unreadable: Vec<(usize, String)>,
}

fn parse_bool(value: &str) -> Result<Option<bool>, String> {
    match value.trim().to_lowercase().as_str() {
        "" => Ok(None),
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        other => Err(format!("invalid boolean: {}", other)),
    }
}

impl Table {
    pub fn from_records(records: &[ExportRecord], locales: &[String]) -> Self {
        let mut headers: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
        for locale in locales {
            headers.push(format!("{}{}", locale, TEXT_SUFFIX));
            headers.push(format!("{}{}", locale, STATUS_SUFFIX));
            headers.push(format!("{}{}", locale, HUMAN_SUFFIX));
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut row = vec![
                    record.id.to_string(),
                    record.key.clone(),
                    record.source_text.clone(),
                    record.context.clone().unwrap_or_default(),
                    record.status.to_string(),
                    record.is_archived.to_string(),
                    record.tags.join(","),
                ];
                for locale in locales {
                    match record.translations.get(locale) {
                        Some(t) => {
                            row.push(t.text.clone());
                            row.push(t.status.to_string());
                            row.push(t.is_human.to_string());
                        }
                        None => row.extend([String::new(), String::new(), String::new()]),
                    }
                }
                row
            })
            .collect();

        Self {
            headers,
            rows,
            unreadable: Vec::new(),
        }
    }

    /// Locales named by `<locale>_text` columns, in column order.
    fn locales(&self) -> Vec<String> {
        self.headers
            .iter()
            .filter_map(|h| h.strip_suffix(TEXT_SUFFIX))
            .filter(|l| !l.is_empty() && !BASE_COLUMNS.contains(l))
            .map(str::to_string)
            .collect()
    }

    /// Turn every data row into an import record; a row with a malformed
    /// cell yields an error message instead.
    ///
    /// A locale whose text, status and isHuman cells are all blank means "no
    /// translation" (that is how export writes missing locales). A status or
    /// isHuman without text becomes an entry with empty text, which
    /// validation reports as skipped.
    pub fn into_records(self) -> Vec<Result<ImportRecord, String>> {
        let index: HashMap<&str, usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim(), i))
            .collect();
        let locales = self.locales();

        self.rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                if let Some((_, message)) = self.unreadable.iter().find(|(at, _)| *at == position) {
                    return Err(message.clone());
                }

                let cell = |name: &str| -> Option<String> {
                    index
                        .get(name)
                        .and_then(|&i| row.get(i))
                        .map(|v| v.to_string())
                        .filter(|v| !v.is_empty())
                };

                let mut translations = IndexMap::new();
                for locale in &locales {
                    let text = cell(&format!("{}{}", locale, TEXT_SUFFIX));
                    let status = cell(&format!("{}{}", locale, STATUS_SUFFIX));
                    let human = cell(&format!("{}{}", locale, HUMAN_SUFFIX));
                    if text.is_none() && status.is_none() && human.is_none() {
                        continue;
                    }
                    let is_human = parse_bool(&human.unwrap_or_default())
                        .map_err(|e| format!("{}{}: {}", locale, HUMAN_SUFFIX, e))?;
                    translations.insert(
                        locale.clone(),
                        ImportTranslation {
                            text: text.unwrap_or_default(),
                            status,
                            is_human,
                        },
                    );
                }

                Ok(ImportRecord {
                    key: cell("key"),
                    source_text: cell("sourceText"),
                    context: cell("context"),
                    status: cell("status"),
                    is_archived: parse_bool(&cell("isArchived").unwrap_or_default())
                        .map_err(|e| format!("isArchived: {}", e))?,
                    tags: cell("tags")
                        .map(|t| t.split(',').map(str::to_string).collect())
                        .unwrap_or_default(),
                    translations,
                })
            })
            .collect()
    }
}
