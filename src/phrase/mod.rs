//! Phrase entity model.
//!
//! - `model`: the `Phrase` record, lifecycle status, occurrences
//! - `translations`: per-locale translations, ordered locale map, completion derivation
//! - `hash`: normalization, content hashes and generated keys

pub mod hash;
mod model;
mod translations;

pub use model::{Location, Occurrences, Phrase, PhraseId, PhraseStatus, ProjectId, Sighting};
pub use translations::{CompletionCategory, Translation, TranslationMap, TranslationStatus};
