//! Phrase pipeline: ingestion, deduplication, review and machine
//! translation of localizable UI strings, plus JSON/CSV/XLSX import and
//! export.
//!
//! Everything hangs off [`PhraseService`], which works over any
//! [`PhraseStore`] (in memory or PostgreSQL) and calls out to a
//! [`TranslationProvider`] for machine translation.

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod metrics;
pub mod phrase;
pub mod provider;
pub mod query;
pub mod retry;
pub mod review;
pub mod service;
pub mod store;
pub mod transfer;
pub mod translation;
pub mod variables;

pub use error::{PhraseError, Result};
pub use provider::TranslationProvider;
pub use service::PhraseService;
pub use store::PhraseStore;
