//! DigLin Features - feature extraction for language-learning exercise logs
//!
//! Turns per-exercise interaction event logs into analysis-ready tables
//! through a deterministic pipeline: event classification → windowed
//! lookback aggregation → response records → cross-response derivation →
//! typed table encoding.
//!
//! ## Tables
//!
//! - **Response tables**: one row per graded attempt, with the stimuli played
//!   or shown since the previous answer and since the start of the word
//! - **Exercise tables**: one row per exercise, with completion, mistakes and
//!   what the participant did after the first mistake

pub mod audio;
pub mod classifier;
pub mod config;
pub mod derive;
pub mod encoder;
pub mod error;
pub mod lookback;
pub mod pipeline;
pub mod records;
pub mod schema;
pub mod source;
pub mod summary;
pub mod table;
pub mod types;

pub use config::ExtractionConfig;
pub use derive::{derive_responses, DerivationScope, ResponseDerived};
pub use encoder::TableEncoder;
pub use error::ComputeError;
pub use pipeline::{BatchReport, Extractor, ParticipantFailure};
pub use records::{ResponseRecord, ResponseRecordBuilder};
pub use source::{ExerciseSource, InMemorySource};
pub use summary::{derive_exercises, ExerciseDerived, ExerciseSummaryRecord};
pub use table::{Cell, Column, ColumnKind, Table};
pub use types::{Granularity, TemplateKind, TriState};

// Schema exports
pub use schema::{Exercise, ExerciseAdapter, RawEvent};

/// Crate version, reported by the CLI
pub const DIGLIN_VERSION: &str = env!("CARGO_PKG_VERSION");
