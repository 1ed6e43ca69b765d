//! Pipeline orchestration
//!
//! Runs the full extraction for participants read from an [`ExerciseSource`]:
//! response records (or exercise summaries) per exercise, the derivation
//! pass over each participant's ordered rows, then encoding into a table.
//! Participants are independent and may be processed on parallel workers;
//! per-participant tables are concatenated in participant order.

use crate::config::ExtractionConfig;
use crate::derive::derive_responses;
use crate::encoder::TableEncoder;
use crate::error::ComputeError;
use crate::records::{ResponseRecord, ResponseRecordBuilder};
use crate::schema::Exercise;
use crate::source::ExerciseSource;
use crate::summary::{derive_exercises, summarize_exercises};
use crate::table::{Column, Table};
use crate::types::TemplateKind;
use tracing::{debug, info, warn};

/// A participant whose table could not be built
#[derive(Debug)]
pub struct ParticipantFailure {
    pub participant: String,
    pub error: ComputeError,
}

/// Result of a batch run: the concatenated table of every participant that
/// succeeded, and the participants that did not
#[derive(Debug)]
pub struct BatchReport {
    pub table: Table,
    pub failures: Vec<ParticipantFailure>,
    /// Participants that contributed to the table
    pub succeeded: usize,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds response and exercise tables from exercise documents
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractionConfig,
    encoder: TableEncoder,
}

impl Extractor {
    pub fn new(config: ExtractionConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        let encoder = TableEncoder::new(config.list_separator.clone());
        Ok(Self { config, encoder })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Response table of one participant's exercises, given in start order
    pub fn participant_responses(
        &self,
        template: TemplateKind,
        exercises: &[Exercise],
    ) -> Result<Table, ComputeError> {
        let builder = ResponseRecordBuilder::new(template);
        let mut records: Vec<ResponseRecord> = Vec::new();
        for exercise in exercises {
            records.extend(builder.build(exercise)?);
        }
        let derived = derive_responses(&records, template.granularity(), self.config.scope);
        self.encoder.encode_responses(template, &records, &derived)
    }

    /// Exercise table of one participant's exercises, given in start order
    pub fn participant_exercises(&self, exercises: &[Exercise]) -> Result<Table, ComputeError> {
        let summaries = summarize_exercises(exercises);
        let derived = derive_exercises(&summaries);
        self.encoder.encode_exercises(&summaries, &derived)
    }

    /// Response tables of `participants`, concatenated in that order
    pub fn response_table(
        &self,
        source: &dyn ExerciseSource,
        participants: &[String],
    ) -> Result<BatchReport, ComputeError> {
        let template = self.config.require_template()?;
        let filter = self.config.response_filter(template);
        Ok(self.run_batch(
            TableEncoder::response_columns(template),
            participants,
            |participant| {
                let exercises = source.exercises(participant, Some(&filter))?;
                self.participant_responses(template, &exercises)
            },
        ))
    }

    /// Exercise tables of `participants`, concatenated in that order
    pub fn exercise_table(
        &self,
        source: &dyn ExerciseSource,
        participants: &[String],
    ) -> Result<BatchReport, ComputeError> {
        let filter = self.config.application_filter.as_deref();
        Ok(self.run_batch(
            TableEncoder::exercise_columns(),
            participants,
            |participant| {
                let exercises = source.exercises(participant, filter)?;
                self.participant_exercises(&exercises)
            },
        ))
    }

    fn run_batch<F>(&self, columns: Vec<Column>, participants: &[String], job: F) -> BatchReport
    where
        F: Fn(&str) -> Result<Table, ComputeError> + Sync,
    {
        let workers = self.config.workers.clamp(1, participants.len().max(1));
        let chunk_size = participants.len().div_ceil(workers).max(1);

        let run_chunk = |chunk: &[String]| -> Vec<(String, Result<Table, ComputeError>)> {
            chunk
                .iter()
                .map(|participant| {
                    debug!(participant = participant.as_str(), "processing participant");
                    (participant.clone(), job(participant))
                })
                .collect()
        };

        let results: Vec<(String, Result<Table, ComputeError>)> = if workers == 1 {
            run_chunk(participants)
        } else {
            std::thread::scope(|scope| {
                let handles: Vec<_> = participants
                    .chunks(chunk_size)
                    .map(|chunk| scope.spawn(move || run_chunk(chunk)))
                    .collect();
                handles
                    .into_iter()
                    .flat_map(|handle| match handle.join() {
                        Ok(results) => results,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
                    .collect()
            })
        };

        let mut report = BatchReport {
            table: Table::new(columns),
            failures: Vec::new(),
            succeeded: 0,
        };
        for (participant, result) in results {
            match result.and_then(|table| report.table.append(table)) {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    warn!(
                        participant = participant.as_str(),
                        exercise_id = error.exercise_id().unwrap_or("-"),
                        error = %error,
                        "participant failed"
                    );
                    report.failures.push(ParticipantFailure { participant, error });
                }
            }
        }

        info!(
            participants = participants.len(),
            succeeded = report.succeeded,
            failed = report.failures.len(),
            rows = report.table.len(),
            "batch complete"
        );
        report
    }
}
