//! Readers for exercise exports
//!
//! Exports come either as a JSON array of exercise documents or as NDJSON
//! (one document per line, the shape `mongoexport` produces).

use crate::error::ComputeError;
use crate::schema::raw_event::{Exercise, ValidationError};

/// Adapter for reading exercise documents
pub struct ExerciseAdapter;

impl ExerciseAdapter {
    /// Parse a JSON string containing an array of exercise documents
    pub fn parse_array(json: &str) -> Result<Vec<Exercise>, ComputeError> {
        let exercises: Vec<Exercise> = serde_json::from_str(json)?;
        Ok(exercises)
    }

    /// Parse NDJSON (newline-delimited JSON) containing exercise documents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Exercise>, ComputeError> {
        let mut exercises = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Exercise>(trimmed) {
                Ok(exercise) => exercises.push(exercise),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(exercises)
    }

    /// Validate a batch of documents, returning only the failures
    pub fn validate_documents(exercises: &[Exercise]) -> Vec<ValidationResult> {
        exercises
            .iter()
            .enumerate()
            .filter_map(|(idx, exercise)| {
                exercise.validate().err().map(|error| ValidationResult {
                    index: idx,
                    exercise_id: Some(exercise.id().to_string()).filter(|id| !id.is_empty()),
                    error,
                })
            })
            .collect()
    }
}

/// A document that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub exercise_id: Option<String>,
    pub error: ValidationError,
}
