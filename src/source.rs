//! Exercise sources
//!
//! The engine reads exercises one participant at a time. The participant is
//! always passed explicitly, so independent participants can be read from
//! parallel workers without shared state.

use crate::error::ComputeError;
use crate::schema::Exercise;
use std::collections::BTreeMap;

/// Supplies exercise documents per participant
pub trait ExerciseSource: Sync {
    /// Participant ids known to the source
    fn participants(&self) -> Result<Vec<String>, ComputeError>;

    /// Exercises of `participant` in ascending start order, restricted to
    /// applications containing `filter` when one is given
    fn exercises(
        &self,
        participant: &str,
        filter: Option<&str>,
    ) -> Result<Vec<Exercise>, ComputeError>;
}

/// Source over documents already loaded in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    by_participant: BTreeMap<String, Vec<Exercise>>,
}

impl InMemorySource {
    /// Group documents by user and order each group by start timestamp.
    ///
    /// Timestamps that do not parse sort before parsed ones, by their text.
    pub fn new(exercises: Vec<Exercise>) -> Self {
        let mut by_participant: BTreeMap<String, Vec<Exercise>> = BTreeMap::new();
        for exercise in exercises {
            by_participant
                .entry(exercise.user.clone())
                .or_default()
                .push(exercise);
        }
        for group in by_participant.values_mut() {
            group.sort_by_cached_key(|e| (e.started_at(), e.timestamp.clone()));
        }
        Self { by_participant }
    }

    pub fn len(&self) -> usize {
        self.by_participant.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_participant.is_empty()
    }
}

impl ExerciseSource for InMemorySource {
    fn participants(&self) -> Result<Vec<String>, ComputeError> {
        Ok(self.by_participant.keys().cloned().collect())
    }

    fn exercises(
        &self,
        participant: &str,
        filter: Option<&str>,
    ) -> Result<Vec<Exercise>, ComputeError> {
        let exercises = self
            .by_participant
            .get(participant)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(exercises
            .iter()
            .filter(|e| filter.map_or(true, |f| e.application.contains(f)))
            .cloned()
            .collect())
    }
}
