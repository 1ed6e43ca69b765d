//! Cross-response derivation
//!
//! Second pass over an ordered table of response records. Everything here is
//! computed from already-materialised columns: lag-by-one comparisons with
//! the immediately preceding row, 1-based attempt ranks per unit, and the
//! time between consecutive answers. Row order is significant; the caller is
//! responsible for passing rows in chronological order.

use crate::records::ResponseRecord;
use crate::types::{Granularity, TriState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where sequence-sensitive derivations restart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivationScope {
    /// One sequence per participant table
    #[default]
    Participant,
    /// Restart at every exercise boundary
    Exercise,
}

impl std::str::FromStr for DerivationScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "participant" => Ok(DerivationScope::Participant),
            "exercise" => Ok(DerivationScope::Exercise),
            other => Err(format!(
                "unknown scope '{}', expected participant or exercise",
                other
            )),
        }
    }
}

/// Derived columns of one response row
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDerived {
    /// 1-based rank of the row within its unit group
    pub num_attempts: u32,
    pub prev_correct: TriState,
    pub prev_time: Option<f64>,
    pub prev_word: Option<String>,
    pub prev_given: Option<String>,
    pub prev_position: Option<i64>,
    /// Previous answer at the same unit was wrong
    pub retry: bool,
    /// Position advanced by exactly one within the same word
    pub direction: TriState,
    /// First attempt at the unit, and correct
    pub first_try: bool,
    /// Same answer as the previous row, for a different word
    pub same_given_in_diff_word: bool,
    pub answer_duration: f64,
}

type GroupKey<'r> = (&'r str, Option<i64>);

/// Derive columns for an ordered table of response records
pub fn derive_responses(
    records: &[ResponseRecord],
    granularity: Granularity,
    scope: DerivationScope,
) -> Vec<ResponseDerived> {
    match scope {
        DerivationScope::Participant => derive_sequence(records, granularity),
        DerivationScope::Exercise => exercise_runs(records)
            .flat_map(|run| derive_sequence(run, granularity))
            .collect(),
    }
}

/// Maximal runs of consecutive rows from the same exercise
fn exercise_runs(records: &[ResponseRecord]) -> impl Iterator<Item = &[ResponseRecord]> {
    records.chunk_by(|a, b| a.meta.exercise_id == b.meta.exercise_id)
}

fn derive_sequence(records: &[ResponseRecord], granularity: Granularity) -> Vec<ResponseDerived> {
    let mut attempts: HashMap<GroupKey<'_>, u32> = HashMap::new();

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let key = match granularity {
                Granularity::Letter => (record.word.as_str(), record.position),
                Granularity::Word => (record.word.as_str(), None),
            };
            let num_attempts = {
                let count = attempts.entry(key).or_insert(0);
                *count += 1;
                *count
            };
            let prev = i.checked_sub(1).map(|j| &records[j]);
            derive_row(record, prev, num_attempts, granularity)
        })
        .collect()
}

fn derive_row(
    record: &ResponseRecord,
    prev: Option<&ResponseRecord>,
    num_attempts: u32,
    granularity: Granularity,
) -> ResponseDerived {
    let same_word = prev.is_some_and(|p| p.word == record.word);
    let same_position = prev.is_some_and(|p| {
        matches!((p.position, record.position), (Some(a), Some(b)) if a == b)
    });

    let retry = prev.is_some_and(|p| p.correct.is_false())
        && same_word
        && (granularity == Granularity::Word || same_position);

    let direction = match granularity {
        Granularity::Word => TriState::NotApplicable,
        Granularity::Letter => {
            let advanced = matches!(
                (prev.and_then(|p| p.position), record.position),
                (Some(a), Some(b)) if b == a + 1
            );
            if advanced && same_word {
                TriState::True
            } else if retry || record.position.is_none() || record.position == Some(0) {
                TriState::NotApplicable
            } else {
                TriState::False
            }
        }
    };

    let answer_duration = match prev {
        Some(p) => record.answer_time - p.answer_time,
        None => record.answer_time - record.start_marker.unwrap_or(0.0),
    };

    ResponseDerived {
        num_attempts,
        prev_correct: prev.map(|p| p.correct).unwrap_or_default(),
        prev_time: prev.map(|p| p.answer_time),
        prev_word: prev.map(|p| p.word.clone()),
        prev_given: prev.map(|p| p.given.clone()),
        prev_position: prev.and_then(|p| p.position),
        retry,
        direction,
        first_try: num_attempts == 1 && record.correct.is_true(),
        same_given_in_diff_word: prev.is_some_and(|p| p.given == record.given) && !same_word,
        answer_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ExerciseMeta;
    use pretty_assertions::assert_eq;

    fn row(exercise: &str, word: &str, position: Option<i64>, given: &str, correct: bool, at: f64) -> ResponseRecord {
        ResponseRecord {
            meta: ExerciseMeta {
                exercise_id: exercise.to_string(),
                ..Default::default()
            },
            word: word.to_string(),
            position,
            given: given.to_string(),
            correct: TriState::from(correct),
            answer_time: at,
            ..Default::default()
        }
    }

    fn scenario() -> Vec<ResponseRecord> {
        vec![
            row("ex1", "cat", Some(0), "c", true, 1.0),
            row("ex1", "cat", Some(1), "o", false, 2.0),
            row("ex1", "cat", Some(1), "a", true, 3.5),
            row("ex1", "dog", Some(0), "d", true, 5.0),
        ]
    }

    #[test]
    fn test_scenario_letter_level() {
        let derived = derive_responses(&scenario(), Granularity::Letter, DerivationScope::Participant);

        let num_attempts: Vec<u32> = derived.iter().map(|d| d.num_attempts).collect();
        let retry: Vec<bool> = derived.iter().map(|d| d.retry).collect();
        let first_try: Vec<bool> = derived.iter().map(|d| d.first_try).collect();
        let durations: Vec<f64> = derived.iter().map(|d| d.answer_duration).collect();

        assert_eq!(num_attempts, vec![1, 1, 2, 1]);
        assert_eq!(retry, vec![false, false, true, false]);
        assert_eq!(first_try, vec![true, false, false, true]);
        assert_eq!(durations, vec![1.0, 1.0, 1.5, 1.5]);
    }

    #[test]
    fn test_lag_columns() {
        let derived = derive_responses(&scenario(), Granularity::Letter, DerivationScope::Participant);

        assert_eq!(derived[0].prev_correct, TriState::NotApplicable);
        assert_eq!(derived[0].prev_time, None);
        assert_eq!(derived[0].prev_word, None);
        assert_eq!(derived[2].prev_correct, TriState::False);
        assert_eq!(derived[2].prev_time, Some(2.0));
        assert_eq!(derived[3].prev_word.as_deref(), Some("cat"));
        assert_eq!(derived[3].prev_position, Some(1));
    }

    #[test]
    fn test_direction_flag() {
        let derived = derive_responses(&scenario(), Granularity::Letter, DerivationScope::Participant);
        let direction: Vec<TriState> = derived.iter().map(|d| d.direction).collect();
        assert_eq!(
            direction,
            vec![
                TriState::NotApplicable, // position 0
                TriState::True,          // 0 -> 1 in "cat"
                TriState::NotApplicable, // retry
                TriState::NotApplicable, // position 0
            ]
        );

        let skipping = vec![
            row("ex1", "vis", Some(0), "v", true, 1.0),
            row("ex1", "vis", Some(2), "s", true, 2.0),
        ];
        let derived = derive_responses(&skipping, Granularity::Letter, DerivationScope::Participant);
        assert_eq!(derived[1].direction, TriState::False);
    }

    #[test]
    fn test_num_attempts_increments_by_one_per_group() {
        let records = vec![
            row("ex1", "kat", Some(0), "k", false, 1.0),
            row("ex1", "kat", Some(0), "k", false, 2.0),
            row("ex1", "vis", Some(0), "v", true, 3.0),
            row("ex2", "kat", Some(0), "k", true, 1.0),
            row("ex2", "kat", Some(1), "a", true, 2.0),
        ];
        let derived = derive_responses(&records, Granularity::Letter, DerivationScope::Participant);
        let num_attempts: Vec<u32> = derived.iter().map(|d| d.num_attempts).collect();
        assert_eq!(num_attempts, vec![1, 2, 1, 3, 1]);
    }

    #[test]
    fn test_answer_duration_uses_start_marker() {
        let mut records = scenario();
        for record in &mut records {
            record.start_marker = Some(0.25);
        }
        let derived = derive_responses(&records, Granularity::Letter, DerivationScope::Participant);
        assert_eq!(derived[0].answer_duration, 0.75);
        for i in 1..records.len() {
            assert_eq!(
                derived[i].answer_duration,
                records[i].answer_time - records[i - 1].answer_time
            );
        }
    }

    #[test]
    fn test_same_given_in_diff_word() {
        let records = vec![
            row("ex1", "kat", Some(2), "t", true, 1.0),
            row("ex1", "tas", Some(0), "t", true, 2.0),
            row("ex1", "tas", Some(1), "t", false, 3.0),
        ];
        let derived = derive_responses(&records, Granularity::Letter, DerivationScope::Participant);
        let flags: Vec<bool> = derived.iter().map(|d| d.same_given_in_diff_word).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_word_level_retry_ignores_position() {
        let records = vec![
            row("ex1", "boom", None, "roos", false, 1.0),
            row("ex1", "boom", None, "boom", true, 2.0),
        ];
        let derived = derive_responses(&records, Granularity::Word, DerivationScope::Participant);
        assert!(derived[1].retry);
        assert_eq!(derived[1].num_attempts, 2);
        assert_eq!(derived[1].direction, TriState::NotApplicable);
    }

    #[test]
    fn test_exercise_scope_restarts_sequences() {
        let mut records = vec![
            row("ex1", "kat", Some(0), "k", false, 1.0),
            row("ex2", "kat", Some(0), "k", true, 4.0),
        ];
        records[1].start_marker = Some(3.0);

        let participant = derive_responses(&records, Granularity::Letter, DerivationScope::Participant);
        assert!(participant[1].retry);
        assert_eq!(participant[1].answer_duration, 3.0);

        let exercise = derive_responses(&records, Granularity::Letter, DerivationScope::Exercise);
        assert!(!exercise[1].retry);
        assert_eq!(exercise[1].num_attempts, 1);
        assert_eq!(exercise[1].prev_time, None);
        assert_eq!(exercise[1].answer_duration, 1.0);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("exercise".parse::<DerivationScope>().unwrap(), DerivationScope::Exercise);
        assert!("daily".parse::<DerivationScope>().is_err());
    }
}
