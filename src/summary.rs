//! Exercise summaries
//!
//! One row per exercise with activity: duration, completion, mistakes and
//! what the participant did after the first one, followed by the
//! exercise-level derivation pass over a participant's ordered summaries.

use crate::records::ExerciseMeta;
use crate::schema::{Exercise, EVENT_COMPLETED};
use crate::types::{FirstMistakeAction, TriState};
use std::collections::HashMap;
use tracing::debug;

/// Application prefix of the word-recognition template, which has no
/// completion or answer semantics
pub const WORD_RECOGNITION_PREFIX: &str = "t1_";

/// Exercise-level pass-1 row
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSummaryRecord {
    pub meta: ExerciseMeta,
    pub completed: TriState,
    /// Seconds until the last non-close event, NaN if it has no time
    pub duration: f64,
    /// None when the template has no graded answers
    pub num_mistakes: Option<u32>,
    pub action_after_first_mistake: FirstMistakeAction,
}

impl ExerciseSummaryRecord {
    /// Summarize one exercise; None when its log holds only close markers
    pub fn from_exercise(exercise: &Exercise) -> Option<Self> {
        let last_active = exercise.active_events().last()?;
        let duration = last_active.time_or_nan() / 1000.0;

        let word_recognition = exercise.application.starts_with(WORD_RECOGNITION_PREFIX);
        let (completed, num_mistakes, action_after_first_mistake) = if word_recognition {
            (TriState::NotApplicable, None, FirstMistakeAction::NotApplicable)
        } else {
            let completed = exercise.events.iter().any(|e| e.event == EVENT_COMPLETED);
            let (mistakes, action) = first_mistake(exercise);
            (TriState::from(completed), Some(mistakes), action)
        };

        Some(Self {
            meta: ExerciseMeta::of(exercise),
            completed,
            duration,
            num_mistakes,
            action_after_first_mistake,
        })
    }
}

fn first_mistake(exercise: &Exercise) -> (u32, FirstMistakeAction) {
    let answers: Vec<TriState> = exercise
        .events
        .iter()
        .filter(|e| e.has_answer())
        .map(|e| e.correct)
        .collect();
    let mistakes = answers.iter().filter(|c| c.is_false()).count() as u32;
    let action = match answers.iter().position(|c| c.is_false()) {
        Some(i) if i + 1 == answers.len() => FirstMistakeAction::Quit,
        Some(_) => FirstMistakeAction::Continue,
        None => FirstMistakeAction::NotApplicable,
    };
    (mistakes, action)
}

/// Summarize a participant's exercises in order, skipping inactive ones
pub fn summarize_exercises(exercises: &[Exercise]) -> Vec<ExerciseSummaryRecord> {
    exercises
        .iter()
        .filter_map(|exercise| {
            let summary = ExerciseSummaryRecord::from_exercise(exercise);
            if summary.is_none() {
                debug!(exercise_id = exercise.id(), "skipping exercise without activity");
            }
            summary
        })
        .collect()
}

/// Six-way classification of the behaviour after the first mistake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MistakeBehaviour {
    Retry,
    FinishAndRetry,
    ContinueAndRetry,
    MoveOn,
    FinishAndMoveOn,
    ContinueAndMoveOn,
}

impl MistakeBehaviour {
    pub fn as_str(&self) -> &'static str {
        match self {
            MistakeBehaviour::Retry => "retry",
            MistakeBehaviour::FinishAndRetry => "finish & retry",
            MistakeBehaviour::ContinueAndRetry => "continue & retry",
            MistakeBehaviour::MoveOn => "move on",
            MistakeBehaviour::FinishAndMoveOn => "finish & move on",
            MistakeBehaviour::ContinueAndMoveOn => "continue & move on",
        }
    }

    /// Classify from the next row's grouping, the action and completion.
    /// None when any of the three does not decide a label.
    pub fn classify(
        same_as_next: Option<f64>,
        action: FirstMistakeAction,
        completed: f64,
    ) -> Option<Self> {
        let retried = match same_as_next {
            Some(v) if v == 1.0 => true,
            Some(v) if v == 0.0 => false,
            _ => return None,
        };
        let label = match (retried, action) {
            (true, FirstMistakeAction::Quit) => MistakeBehaviour::Retry,
            (false, FirstMistakeAction::Quit) => MistakeBehaviour::MoveOn,
            (true, FirstMistakeAction::Continue) if completed == 1.0 => {
                MistakeBehaviour::FinishAndRetry
            }
            (true, FirstMistakeAction::Continue) if completed == 0.0 => {
                MistakeBehaviour::ContinueAndRetry
            }
            (false, FirstMistakeAction::Continue) if completed == 1.0 => {
                MistakeBehaviour::FinishAndMoveOn
            }
            (false, FirstMistakeAction::Continue) if completed == 0.0 => {
                MistakeBehaviour::ContinueAndMoveOn
            }
            _ => return None,
        };
        Some(label)
    }
}

/// Exercise-level pass-2 columns
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseDerived {
    /// 1-based row number in the participant table
    pub exercise_number: usize,
    /// Earlier rows with the same (template, word list)
    pub times_previously_attempted: u32,
    pub completed_float: f64,
    pub correct: f64,
    pub times_previously_completed: f64,
    pub times_previously_correct: f64,
    pub time_previously_spent: f64,
    pub same_as_prev: f64,
    pub prec_consec_attempts: f64,
    /// None for the last row
    pub same_as_next: Option<f64>,
    pub behaviour_after_first_mistake: Option<MistakeBehaviour>,
}

/// Derive exercise-level columns for a participant's ordered summaries
pub fn derive_exercises(records: &[ExerciseSummaryRecord]) -> Vec<ExerciseDerived> {
    let keys: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.meta.application.as_str(), r.meta.word_list.as_str()))
        .collect();

    let completed: Vec<f64> = records.iter().map(|r| r.completed.as_f64()).collect();
    let correct: Vec<f64> = records
        .iter()
        .zip(&completed)
        .map(|(r, completed)| {
            let flawless = match r.num_mistakes {
                Some(0) => 1.0,
                Some(_) => 0.0,
                None => f64::NAN,
            };
            flawless * completed
        })
        .collect();
    let durations: Vec<f64> = records.iter().map(|r| r.duration).collect();

    let attempted = group_rank(&keys);
    let previously_completed = shifted_cumsum(&keys, &completed);
    let previously_correct = shifted_cumsum(&keys, &correct);
    let previously_spent: Vec<f64> = shifted_cumsum(&keys, &durations)
        .into_iter()
        .map(|v| if v.is_nan() { 0.0 } else { v })
        .collect();

    let same_as_prev: Vec<f64> = (0..keys.len())
        .map(|i| if i > 0 && keys[i] == keys[i - 1] { 1.0 } else { 0.0 })
        .collect();
    let streaks = consecutive_streaks(&same_as_prev);

    (0..records.len())
        .map(|i| {
            let same_as_next = same_as_prev.get(i + 1).copied();
            ExerciseDerived {
                exercise_number: i + 1,
                times_previously_attempted: attempted[i],
                completed_float: completed[i],
                correct: correct[i],
                times_previously_completed: previously_completed[i],
                times_previously_correct: previously_correct[i],
                time_previously_spent: previously_spent[i],
                same_as_prev: same_as_prev[i],
                prec_consec_attempts: streaks[i],
                same_as_next,
                behaviour_after_first_mistake: MistakeBehaviour::classify(
                    same_as_next,
                    records[i].action_after_first_mistake,
                    completed[i],
                ),
            }
        })
        .collect()
}

/// 0-based rank of each row within its group
fn group_rank<K: std::hash::Hash + Eq + Copy>(keys: &[K]) -> Vec<u32> {
    let mut seen: HashMap<K, u32> = HashMap::new();
    keys.iter()
        .map(|key| {
            let count = seen.entry(*key).or_insert(0);
            let rank = *count;
            *count += 1;
            rank
        })
        .collect()
}

/// Running sum over the strictly prior rows of each group.
///
/// NaN for the first row of a group and for rows whose prior group value is
/// NaN; NaN values are skipped by the sum itself.
pub fn shifted_cumsum<K: std::hash::Hash + Eq + Copy>(keys: &[K], values: &[f64]) -> Vec<f64> {
    #[derive(Clone, Copy)]
    struct Running {
        sum: f64,
        last: f64,
    }

    let mut groups: HashMap<K, Running> = HashMap::new();
    keys.iter()
        .zip(values)
        .map(|(key, &value)| {
            let out = match groups.get(key) {
                None => f64::NAN,
                Some(running) if running.last.is_nan() => f64::NAN,
                Some(running) => running.sum,
            };
            let running = groups.entry(*key).or_insert(Running {
                sum: 0.0,
                last: f64::NAN,
            });
            if !value.is_nan() {
                running.sum += value;
            }
            running.last = value;
            out
        })
        .collect()
}

/// `streak[i] = s[i] * (streak[i-1] + s[i])`, `streak[0] = s[0]`
pub fn consecutive_streaks(same_as_prev: &[f64]) -> Vec<f64> {
    let mut streaks = Vec::with_capacity(same_as_prev.len());
    for (i, &s) in same_as_prev.iter().enumerate() {
        let streak = match i {
            0 => s,
            _ => s * (streaks[i - 1] + s),
        };
        streaks.push(streak);
    }
    streaks
}
