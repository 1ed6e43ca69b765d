//! Response record building
//!
//! Walks the graded attempts of one exercise in log order and emits one flat
//! [`ResponseRecord`] per attempt. State carried between attempts (previous
//! unit, window start, word-attempt counter, first-occurrence caches and the
//! "since last word" baseline) lives in an explicit fold accumulator; it is
//! reset whenever the addressed unit changes.

use crate::classifier::{ClassifiedEvents, Indexed};
use crate::error::ComputeError;
use crate::lookback::{FirstOccurrenceCache, LookbackAggregator, UnitRef, WindowAggregate};
use crate::schema::Exercise;
use crate::types::{SoundKey, TemplateKind, TriState};
use tracing::{debug, warn};

/// Placeholder for missing text values in output tables
pub const NA: &str = "NA";

/// Exercise-level fields repeated on every response row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExerciseMeta {
    pub user_id: String,
    pub exercise_id: String,
    pub application: String,
    /// Start timestamp as logged
    pub start_time: String,
    pub word_list: String,
}

impl ExerciseMeta {
    pub fn of(exercise: &Exercise) -> Self {
        let word_list = match exercise.word_list() {
            Some(list) => list.to_string(),
            None => {
                warn!(exercise_id = exercise.id(), "exercise path has no word list");
                NA.to_string()
            }
        };
        Self {
            user_id: exercise.user.clone(),
            exercise_id: exercise.id().to_string(),
            application: exercise.application.clone(),
            start_time: exercise.timestamp.clone(),
            word_list,
        }
    }
}

/// One graded attempt with its lookback aggregates
#[derive(Debug, Clone, Default)]
pub struct ResponseRecord {
    pub meta: ExerciseMeta,
    /// Index of the attempt in the raw log
    pub raw_index: usize,
    /// 0-based rank among the exercise's attempts
    pub ordinal: usize,
    pub word: String,
    pub position: Option<i64>,
    pub expected: String,
    pub given: String,
    pub correct: TriState,
    /// 1-based count of word attempts so far in the exercise
    pub word_attempt: u32,
    pub answer_time: f64,
    /// Time the start button was pressed, when logged
    pub start_marker: Option<f64>,
    pub since_last_answer: WindowAggregate,
    /// Aggregate of the window in which the current word attempt began
    pub since_last_word: WindowAggregate,
    pub time_from_first_word_audio: f64,
    pub time_from_first_sound_audio: f64,
    pub time_from_first_picture: f64,
}

/// Builds response records for one template
#[derive(Debug, Clone, Copy)]
pub struct ResponseRecordBuilder {
    aggregator: LookbackAggregator,
}

impl ResponseRecordBuilder {
    pub fn new(template: TemplateKind) -> Self {
        Self {
            aggregator: LookbackAggregator::for_template(template),
        }
    }

    pub fn template(&self) -> TemplateKind {
        self.aggregator.template()
    }

    /// Build the response records of one exercise.
    ///
    /// An exercise without attempts yields no records.
    pub fn build(&self, exercise: &Exercise) -> Result<Vec<ResponseRecord>, ComputeError> {
        let events = ClassifiedEvents::classify(&exercise.events);
        if events.is_empty() {
            debug!(exercise_id = exercise.id(), "no attempts in exercise");
            return Ok(Vec::new());
        }

        let context = BuildContext {
            aggregator: &self.aggregator,
            events: &events,
            meta: ExerciseMeta::of(exercise),
            start_marker: events.start_marker(),
        };

        let (_, records) = events.responses.iter().enumerate().try_fold(
            (AttemptState::default(), Vec::with_capacity(events.responses.len())),
            |(state, mut records), (ordinal, response)| {
                let (next, record) = state.advance(&context, ordinal, response)?;
                records.push(record);
                Ok::<_, ComputeError>((next, records))
            },
        )?;

        debug!(
            exercise_id = exercise.id(),
            records = records.len(),
            "built response records"
        );
        Ok(records)
    }
}

struct BuildContext<'c, 'a> {
    aggregator: &'c LookbackAggregator,
    events: &'c ClassifiedEvents<'a>,
    meta: ExerciseMeta,
    start_marker: Option<f64>,
}

/// Fold accumulator carried from one attempt to the next
#[derive(Debug, Clone, Default)]
struct AttemptState {
    /// Raw index of the previous attempt; 0 before the first one
    previous_raw_index: usize,
    previous_word: Option<String>,
    word_attempt: u32,
    cache: FirstOccurrenceCache,
    since_last_word: WindowAggregate,
}

impl AttemptState {
    fn advance(
        self,
        context: &BuildContext<'_, '_>,
        ordinal: usize,
        response: &Indexed<'_>,
    ) -> Result<(AttemptState, ResponseRecord), ComputeError> {
        let event = response.event;
        let word = event
            .parent
            .clone()
            .ok_or_else(|| ComputeError::MissingField {
                exercise_id: context.meta.exercise_id.clone(),
                field: "parent".to_string(),
            })?;

        let unit_changed = self.previous_word.as_deref() != Some(word.as_str());
        let (word_attempt, mut cache) = if unit_changed {
            (self.word_attempt + 1, FirstOccurrenceCache::default())
        } else {
            (self.word_attempt, self.cache)
        };

        let unit = UnitRef {
            word: &word,
            position: event.position,
        };
        let since_last_answer = context
            .aggregator
            .aggregate(
                context.events,
                self.previous_raw_index,
                response,
                &unit,
                &mut cache,
            )
            .map_err(|unclassified| ComputeError::UnclassifiableAction {
                exercise_id: context.meta.exercise_id.clone(),
                template: context.aggregator.template().to_string(),
                tag: unclassified.tag,
            })?;

        // Inherited, not recomputed, until the unit changes again
        let since_last_word = if unit_changed {
            since_last_answer.clone()
        } else {
            self.since_last_word
        };

        let answer_time = response.time();
        let sound_key = SoundKey::new(event.position, word.clone());
        let record = ResponseRecord {
            meta: context.meta.clone(),
            raw_index: response.raw_index,
            ordinal,
            position: event.position,
            expected: event.required.clone().unwrap_or_else(|| NA.to_string()),
            given: event.given_answer.clone().unwrap_or_else(|| NA.to_string()),
            correct: event.correct,
            word_attempt,
            answer_time,
            start_marker: context.start_marker,
            since_last_answer,
            since_last_word: since_last_word.clone(),
            time_from_first_word_audio: cache.elapsed_since_word(&word, answer_time),
            time_from_first_sound_audio: cache.elapsed_since_sound(&sound_key, answer_time),
            time_from_first_picture: cache.elapsed_since_picture(&word, answer_time),
            word: word.clone(),
        };

        let next = AttemptState {
            previous_raw_index: response.raw_index,
            previous_word: Some(word),
            word_attempt,
            cache,
            since_last_word,
        };
        Ok((next, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DocumentId, PathNode, RawEvent, EVENT_PLAY_AUDIO};
    use pretty_assertions::assert_eq;

    fn exercise_with(application: &str, events: Vec<RawEvent>) -> Exercise {
        Exercise {
            id: DocumentId::Plain("ex1".to_string()),
            user: "pp01".to_string(),
            application: application.to_string(),
            path: vec![
                PathNode::default(),
                PathNode::default(),
                PathNode {
                    title: Some("list-1".to_string()),
                },
            ],
            timestamp: "2024-01-15T14:00:00Z".to_string(),
            events,
            ..Default::default()
        }
    }

    fn letter(word: &str, position: i64, correct: bool, at: f64) -> RawEvent {
        RawEvent::attempt(word, "x", TriState::from(correct))
            .with_position(position)
            .at(at)
    }

    fn play_word(file: &str, at: f64) -> RawEvent {
        RawEvent::new(EVENT_PLAY_AUDIO)
            .with_action("play")
            .with_audio(file)
            .at(at)
    }

    #[test]
    fn test_no_attempts_no_records() {
        let exercise = exercise_with(
            "t2_sleep_de_letters",
            vec![RawEvent::new("start").at(1.0), play_word("kat.mp3", 2.0)],
        );
        let records = ResponseRecordBuilder::new(TemplateKind::LetterSpelling)
            .build(&exercise)
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_scenario_without_stimuli() {
        let exercise = exercise_with(
            "t2_sleep_de_letters",
            vec![
                letter("cat", 0, true, 1.0),
                letter("cat", 1, false, 2.0),
                letter("cat", 1, true, 3.5),
                letter("dog", 0, true, 5.0),
            ],
        );
        let records = ResponseRecordBuilder::new(TemplateKind::LetterSpelling)
            .build(&exercise)
            .unwrap();

        assert_eq!(records.len(), 4);
        let attempts: Vec<u32> = records.iter().map(|r| r.word_attempt).collect();
        assert_eq!(attempts, vec![1, 1, 1, 2]);
        let ordinals: Vec<usize> = records.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
        assert_eq!(records[0].meta.word_list, "list-1");
        assert!(records.iter().all(|r| r.time_from_first_word_audio.is_nan()));
        assert!(records.iter().all(|r| r.since_last_answer == WindowAggregate::default()));
    }

    #[test]
    fn test_since_last_word_is_inherited_within_word_attempt() {
        let exercise = exercise_with(
            "t2_sleep_de_letters",
            vec![
                RawEvent::new("start").at(0.0),
                play_word("kat.mp3", 1.0),
                letter("kat", 0, true, 2.0),
                play_word("kat.mp3", 3.0),
                letter("kat", 1, true, 4.0),
                letter("kat", 2, true, 5.0),
                play_word("vis.mp3", 6.0),
                play_word("vis.mp3", 7.0),
                letter("vis", 0, true, 8.0),
            ],
        );
        let records = ResponseRecordBuilder::new(TemplateKind::LetterSpelling)
            .build(&exercise)
            .unwrap();

        for record in &records[..3] {
            assert_eq!(record.since_last_word.audio.words, vec!["kat"]);
            assert_eq!(record.since_last_word.audio.word_hits, 1);
        }
        assert_eq!(records[1].since_last_answer.audio.words, vec!["kat"]);
        assert!(records[2].since_last_answer.audio.words.is_empty());
        assert_eq!(records[3].since_last_word.audio.words, vec!["vis", "vis"]);
        assert_eq!(records[3].since_last_word.audio.word_hits, 2);
    }

    #[test]
    fn test_first_occurrence_resets_on_word_change() {
        let exercise = exercise_with(
            "t2_sleep_de_letters",
            vec![
                RawEvent::new("start").at(0.0),
                play_word("kat.mp3", 1.0),
                letter("kat", 0, true, 2.0),
                play_word("kat.mp3", 3.0),
                letter("kat", 1, true, 4.0),
                letter("vis", 0, true, 5.0),
                letter("kat", 0, true, 6.0),
            ],
        );
        let records = ResponseRecordBuilder::new(TemplateKind::LetterSpelling)
            .build(&exercise)
            .unwrap();

        assert_eq!(records[0].time_from_first_word_audio, 1.0);
        // earliest play in the word attempt wins
        assert_eq!(records[1].time_from_first_word_audio, 3.0);
        assert!(records[2].time_from_first_word_audio.is_nan());
        // back to "kat": a new word attempt with a fresh cache
        assert!(records[3].time_from_first_word_audio.is_nan());
        assert_eq!(records[3].word_attempt, 3);
    }

    #[test]
    fn test_first_window_excludes_raw_index_zero() {
        let exercise = exercise_with(
            "t2_sleep_de_letters",
            vec![play_word("kat.mp3", 1.0), letter("kat", 0, true, 2.0)],
        );
        let records = ResponseRecordBuilder::new(TemplateKind::LetterSpelling)
            .build(&exercise)
            .unwrap();
        assert!(records[0].since_last_answer.audio.words.is_empty());
    }

    #[test]
    fn test_sound_delta_uses_position_and_word() {
        let exercise = exercise_with(
            "t2_sleep_de_letters",
            vec![
                RawEvent::new("start").at(0.0),
                RawEvent::new(EVENT_PLAY_AUDIO)
                    .with_action("sound")
                    .with_index(1)
                    .with_target("kat")
                    .at(10.0),
                letter("kat", 0, true, 20.0),
                letter("kat", 1, true, 30.0),
            ],
        );
        let records = ResponseRecordBuilder::new(TemplateKind::LetterSpelling)
            .build(&exercise)
            .unwrap();
        assert!(records[0].time_from_first_sound_audio.is_nan());
        assert_eq!(records[1].time_from_first_sound_audio, 20.0);
        assert_eq!(records[0].since_last_answer.audio.sound_hits, 0);
    }

    #[test]
    fn test_unclassifiable_action_is_fatal_with_exercise_id() {
        let exercise = exercise_with(
            "t3_drag_words",
            vec![
                RawEvent::new("start").at(0.0),
                RawEvent::new(EVENT_PLAY_AUDIO)
                    .with_action("mystery")
                    .with_audio("kat.mp3")
                    .at(1.0),
                RawEvent::attempt("kat", "kat", TriState::True).at(2.0),
            ],
        );
        let err = ResponseRecordBuilder::new(TemplateKind::WordDrag)
            .build(&exercise)
            .unwrap_err();
        match err {
            ComputeError::UnclassifiableAction {
                exercise_id,
                template,
                tag,
            } => {
                assert_eq!(exercise_id, "ex1");
                assert_eq!(template, "word-drag");
                assert_eq!(tag, "mystery");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_start_marker_and_expected_values() {
        let exercise = exercise_with(
            "t5_bingo",
            vec![
                RawEvent::new("start").at(500.0),
                RawEvent::attempt("boom", "roos", TriState::False)
                    .with_required("boom")
                    .at(900.0),
            ],
        );
        let records = ResponseRecordBuilder::new(TemplateKind::WordBingo)
            .build(&exercise)
            .unwrap();
        assert_eq!(records[0].start_marker, Some(500.0));
        assert_eq!(records[0].expected, "boom");
        assert_eq!(records[0].given, "roos");
        assert_eq!(records[0].position, None);
    }
}
