//! Table encoding
//!
//! Maps response records and exercise summaries, together with their
//! derived columns, onto typed tables with a fixed column order per
//! template. Stimulus lists are joined into one cell with the configured
//! separator.

use crate::derive::ResponseDerived;
use crate::error::ComputeError;
use crate::records::{ResponseRecord, NA};
use crate::summary::{ExerciseDerived, ExerciseSummaryRecord};
use crate::table::ColumnKind::{Float, Integer, NullableFloat, Text, Tri};
use crate::table::{Cell, Column, ColumnKind, Table};
use crate::types::{Granularity, TemplateKind};

/// Default separator for stimulus lists inside a cell
pub const DEFAULT_LIST_SEPARATOR: &str = ";";

/// One response row being encoded
struct ResponseRow<'r> {
    record: &'r ResponseRecord,
    derived: &'r ResponseDerived,
    separator: &'r str,
}

impl ResponseRow<'_> {
    fn list(&self, values: &[String]) -> Cell {
        Cell::Text(values.join(self.separator))
    }
}

/// One exercise row being encoded
struct ExerciseRow<'r> {
    summary: &'r ExerciseSummaryRecord,
    derived: &'r ExerciseDerived,
}

struct ResponseField {
    column: Column,
    extract: fn(&ResponseRow<'_>) -> Cell,
}

struct ExerciseField {
    column: Column,
    extract: fn(&ExerciseRow<'_>) -> Cell,
}

fn field(
    name: &'static str,
    kind: ColumnKind,
    extract: fn(&ResponseRow<'_>) -> Cell,
) -> ResponseField {
    ResponseField {
        column: Column::new(name, kind),
        extract,
    }
}

fn exercise_field(
    name: &'static str,
    kind: ColumnKind,
    extract: fn(&ExerciseRow<'_>) -> Cell,
) -> ExerciseField {
    ExerciseField {
        column: Column::new(name, kind),
        extract,
    }
}

fn text_or_na(value: &Option<String>) -> Cell {
    Cell::text(value.as_deref().unwrap_or(NA))
}

fn optional_position(value: Option<i64>) -> Cell {
    Cell::NullableFloat(value.map(|p| p as f64))
}

fn identity_fields() -> Vec<ResponseField> {
    vec![
        field("user_id", Text, |r| Cell::text(&r.record.meta.user_id)),
        field("exercise_id", Text, |r| Cell::text(&r.record.meta.exercise_id)),
        field("start_time", Text, |r| Cell::text(&r.record.meta.start_time)),
        field("word_list", Text, |r| Cell::text(&r.record.meta.word_list)),
        field("word", Text, |r| Cell::text(&r.record.word)),
    ]
}

fn answer_fields(granularity: Granularity) -> Vec<ResponseField> {
    let mut fields = match granularity {
        Granularity::Letter => vec![
            field("correct_letter", Text, |r| Cell::text(&r.record.expected)),
            field("position", NullableFloat, |r| optional_position(r.record.position)),
            field("chosen_letter", Text, |r| Cell::text(&r.record.given)),
        ],
        Granularity::Word => vec![
            field("correct_word", Text, |r| Cell::text(&r.record.expected)),
            field("chosen_word", Text, |r| Cell::text(&r.record.given)),
        ],
    };
    fields.extend([
        field("correct", Tri, |r| Cell::Tri(r.record.correct)),
        field("word_attempt", Integer, |r| Cell::Integer(r.record.word_attempt as i64)),
        field("answer_time", Float, |r| Cell::Float(r.record.answer_time)),
    ]);
    fields
}

fn picture_fields() -> Vec<ResponseField> {
    vec![
        field("pictures_shown_between_answers", Text, |r| {
            r.list(&r.record.since_last_answer.pictures.labels)
        }),
        field("duration_picture_shown_between_answers", Float, |r| {
            Cell::Float(r.record.since_last_answer.pictures.duration_on_unit)
        }),
        field("pictures_shown_between_words", Text, |r| {
            r.list(&r.record.since_last_word.pictures.labels)
        }),
        field("duration_picture_shown_between_words", Float, |r| {
            Cell::Float(r.record.since_last_word.pictures.duration_on_unit)
        }),
        field("time_from_first_picture_in_word_attempt", Float, |r| {
            Cell::Float(r.record.time_from_first_picture)
        }),
    ]
}

fn word_audio_fields() -> Vec<ResponseField> {
    vec![
        field("words_played_between_answers", Text, |r| {
            r.list(&r.record.since_last_answer.audio.words)
        }),
        field("times_word_played_between_answers", Integer, |r| {
            Cell::Integer(r.record.since_last_answer.audio.word_hits as i64)
        }),
        field("words_played_between_words", Text, |r| {
            r.list(&r.record.since_last_word.audio.words)
        }),
        field("times_word_played_between_words", Integer, |r| {
            Cell::Integer(r.record.since_last_word.audio.word_hits as i64)
        }),
    ]
}

fn stimulus_fields(template: TemplateKind) -> Vec<ResponseField> {
    let first_word = field("time_from_first_word_audio_in_word_attempt", Float, |r| {
        Cell::Float(r.record.time_from_first_word_audio)
    });
    let first_sound = field("time_from_first_sound_audio_in_word_attempt", Float, |r| {
        Cell::Float(r.record.time_from_first_sound_audio)
    });

    let mut fields = match template {
        TemplateKind::LetterSpelling => {
            let mut fields = word_audio_fields();
            fields.extend([
                field("sounds_played_between_answers", Text, |r| {
                    r.list(&r.record.since_last_answer.audio.sounds)
                }),
                field("times_sound_played_between_answers", Integer, |r| {
                    Cell::Integer(r.record.since_last_answer.audio.sound_hits as i64)
                }),
                field("sounds_played_between_words", Text, |r| {
                    r.list(&r.record.since_last_word.audio.sounds)
                }),
                field("times_sound_played_between_words", Integer, |r| {
                    Cell::Integer(r.record.since_last_word.audio.sound_hits as i64)
                }),
                first_sound,
                first_word,
            ]);
            fields
        }
        TemplateKind::WordDrag => {
            let mut fields = word_audio_fields();
            fields.extend([
                field("soundbar_sounds_between_answers", Text, |r| {
                    r.list(&r.record.since_last_answer.audio.soundbar)
                }),
                field("soundbar_sounds_between_words", Text, |r| {
                    r.list(&r.record.since_last_word.audio.soundbar)
                }),
                first_word,
            ]);
            fields
        }
        TemplateKind::WordForm => vec![
            field("audio_played_between_answers", Text, |r| {
                r.list(&r.record.since_last_answer.audio.combined)
            }),
            field("times_sound_played_between_answers", Integer, |r| {
                Cell::Integer(r.record.since_last_answer.audio.sound_hits as i64)
            }),
            field("times_soundbar_played_between_answers", Integer, |r| {
                Cell::Integer(r.record.since_last_answer.audio.soundbar_plays as i64)
            }),
            field("audio_played_between_words", Text, |r| {
                r.list(&r.record.since_last_word.audio.combined)
            }),
            field("times_sound_played_between_words", Integer, |r| {
                Cell::Integer(r.record.since_last_word.audio.sound_hits as i64)
            }),
            field("times_soundbar_played_between_words", Integer, |r| {
                Cell::Integer(r.record.since_last_word.audio.soundbar_plays as i64)
            }),
            first_sound,
        ],
        TemplateKind::WordBingo => {
            let mut fields = word_audio_fields();
            fields.push(first_word);
            fields
        }
    };

    if template.shows_pictures() {
        fields.extend(picture_fields());
    }
    fields
}

fn derived_fields(template: TemplateKind) -> Vec<ResponseField> {
    let mut fields = vec![
        field("num_attempts", Integer, |r| {
            Cell::Integer(r.derived.num_attempts as i64)
        }),
        field("prev_correct", Tri, |r| Cell::Tri(r.derived.prev_correct)),
        field("prev_time", NullableFloat, |r| Cell::NullableFloat(r.derived.prev_time)),
        field("prev_word", Text, |r| text_or_na(&r.derived.prev_word)),
    ];

    match template.granularity() {
        Granularity::Letter => {
            fields.extend([
                field("prev_letter", Text, |r| text_or_na(&r.derived.prev_given)),
                field("prev_letter_position", NullableFloat, |r| {
                    optional_position(r.derived.prev_position)
                }),
                field("retry", Tri, |r| Cell::flag(r.derived.retry)),
            ]);
            if let Some(name) = template.direction_column() {
                fields.push(field(name, Tri, |r| Cell::Tri(r.derived.direction)));
            }
            fields.extend([
                field("first_try", Tri, |r| Cell::flag(r.derived.first_try)),
                field("same_letter_in_diff_word", Tri, |r| {
                    Cell::flag(r.derived.same_given_in_diff_word)
                }),
            ]);
        }
        Granularity::Word => fields.extend([
            field("retry", Tri, |r| Cell::flag(r.derived.retry)),
            field("first_try", Tri, |r| Cell::flag(r.derived.first_try)),
        ]),
    }

    fields.push(field("answer_duration", Float, |r| {
        Cell::Float(r.derived.answer_duration)
    }));
    fields
}

fn response_fields(template: TemplateKind) -> Vec<ResponseField> {
    let mut fields = identity_fields();
    fields.extend(answer_fields(template.granularity()));
    fields.extend(stimulus_fields(template));
    fields.extend(derived_fields(template));
    fields
}

fn exercise_fields() -> Vec<ExerciseField> {
    vec![
        exercise_field("user_id", Text, |r| Cell::text(&r.summary.meta.user_id)),
        exercise_field("exercise_id", Text, |r| Cell::text(&r.summary.meta.exercise_id)),
        exercise_field("template", Text, |r| Cell::text(&r.summary.meta.application)),
        exercise_field("start_time", Text, |r| Cell::text(&r.summary.meta.start_time)),
        exercise_field("word_list", Text, |r| Cell::text(&r.summary.meta.word_list)),
        exercise_field("completed", Tri, |r| Cell::Tri(r.summary.completed)),
        exercise_field("duration", Float, |r| Cell::Float(r.summary.duration)),
        exercise_field("num_mistakes", Float, |r| {
            Cell::Float(r.summary.num_mistakes.map(f64::from).unwrap_or(f64::NAN))
        }),
        exercise_field("action_after_first_mistake", Text, |r| {
            Cell::text(r.summary.action_after_first_mistake.as_str())
        }),
        exercise_field("exercise_number", Integer, |r| Cell::Integer(r.derived.exercise_number as i64)),
        exercise_field("times_previously_attempted", Integer, |r| {
            Cell::Integer(r.derived.times_previously_attempted as i64)
        }),
        exercise_field("completed_float", Float, |r| Cell::Float(r.derived.completed_float)),
        exercise_field("times_previously_completed", Float, |r| {
            Cell::Float(r.derived.times_previously_completed)
        }),
        exercise_field("correct", Float, |r| Cell::Float(r.derived.correct)),
        exercise_field("times_previously_correct", Float, |r| {
            Cell::Float(r.derived.times_previously_correct)
        }),
        exercise_field("time_previously_spent", Float, |r| Cell::Float(r.derived.time_previously_spent)),
        exercise_field("same_as_prev", Float, |r| Cell::Float(r.derived.same_as_prev)),
        exercise_field("prec_consec_attempts", Float, |r| Cell::Float(r.derived.prec_consec_attempts)),
        exercise_field("same_as_next", NullableFloat, |r| Cell::NullableFloat(r.derived.same_as_next)),
        exercise_field("behaviour_after_first_mistake", Text, |r| {
            Cell::text(
                r.derived
                    .behaviour_after_first_mistake
                    .map(|b| b.as_str())
                    .unwrap_or(NA),
            )
        }),
    ]
}

/// Encodes records into typed tables
#[derive(Debug, Clone)]
pub struct TableEncoder {
    list_separator: String,
}

impl Default for TableEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_SEPARATOR)
    }
}

impl TableEncoder {
    pub fn new(list_separator: impl Into<String>) -> Self {
        Self {
            list_separator: list_separator.into(),
        }
    }

    /// Column order of a response table
    pub fn response_columns(template: TemplateKind) -> Vec<Column> {
        response_fields(template).into_iter().map(|f| f.column).collect()
    }

    /// Column order of an exercise table
    pub fn exercise_columns() -> Vec<Column> {
        exercise_fields().into_iter().map(|f| f.column).collect()
    }

    /// Encode response records with their derived columns, row for row
    pub fn encode_responses(
        &self,
        template: TemplateKind,
        records: &[ResponseRecord],
        derived: &[ResponseDerived],
    ) -> Result<Table, ComputeError> {
        if records.len() != derived.len() {
            return Err(ComputeError::TableError(format!(
                "{} records but {} derived rows",
                records.len(),
                derived.len()
            )));
        }

        let fields = response_fields(template);
        let mut table = Table::new(fields.iter().map(|f| f.column).collect());
        for (record, derived) in records.iter().zip(derived) {
            let row = ResponseRow {
                record,
                derived,
                separator: &self.list_separator,
            };
            table.push_row(fields.iter().map(|f| (f.extract)(&row)).collect())?;
        }
        Ok(table)
    }

    /// Encode exercise summaries with their derived columns, row for row
    pub fn encode_exercises(
        &self,
        summaries: &[ExerciseSummaryRecord],
        derived: &[ExerciseDerived],
    ) -> Result<Table, ComputeError> {
        if summaries.len() != derived.len() {
            return Err(ComputeError::TableError(format!(
                "{} summaries but {} derived rows",
                summaries.len(),
                derived.len()
            )));
        }

        let fields = exercise_fields();
        let mut table = Table::new(fields.iter().map(|f| f.column).collect());
        for (summary, derived) in summaries.iter().zip(derived) {
            let row = ExerciseRow { summary, derived };
            table.push_row(fields.iter().map(|f| (f.extract)(&row)).collect())?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{derive_responses, DerivationScope};
    use crate::records::ExerciseMeta;
    use crate::summary::derive_exercises;
    use crate::types::{FirstMistakeAction, TriState};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn names(columns: &[Column]) -> Vec<&'static str> {
        columns.iter().map(|c| c.name).collect()
    }

    fn letter_record(position: i64, correct: bool, at: f64) -> ResponseRecord {
        let mut record = ResponseRecord {
            meta: ExerciseMeta {
                user_id: "pp01".to_string(),
                exercise_id: "ex1".to_string(),
                word_list: "l1".to_string(),
                ..Default::default()
            },
            word: "kat".to_string(),
            position: Some(position),
            expected: "k".to_string(),
            given: "k".to_string(),
            correct: TriState::from(correct),
            word_attempt: 1,
            answer_time: at,
            time_from_first_word_audio: f64::NAN,
            time_from_first_sound_audio: f64::NAN,
            time_from_first_picture: f64::NAN,
            ..Default::default()
        };
        record.since_last_answer.audio.words = vec!["kat".to_string(), "vis".to_string()];
        record
    }

    #[test]
    fn test_column_names_are_unique_per_template() {
        for template in TemplateKind::ALL {
            let columns = TableEncoder::response_columns(template);
            let unique: HashSet<&str> = columns.iter().map(|c| c.name).collect();
            assert_eq!(unique.len(), columns.len(), "{template}");
        }
        let columns = TableEncoder::exercise_columns();
        let unique: HashSet<&str> = columns.iter().map(|c| c.name).collect();
        assert_eq!(unique.len(), columns.len());
    }

    #[test]
    fn test_letter_spelling_column_order() {
        let columns = TableEncoder::response_columns(TemplateKind::LetterSpelling);
        let names = names(&columns);
        assert_eq!(
            &names[..12],
            &[
                "user_id",
                "exercise_id",
                "start_time",
                "word_list",
                "word",
                "correct_letter",
                "position",
                "chosen_letter",
                "correct",
                "word_attempt",
                "answer_time",
                "words_played_between_answers",
            ]
        );
        assert!(names.contains(&"right_to_left"));
        assert!(names.contains(&"duration_picture_shown_between_words"));
        assert_eq!(names.last(), Some(&"answer_duration"));
    }

    #[test]
    fn test_template_specific_columns() {
        let form = names(&TableEncoder::response_columns(TemplateKind::WordForm));
        assert!(form.contains(&"left_to_right"));
        assert!(form.contains(&"audio_played_between_answers"));
        assert!(!form.contains(&"words_played_between_answers"));

        let bingo = names(&TableEncoder::response_columns(TemplateKind::WordBingo));
        assert!(!bingo.contains(&"position"));
        assert!(!bingo.contains(&"pictures_shown_between_answers"));
        assert!(!bingo.contains(&"prev_letter"));
        assert!(bingo.contains(&"chosen_word"));

        let drag = names(&TableEncoder::response_columns(TemplateKind::WordDrag));
        assert!(drag.contains(&"soundbar_sounds_between_answers"));
        assert!(drag.contains(&"pictures_shown_between_answers"));
    }

    #[test]
    fn test_encode_responses_cells() {
        let records = vec![letter_record(0, false, 1.0), letter_record(0, true, 2.5)];
        let derived = derive_responses(&records, Granularity::Letter, DerivationScope::Participant);
        let table = TableEncoder::new("|")
            .encode_responses(TemplateKind::LetterSpelling, &records, &derived)
            .unwrap();

        assert_eq!(table.len(), 2);
        let words: Vec<Cell> = table
            .column("words_played_between_answers")
            .unwrap()
            .cloned()
            .collect();
        assert_eq!(words[0], Cell::text("kat|vis"));
        let prev_word: Vec<Cell> = table.column("prev_word").unwrap().cloned().collect();
        assert_eq!(prev_word, vec![Cell::text("NA"), Cell::text("kat")]);
        let retry: Vec<Cell> = table.column("retry").unwrap().cloned().collect();
        assert_eq!(retry, vec![Cell::flag(false), Cell::flag(true)]);
        let prev_time: Vec<Cell> = table.column("prev_time").unwrap().cloned().collect();
        assert_eq!(prev_time, vec![Cell::NullableFloat(None), Cell::NullableFloat(Some(1.0))]);
    }

    #[test]
    fn test_encoded_response_table_round_trips() {
        let records = vec![letter_record(0, false, 1.0), letter_record(1, true, 2.5)];
        let derived = derive_responses(&records, Granularity::Letter, DerivationScope::Participant);
        let table = TableEncoder::default()
            .encode_responses(TemplateKind::LetterSpelling, &records, &derived)
            .unwrap();

        let text = table.to_csv_string().unwrap();
        let back = Table::read_csv(
            TableEncoder::response_columns(TemplateKind::LetterSpelling),
            text.as_bytes(),
        )
        .unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let records = vec![letter_record(0, true, 1.0)];
        let err = TableEncoder::default()
            .encode_responses(TemplateKind::LetterSpelling, &records, &[])
            .unwrap_err();
        assert!(matches!(err, ComputeError::TableError(_)));
    }

    #[test]
    fn test_encode_exercises() {
        let summaries = vec![ExerciseSummaryRecord {
            meta: ExerciseMeta {
                user_id: "pp01".to_string(),
                exercise_id: "ex1".to_string(),
                application: "t2_sleep_de_letters".to_string(),
                word_list: "l1".to_string(),
                ..Default::default()
            },
            completed: TriState::True,
            duration: 12.5,
            num_mistakes: None,
            action_after_first_mistake: FirstMistakeAction::NotApplicable,
        }];
        let derived = derive_exercises(&summaries);
        let table = TableEncoder::default()
            .encode_exercises(&summaries, &derived)
            .unwrap();

        let text = table.to_csv_string().unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("user_id,exercise_id,template,start_time,word_list,completed"));
        assert!(header.ends_with("same_as_next,behaviour_after_first_mistake"));

        let row = &table.rows()[0];
        let num_mistakes = table.column_index("num_mistakes").unwrap();
        assert!(matches!(row[num_mistakes], Cell::Float(v) if v.is_nan()));
        let next = table.column_index("same_as_next").unwrap();
        assert_eq!(row[next], Cell::NullableFloat(None));
        let label = table.column_index("behaviour_after_first_mistake").unwrap();
        assert_eq!(row[label], Cell::text("NA"));

        let back = Table::read_csv(TableEncoder::exercise_columns(), text.as_bytes()).unwrap();
        assert_eq!(back, table);
    }
}
