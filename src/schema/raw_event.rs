//! Exercise document schema
//!
//! One document per exercise session, as exported from the progress store:
//! metadata (user, application, word-list path, start timestamp) plus the
//! ordered, append-only event log. Event fields are loosely typed in the wild
//! (`time` and `position` arrive as numbers or numeric strings, `correct` as a
//! boolean or a string), so decoding here is deliberately lenient.

use crate::types::TriState;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `event` tag of an audio playback
pub const EVENT_PLAY_AUDIO: &str = "playAudio";
/// `event` tag of a picture being shown
pub const EVENT_SHOW_IMAGE: &str = "showImage";
/// `event` tag of a picture being hidden
pub const EVENT_HIDE_IMAGE: &str = "hideImage";
/// `event` tag of the start button
pub const EVENT_START: &str = "start";
/// `event` tag logged when the exercise is finished
pub const EVENT_COMPLETED: &str = "completed";
/// `event` tag logged when the exercise window closes
pub const EVENT_CLOSE: &str = "close";
/// `action` tag of a graded attempt
pub const ACTION_ATTEMPT: &str = "attempt";

/// A single entry of an exercise event log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Event kind (`playAudio`, `showImage`, `start`, ...)
    #[serde(default)]
    pub event: String,
    /// Action tag (`attempt`, `play`, `playWord`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Milliseconds since the exercise was opened
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Audio file name
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Target label (word, picture or sound)
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Position of a played sound inside its word
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    /// Position of the graded letter inside its word
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    /// Word the graded unit belongs to
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Expected answer
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    /// Answer given by the participant
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub given_answer: Option<String>,
    #[serde(default)]
    pub correct: TriState,
    /// Pairing token linking a picture show to its hide
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl RawEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }

    /// A graded attempt at `parent`
    pub fn attempt(parent: impl Into<String>, given: impl Into<String>, correct: TriState) -> Self {
        let mut event = Self::new("answer");
        event.action = Some(ACTION_ATTEMPT.to_string());
        event.parent = Some(parent.into());
        event.given_answer = Some(given.into());
        event.correct = correct;
        event
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn at(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_audio(mut self, audio: impl Into<String>) -> Self {
        self.audio = Some(audio.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_required(mut self, required: impl Into<String>) -> Self {
        self.required = Some(required.into());
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Event time, NaN when the log omitted it
    pub fn time_or_nan(&self) -> f64 {
        self.time.unwrap_or(f64::NAN)
    }

    pub fn action_is(&self, action: &str) -> bool {
        self.action.as_deref() == Some(action)
    }

    pub fn is_attempt(&self) -> bool {
        self.action_is(ACTION_ATTEMPT)
    }

    /// Whether this entry carries an answer (graded or not)
    pub fn has_answer(&self) -> bool {
        self.given_answer.is_some()
    }
}

/// Document identifier, either a plain string or an extended-JSON object id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    ObjectId {
        #[serde(rename = "$oid")]
        oid: String,
    },
    Plain(String),
}

impl DocumentId {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentId::ObjectId { oid } => oid,
            DocumentId::Plain(id) => id,
        }
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        DocumentId::Plain(String::new())
    }
}

/// One level of the menu path leading to the exercise
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Depth of the word-list node in an exercise path
pub const WORD_LIST_PATH_DEPTH: usize = 2;

/// An exercise session document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(rename = "_id", default)]
    pub id: DocumentId,
    /// Participant identifier
    #[serde(default)]
    pub user: String,
    /// Template/application id, e.g. `t2_sleep_de_letters`
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub path: Vec<PathNode>,
    /// Start timestamp as logged
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Exercise {
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Title of the word list this exercise was started from
    pub fn word_list(&self) -> Option<&str> {
        self.path
            .get(WORD_LIST_PATH_DEPTH)
            .and_then(|node| node.title.as_deref())
    }

    /// Parsed start timestamp.
    ///
    /// Accepts RFC 3339 and naive `YYYY-MM-DD HH:MM:SS[.f]` / `YYYY-MM-DDTHH:MM:SS[.f]`
    /// timestamps (taken as UTC).
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }

    /// Events other than the window-close marker
    pub fn active_events(&self) -> impl Iterator<Item = &RawEvent> {
        self.events.iter().filter(|e| e.event != EVENT_CLOSE)
    }

    /// Whether the log contains anything besides close markers
    pub fn has_activity(&self) -> bool {
        self.active_events().next().is_some()
    }

    /// Time the start button was pressed, if it was logged
    pub fn start_marker(&self) -> Option<f64> {
        self.events
            .iter()
            .find(|e| e.event == EVENT_START)
            .and_then(|e| e.time)
    }

    /// Validate the document schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id().is_empty() {
            return Err(ValidationError::MissingId);
        }
        if self.user.is_empty() {
            return Err(ValidationError::MissingUser {
                exercise_id: self.id().to_string(),
            });
        }
        if self.application.is_empty() {
            return Err(ValidationError::MissingApplication {
                exercise_id: self.id().to_string(),
            });
        }
        if self.word_list().is_none() {
            return Err(ValidationError::MissingWordList {
                exercise_id: self.id().to_string(),
            });
        }
        if let Some(index) = self
            .events
            .iter()
            .position(|e| e.is_attempt() && e.parent.is_none())
        {
            return Err(ValidationError::AttemptWithoutUnit {
                exercise_id: self.id().to_string(),
                index,
            });
        }
        Ok(())
    }
}

/// Validation errors for exercise documents
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Document has no _id")]
    MissingId,

    #[error("Exercise {exercise_id} has no user")]
    MissingUser { exercise_id: String },

    #[error("Exercise {exercise_id} has no application id")]
    MissingApplication { exercise_id: String },

    #[error("Exercise {exercise_id} has no word list in its path")]
    MissingWordList { exercise_id: String },

    #[error("Exercise {exercise_id}: attempt at event {index} has no parent unit")]
    AttemptWithoutUnit { exercise_id: String, index: usize },
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
