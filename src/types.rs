//! Shared value types
//!
//! Small vocabulary types that flow through every stage of the extraction
//! pipeline: the tri-state answer flag, the exercise template families and
//! the keys used to identify stimuli.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Tri-state boolean: true / false / not applicable.
///
/// Serialized as the literals `TRUE`, `FALSE` and `NA`. Deserialization is
/// lenient so the same type can read raw event logs, where `correct` is a
/// JSON boolean or the strings `"true"`/`"false"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriState {
    True,
    False,
    #[default]
    NotApplicable,
}

impl TriState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriState::True => "TRUE",
            TriState::False => "FALSE",
            TriState::NotApplicable => "NA",
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, TriState::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, TriState::False)
    }

    /// 1.0 / 0.0 / NaN
    pub fn as_f64(&self) -> f64 {
        match self {
            TriState::True => 1.0,
            TriState::False => 0.0,
            TriState::NotApplicable => f64::NAN,
        }
    }

    /// Parse the textual forms found in logs and exported tables.
    /// Anything unrecognised is not applicable.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "true" | "TRUE" | "True" => TriState::True,
            "false" | "FALSE" | "False" => TriState::False,
            _ => TriState::NotApplicable,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::True
        } else {
            TriState::False
        }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TriState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct TriStateVisitor;

impl<'de> Visitor<'de> for TriStateVisitor {
    type Value = TriState;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, a boolean-like string, or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<TriState, E> {
        Ok(TriState::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TriState, E> {
        Ok(TriState::parse_lenient(v))
    }

    fn visit_i64<E: de::Error>(self, _v: i64) -> Result<TriState, E> {
        Ok(TriState::NotApplicable)
    }

    fn visit_u64<E: de::Error>(self, _v: u64) -> Result<TriState, E> {
        Ok(TriState::NotApplicable)
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<TriState, E> {
        Ok(TriState::NotApplicable)
    }

    fn visit_unit<E: de::Error>(self) -> Result<TriState, E> {
        Ok(TriState::NotApplicable)
    }

    fn visit_none<E: de::Error>(self) -> Result<TriState, E> {
        Ok(TriState::NotApplicable)
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TriStateVisitor)
    }
}

/// Granularity of the graded unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Letters at a position inside a word
    Letter,
    /// Whole words / targets
    Word,
}

/// Exercise template families with their own stimulus semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    /// Spell a word letter by letter (template 2)
    LetterSpelling,
    /// Drag whole words onto targets (template 3)
    WordDrag,
    /// Form words from characters (template 4)
    WordForm,
    /// Word bingo (template 5)
    WordBingo,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 4] = [
        TemplateKind::LetterSpelling,
        TemplateKind::WordDrag,
        TemplateKind::WordForm,
        TemplateKind::WordBingo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::LetterSpelling => "letter-spelling",
            TemplateKind::WordDrag => "word-drag",
            TemplateKind::WordForm => "word-form",
            TemplateKind::WordBingo => "word-bingo",
        }
    }

    /// Prefix of the application ids logged by this template
    pub fn application_prefix(&self) -> &'static str {
        match self {
            TemplateKind::LetterSpelling => "t2_",
            TemplateKind::WordDrag => "t3_",
            TemplateKind::WordForm => "t4_",
            TemplateKind::WordBingo => "t5_",
        }
    }

    /// Resolve the template family of an application id such as `t2_sleep_de_letters`
    pub fn from_application(application: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| application.starts_with(kind.application_prefix()))
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            TemplateKind::LetterSpelling | TemplateKind::WordForm => Granularity::Letter,
            TemplateKind::WordDrag | TemplateKind::WordBingo => Granularity::Word,
        }
    }

    /// Name of the reading-direction column for letter-level templates
    pub fn direction_column(&self) -> Option<&'static str> {
        match self {
            TemplateKind::LetterSpelling => Some("right_to_left"),
            TemplateKind::WordForm => Some("left_to_right"),
            TemplateKind::WordDrag | TemplateKind::WordBingo => None,
        }
    }

    /// Whether picture show/hide events are part of this template
    pub fn shows_pictures(&self) -> bool {
        !matches!(self, TemplateKind::WordBingo)
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown template '{}', expected one of: letter-spelling, word-drag, word-form, word-bingo",
                    s
                )
            })
    }
}

/// What a participant did after the first mistake in an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstMistakeAction {
    /// The first mistake was the last answer given
    Quit,
    /// More answers followed the first mistake
    Continue,
    /// No mistake was made (or the template has no answers)
    NotApplicable,
}

impl FirstMistakeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirstMistakeAction::Quit => "quit",
            FirstMistakeAction::Continue => "continue",
            FirstMistakeAction::NotApplicable => "NA",
        }
    }
}

/// A sub-unit sound: the sound at `position` of word `unit`.
///
/// Rendered as `(position, 'unit')`, the label format used in exported
/// stimulus lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SoundKey {
    pub position: Option<i64>,
    pub unit: String,
}

impl SoundKey {
    pub fn new(position: Option<i64>, unit: impl Into<String>) -> Self {
        Self {
            position,
            unit: unit.into(),
        }
    }
}

impl fmt::Display for SoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "({}, '{}')", position, self.unit),
            None => write!(f, "(None, '{}')", self.unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tristate_serialization() {
        assert_eq!(serde_json::to_string(&TriState::True).unwrap(), "\"TRUE\"");
        assert_eq!(serde_json::to_string(&TriState::NotApplicable).unwrap(), "\"NA\"");
    }

    #[test]
    fn test_tristate_lenient_deserialization() {
        let parsed: Vec<TriState> =
            serde_json::from_str(r#"[true, "false", "TRUE", null, "NA", "maybe"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                TriState::True,
                TriState::False,
                TriState::True,
                TriState::NotApplicable,
                TriState::NotApplicable,
                TriState::NotApplicable,
            ]
        );
    }

    #[test]
    fn test_tristate_as_f64() {
        assert_eq!(TriState::True.as_f64(), 1.0);
        assert_eq!(TriState::False.as_f64(), 0.0);
        assert!(TriState::NotApplicable.as_f64().is_nan());
    }

    #[test]
    fn test_template_from_application() {
        assert_eq!(
            TemplateKind::from_application("t2_sleep_de_letters"),
            Some(TemplateKind::LetterSpelling)
        );
        assert_eq!(
            TemplateKind::from_application("t5_bingo"),
            Some(TemplateKind::WordBingo)
        );
        assert_eq!(TemplateKind::from_application("t1_de_woorden"), None);
    }

    #[test]
    fn test_template_from_str_roundtrip() {
        for kind in TemplateKind::ALL {
            assert_eq!(kind.as_str().parse::<TemplateKind>().unwrap(), kind);
        }
        assert!("t2".parse::<TemplateKind>().is_err());
    }

    #[test]
    fn test_template_serde_kebab_case() {
        let kind: TemplateKind = serde_json::from_str("\"word-form\"").unwrap();
        assert_eq!(kind, TemplateKind::WordForm);
    }

    #[test]
    fn test_sound_key_display() {
        assert_eq!(SoundKey::new(Some(2), "kat").to_string(), "(2, 'kat')");
        assert_eq!(SoundKey::new(None, "kat").to_string(), "(None, 'kat')");
    }
}
