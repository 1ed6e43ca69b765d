//! Windowed lookback aggregation
//!
//! For a response at raw index `B` and a window start `A`, collects every
//! stimulus logged strictly between the two (`A < i < B`): which words and
//! sounds were played, how often they were directed at the unit being
//! answered, which pictures were shown and for how long. First occurrences
//! are written to the word-attempt's [`FirstOccurrenceCache`].

use crate::audio::{classifier_for, AudioClassifier, UnclassifiedAudio};
use crate::classifier::{ClassifiedEvents, Indexed};
use crate::types::{SoundKey, TemplateKind};
use std::collections::HashMap;

/// The unit a response addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitRef<'a> {
    pub word: &'a str,
    pub position: Option<i64>,
}

/// Audio attributed to one window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioWindow {
    /// Whole-word playbacks, in order
    pub words: Vec<String>,
    /// Sub-unit sounds, in order
    pub sounds: Vec<String>,
    /// Soundbar sounds, in order
    pub soundbar: Vec<String>,
    /// All categories in one list (word-form only)
    pub combined: Vec<String>,
    /// Word playbacks of the unit being answered
    pub word_hits: u32,
    /// Sound playbacks directed at the unit being answered
    pub sound_hits: u32,
    pub soundbar_plays: u32,
}

/// Pictures attributed to one window
#[derive(Debug, Clone, PartialEq)]
pub struct PictureWindow {
    /// Labels of the pictures shown, in order
    pub labels: Vec<String>,
    /// Total display time of pictures of the unit being answered.
    /// 0 when none were shown, NaN when one of them was never hidden.
    pub duration_on_unit: f64,
}

impl Default for PictureWindow {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            duration_on_unit: 0.0,
        }
    }
}

/// Everything attributed to one lookback window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowAggregate {
    pub audio: AudioWindow,
    pub pictures: PictureWindow,
}

/// Earliest time each stimulus was observed within the current word attempt
#[derive(Debug, Clone, Default)]
pub struct FirstOccurrenceCache {
    words: HashMap<String, f64>,
    sounds: HashMap<SoundKey, f64>,
    pictures: HashMap<String, f64>,
}

impl FirstOccurrenceCache {
    pub fn observe_word(&mut self, label: &str, time: f64) {
        if !self.words.contains_key(label) {
            self.words.insert(label.to_string(), time);
        }
    }

    pub fn observe_sound(&mut self, key: &SoundKey, time: f64) {
        if !self.sounds.contains_key(key) {
            self.sounds.insert(key.clone(), time);
        }
    }

    pub fn observe_picture(&mut self, label: &str, time: f64) {
        if !self.pictures.contains_key(label) {
            self.pictures.insert(label.to_string(), time);
        }
    }

    /// `now` minus the first play of word `label`, NaN if never played
    pub fn elapsed_since_word(&self, label: &str, now: f64) -> f64 {
        elapsed(self.words.get(label), now)
    }

    pub fn elapsed_since_sound(&self, key: &SoundKey, now: f64) -> f64 {
        elapsed(self.sounds.get(key), now)
    }

    pub fn elapsed_since_picture(&self, label: &str, now: f64) -> f64 {
        elapsed(self.pictures.get(label), now)
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.sounds.is_empty() && self.pictures.is_empty()
    }
}

fn elapsed(first: Option<&f64>, now: f64) -> f64 {
    first.map(|t| now - t).unwrap_or(f64::NAN)
}

/// Display time of a picture, cut off at the response it precedes.
///
/// NaN when no hide was logged for it.
pub fn picture_duration(shown_at: f64, hidden_at: Option<f64>, response_at: f64) -> f64 {
    match hidden_at {
        Some(hidden) => hidden.min(response_at) - shown_at,
        None => f64::NAN,
    }
}

/// Computes window aggregates with the audio rules of one template
#[derive(Clone, Copy)]
pub struct LookbackAggregator {
    audio: &'static dyn AudioClassifier,
    pictures: bool,
}

impl LookbackAggregator {
    pub fn for_template(template: TemplateKind) -> Self {
        Self {
            audio: classifier_for(template),
            pictures: template.shows_pictures(),
        }
    }

    pub fn template(&self) -> TemplateKind {
        self.audio.template()
    }

    /// Aggregate stimuli logged strictly between raw index `after` and `response`
    pub fn aggregate(
        &self,
        events: &ClassifiedEvents<'_>,
        after: usize,
        response: &Indexed<'_>,
        unit: &UnitRef<'_>,
        cache: &mut FirstOccurrenceCache,
    ) -> Result<WindowAggregate, UnclassifiedAudio> {
        let mut aggregate = WindowAggregate::default();

        for audio in events.audio_between(after, response.raw_index) {
            self.audio.record(audio, unit, &mut aggregate.audio, cache)?;
        }

        if self.pictures {
            let response_at = response.time();
            for show in events.pictures_between(after, response.raw_index) {
                let label = show.event.target.clone().unwrap_or_default();
                let shown_at = show.time();
                if label == unit.word {
                    aggregate.pictures.duration_on_unit +=
                        picture_duration(shown_at, events.hide_after(show), response_at);
                }
                cache.observe_picture(&label, shown_at);
                aggregate.pictures.labels.push(label);
            }
        }

        Ok(aggregate)
    }
}

impl std::fmt::Debug for LookbackAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookbackAggregator")
            .field("template", &self.audio.template())
            .field("pictures", &self.pictures)
            .finish()
    }
}
