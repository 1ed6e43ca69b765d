//! Event classification
//!
//! Splits the raw event log of one exercise into typed sub-streams while
//! keeping every event's position in the original log, which the lookback
//! windows are defined on.

use crate::schema::{
    RawEvent, EVENT_CLOSE, EVENT_COMPLETED, EVENT_HIDE_IMAGE, EVENT_PLAY_AUDIO, EVENT_SHOW_IMAGE,
    EVENT_START,
};
use std::collections::HashMap;

/// An event together with its index in the raw log
#[derive(Debug, Clone, Copy)]
pub struct Indexed<'a> {
    pub raw_index: usize,
    pub event: &'a RawEvent,
}

impl<'a> Indexed<'a> {
    pub fn time(&self) -> f64 {
        self.event.time_or_nan()
    }
}

/// Sub-streams of one exercise log. All streams are in ascending raw-index order.
#[derive(Debug, Default)]
pub struct ClassifiedEvents<'a> {
    /// Graded attempts
    pub responses: Vec<Indexed<'a>>,
    /// Audio playbacks
    pub audio: Vec<Indexed<'a>>,
    /// Pictures shown
    pub picture_shows: Vec<Indexed<'a>>,
    /// Pictures hidden, keyed by pairing token
    pub picture_hides: HashMap<&'a str, Vec<Indexed<'a>>>,
    /// start / completed / close markers
    pub lifecycle: Vec<Indexed<'a>>,
}

impl<'a> ClassifiedEvents<'a> {
    /// Classify an ordered event log. Never fails; a log without attempts
    /// yields empty response stream.
    pub fn classify(events: &'a [RawEvent]) -> Self {
        let mut classified = ClassifiedEvents::default();

        for (raw_index, event) in events.iter().enumerate() {
            let indexed = Indexed { raw_index, event };

            if event.is_attempt() {
                classified.responses.push(indexed);
            }

            match event.event.as_str() {
                EVENT_PLAY_AUDIO => classified.audio.push(indexed),
                EVENT_SHOW_IMAGE => classified.picture_shows.push(indexed),
                EVENT_HIDE_IMAGE => {
                    // A hide without a token can never be paired
                    if let Some(token) = event.uuid.as_deref().filter(|t| !t.is_empty()) {
                        classified
                            .picture_hides
                            .entry(token)
                            .or_default()
                            .push(indexed);
                    }
                }
                EVENT_START | EVENT_COMPLETED | EVENT_CLOSE => classified.lifecycle.push(indexed),
                _ => {}
            }
        }

        classified
    }

    /// True when there is nothing to build response records from
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Time of the first start marker
    pub fn start_marker(&self) -> Option<f64> {
        self.lifecycle
            .iter()
            .find(|e| e.event.event == EVENT_START)
            .and_then(|e| e.event.time)
    }

    /// Audio events with `after < raw_index < before`
    pub fn audio_between(&self, after: usize, before: usize) -> &[Indexed<'a>] {
        window(&self.audio, after, before)
    }

    /// Picture shows with `after < raw_index < before`
    pub fn pictures_between(&self, after: usize, before: usize) -> &[Indexed<'a>] {
        window(&self.picture_shows, after, before)
    }

    /// Time of the nearest hide following a show with the same pairing token
    pub fn hide_after(&self, show: &Indexed<'a>) -> Option<f64> {
        let token = show.event.uuid.as_deref().filter(|t| !t.is_empty())?;
        self.picture_hides
            .get(token)?
            .iter()
            .find(|hide| hide.raw_index > show.raw_index)
            .and_then(|hide| hide.event.time)
    }
}

fn window<'s, 'a>(stream: &'s [Indexed<'a>], after: usize, before: usize) -> &'s [Indexed<'a>] {
    let start = stream.partition_point(|e| e.raw_index <= after);
    let end = stream.partition_point(|e| e.raw_index < before);
    if start >= end {
        &[]
    } else {
        &stream[start..end]
    }
}
