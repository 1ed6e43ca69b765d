//! Per-template audio classification
//!
//! Every template family logs audio playback with its own action tags and
//! its own idea of what counts as "the word", "a sound of the word" or "a
//! soundbar sound". Each family is one [`AudioClassifier`] implementation,
//! selected from the configured [`TemplateKind`]. The rules are intentionally
//! not unified: word-form keeps a combined list across categories and does
//! not count word plays, letter-spelling requires the sound position to
//! match, word-drag only tracks first word plays.

use crate::classifier::Indexed;
use crate::lookback::{AudioWindow, FirstOccurrenceCache, UnitRef};
use crate::types::{SoundKey, TemplateKind};

/// `action` of a whole-word playback in letter spelling
pub const ACTION_PLAY: &str = "play";
/// `action` of a whole-word playback in drag / form templates
pub const ACTION_PLAY_WORD: &str = "playWord";
/// `action` of a character sound in word forming
pub const ACTION_CHARACTER_SOUND: &str = "character_sound";
/// `action` of a soundbar sound
pub const ACTION_SOUNDBAR_SOUND: &str = "soundbarSound";

/// An audio event the configured template has no rule for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclassifiedAudio {
    pub tag: String,
}

impl UnclassifiedAudio {
    fn of(audio: &Indexed<'_>) -> Self {
        Self {
            tag: audio
                .event
                .action
                .clone()
                .unwrap_or_else(|| "<none>".to_string()),
        }
    }
}

/// Attributes audio events to a lookback window
pub trait AudioClassifier: Send + Sync {
    fn template(&self) -> TemplateKind;

    /// Record one audio event played in the window of a response addressing `unit`.
    ///
    /// First plays are recorded in `cache`; earlier entries are never overwritten.
    fn record(
        &self,
        audio: &Indexed<'_>,
        unit: &UnitRef<'_>,
        window: &mut AudioWindow,
        cache: &mut FirstOccurrenceCache,
    ) -> Result<(), UnclassifiedAudio>;
}

/// Audio rules for the configured template
pub fn classifier_for(template: TemplateKind) -> &'static dyn AudioClassifier {
    match template {
        TemplateKind::LetterSpelling => &LetterSpellingAudio,
        TemplateKind::WordDrag => &WordDragAudio,
        TemplateKind::WordForm => &WordFormAudio,
        TemplateKind::WordBingo => &WordBingoAudio,
    }
}

/// Word label of an audio file name: everything before the first `.`
pub fn strip_extension(file: &str) -> &str {
    file.split('.').next().unwrap_or(file)
}

fn word_label(audio: &Indexed<'_>) -> Result<String, UnclassifiedAudio> {
    audio
        .event
        .audio
        .as_deref()
        .map(|file| strip_extension(file).to_string())
        .ok_or_else(|| UnclassifiedAudio::of(audio))
}

fn sound_key(audio: &Indexed<'_>) -> Result<SoundKey, UnclassifiedAudio> {
    let target = audio
        .event
        .target
        .as_deref()
        .ok_or_else(|| UnclassifiedAudio::of(audio))?;
    Ok(SoundKey::new(audio.event.index, target))
}

fn record_word(
    label: String,
    audio: &Indexed<'_>,
    unit: &UnitRef<'_>,
    window: &mut AudioWindow,
    cache: &mut FirstOccurrenceCache,
) {
    if label == unit.word {
        window.word_hits += 1;
    }
    cache.observe_word(&label, audio.time());
    window.words.push(label);
}

/// Template 2: `play` is the word, every other action is a positioned sound
#[derive(Debug, Clone, Copy)]
pub struct LetterSpellingAudio;

impl AudioClassifier for LetterSpellingAudio {
    fn template(&self) -> TemplateKind {
        TemplateKind::LetterSpelling
    }

    fn record(
        &self,
        audio: &Indexed<'_>,
        unit: &UnitRef<'_>,
        window: &mut AudioWindow,
        cache: &mut FirstOccurrenceCache,
    ) -> Result<(), UnclassifiedAudio> {
        if audio.event.action_is(ACTION_PLAY) {
            record_word(word_label(audio)?, audio, unit, window, cache);
            return Ok(());
        }

        if audio.event.index.is_none() {
            return Err(UnclassifiedAudio::of(audio));
        }
        let key = sound_key(audio)?;
        if key.unit == unit.word && key.position == unit.position {
            window.sound_hits += 1;
        }
        cache.observe_sound(&key, audio.time());
        window.sounds.push(key.to_string());
        Ok(())
    }
}

/// Template 3: word plays and soundbar sounds; soundbar sounds are listed only
#[derive(Debug, Clone, Copy)]
pub struct WordDragAudio;

impl AudioClassifier for WordDragAudio {
    fn template(&self) -> TemplateKind {
        TemplateKind::WordDrag
    }

    fn record(
        &self,
        audio: &Indexed<'_>,
        unit: &UnitRef<'_>,
        window: &mut AudioWindow,
        cache: &mut FirstOccurrenceCache,
    ) -> Result<(), UnclassifiedAudio> {
        match audio.event.action.as_deref() {
            Some(ACTION_PLAY_WORD) => {
                record_word(word_label(audio)?, audio, unit, window, cache);
            }
            Some(ACTION_SOUNDBAR_SOUND) => {
                let label = audio
                    .event
                    .audio
                    .clone()
                    .ok_or_else(|| UnclassifiedAudio::of(audio))?;
                window.soundbar_plays += 1;
                window.soundbar.push(label);
            }
            _ => return Err(UnclassifiedAudio::of(audio)),
        }
        Ok(())
    }
}

/// Template 4: words, character sounds and soundbar sounds share one combined list;
/// only character sounds of the current word are counted
#[derive(Debug, Clone, Copy)]
pub struct WordFormAudio;

impl AudioClassifier for WordFormAudio {
    fn template(&self) -> TemplateKind {
        TemplateKind::WordForm
    }

    fn record(
        &self,
        audio: &Indexed<'_>,
        unit: &UnitRef<'_>,
        window: &mut AudioWindow,
        cache: &mut FirstOccurrenceCache,
    ) -> Result<(), UnclassifiedAudio> {
        match audio.event.action.as_deref() {
            Some(ACTION_PLAY_WORD) => {
                let label = word_label(audio)?;
                window.combined.push(label.clone());
                window.words.push(label);
            }
            Some(ACTION_CHARACTER_SOUND) => {
                let key = sound_key(audio)?;
                if key.unit == unit.word {
                    window.sound_hits += 1;
                }
                cache.observe_sound(&key, audio.time());
                let label = key.to_string();
                window.combined.push(label.clone());
                window.sounds.push(label);
            }
            Some(ACTION_SOUNDBAR_SOUND) => {
                let file = audio
                    .event
                    .audio
                    .as_deref()
                    .ok_or_else(|| UnclassifiedAudio::of(audio))?;
                let label = format!("('{}', 'soundbar')", file);
                window.soundbar_plays += 1;
                window.combined.push(label.clone());
                window.soundbar.push(label);
            }
            _ => return Err(UnclassifiedAudio::of(audio)),
        }
        Ok(())
    }
}

/// Template 5: every playback is a word, labelled by its target
#[derive(Debug, Clone, Copy)]
pub struct WordBingoAudio;

impl AudioClassifier for WordBingoAudio {
    fn template(&self) -> TemplateKind {
        TemplateKind::WordBingo
    }

    fn record(
        &self,
        audio: &Indexed<'_>,
        unit: &UnitRef<'_>,
        window: &mut AudioWindow,
        cache: &mut FirstOccurrenceCache,
    ) -> Result<(), UnclassifiedAudio> {
        let label = audio
            .event
            .target
            .clone()
            .ok_or_else(|| UnclassifiedAudio::of(audio))?;
        record_word(label, audio, unit, window, cache);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawEvent, EVENT_PLAY_AUDIO};

    fn play(action: &str) -> RawEvent {
        RawEvent::new(EVENT_PLAY_AUDIO).with_action(action)
    }

    fn run(
        classifier: &dyn AudioClassifier,
        events: &[RawEvent],
        unit: UnitRef<'_>,
    ) -> Result<(AudioWindow, FirstOccurrenceCache), UnclassifiedAudio> {
        let mut window = AudioWindow::default();
        let mut cache = FirstOccurrenceCache::default();
        for (raw_index, event) in events.iter().enumerate() {
            classifier.record(&Indexed { raw_index, event }, &unit, &mut window, &mut cache)?;
        }
        Ok((window, cache))
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("kat.mp3"), "kat");
        assert_eq!(strip_extension("kat"), "kat");
        assert_eq!(strip_extension("kat.v2.mp3"), "kat");
    }

    #[test]
    fn test_classifier_for_matches_template() {
        for kind in TemplateKind::ALL {
            assert_eq!(classifier_for(kind).template(), kind);
        }
    }

    #[test]
    fn test_letter_spelling_sound_requires_position() {
        let events = vec![
            play("play").with_audio("kat.mp3").at(10.0),
            play("sound").with_index(1).with_target("kat").at(20.0),
            play("sound").with_index(0).with_target("kat").at(30.0),
            play("sound").with_index(1).with_target("kat").at(40.0),
        ];
        let unit = UnitRef { word: "kat", position: Some(1) };
        let (window, cache) = run(&LetterSpellingAudio, &events, unit).unwrap();

        assert_eq!(window.words, vec!["kat"]);
        assert_eq!(window.sounds, vec!["(1, 'kat')", "(0, 'kat')", "(1, 'kat')"]);
        assert_eq!(window.word_hits, 1);
        assert_eq!(window.sound_hits, 2);
        assert_eq!(cache.elapsed_since_sound(&SoundKey::new(Some(1), "kat"), 50.0), 30.0);
        assert_eq!(cache.elapsed_since_word("kat", 50.0), 40.0);
    }

    #[test]
    fn test_letter_spelling_rejects_unpositioned_sound() {
        let events = vec![play("mystery").with_target("kat")];
        let unit = UnitRef { word: "kat", position: Some(0) };
        let err = run(&LetterSpellingAudio, &events, unit).unwrap_err();
        assert_eq!(err.tag, "mystery");
    }

    #[test]
    fn test_word_drag_lists_soundbar_without_counting() {
        let events = vec![
            play(ACTION_PLAY_WORD).with_audio("hond.mp3").at(5.0),
            play(ACTION_SOUNDBAR_SOUND).with_audio("h.mp3").at(6.0),
        ];
        let unit = UnitRef { word: "hond", position: None };
        let (window, cache) = run(&WordDragAudio, &events, unit).unwrap();

        assert_eq!(window.words, vec!["hond"]);
        assert_eq!(window.soundbar, vec!["h.mp3"]);
        assert_eq!(window.word_hits, 1);
        assert_eq!(window.sound_hits, 0);
        assert_eq!(window.soundbar_plays, 1);
        assert_eq!(cache.elapsed_since_word("hond", 8.0), 3.0);
    }

    #[test]
    fn test_word_drag_rejects_unknown_action() {
        let events = vec![play("play").with_audio("hond.mp3")];
        let unit = UnitRef { word: "hond", position: None };
        assert_eq!(run(&WordDragAudio, &events, unit).unwrap_err().tag, "play");
    }

    #[test]
    fn test_word_form_combined_list() {
        let events = vec![
            play(ACTION_PLAY_WORD).with_audio("vis.mp3").at(1.0),
            play(ACTION_CHARACTER_SOUND).with_index(2).with_target("vis").at(2.0),
            play(ACTION_CHARACTER_SOUND).with_index(0).with_target("vos").at(3.0),
            play(ACTION_SOUNDBAR_SOUND).with_audio("s").at(4.0),
        ];
        let unit = UnitRef { word: "vis", position: Some(0) };
        let (window, cache) = run(&WordFormAudio, &events, unit).unwrap();

        assert_eq!(
            window.combined,
            vec!["vis", "(2, 'vis')", "(0, 'vos')", "('s', 'soundbar')"]
        );
        // word plays are listed but never counted
        assert_eq!(window.word_hits, 0);
        assert_eq!(window.sound_hits, 1);
        assert_eq!(window.soundbar_plays, 1);
        assert!(cache.elapsed_since_word("vis", 5.0).is_nan());
        assert_eq!(cache.elapsed_since_sound(&SoundKey::new(Some(2), "vis"), 5.0), 3.0);
    }

    #[test]
    fn test_word_bingo_uses_target_label() {
        let events = vec![
            play("whatever").with_target("boom").at(1.0),
            play("whatever").with_target("roos").at(2.0),
            play("whatever").with_target("boom").at(3.0),
        ];
        let unit = UnitRef { word: "boom", position: None };
        let (window, cache) = run(&WordBingoAudio, &events, unit).unwrap();

        assert_eq!(window.words, vec!["boom", "roos", "boom"]);
        assert_eq!(window.word_hits, 2);
        assert_eq!(cache.elapsed_since_word("boom", 4.0), 3.0);
    }
}
