use std::str::FromStr;

use tracing::warn;

use crate::error::ParseNoteError;

/*
Note Tokens
===========

Notes arrive as text tokens from the instrument layer: a pitch letter, an
optional accidental, and an octave number.

    C4      middle C
    C#4     one semitone up
    Bb3     one semitone below B3 (same pitch as A#3)

The grammar is `[A-G] (#|b)? digits`. Parsing goes through the MIDI note
number so the equal-temperament math stays in one place:

    m = (octave + 1) * 12 + pitch_class
    f = 440 * 2^((m - 69) / 12)        A4 = MIDI 69 = 440 Hz

Accidentals offset the base pitch class by one semitone, so enharmonic
spellings (C#4 / Db4) resolve to the same note, and the odd-but-legal
spellings (Cb4 = B3, B#3 = C4) resolve deterministically too.

Malformed tokens must never interrupt playback: `frequency` falls back to
middle C (261.63 Hz) with a warning, while `Note::from_str` reports the
error for hosts that validate input up front.
*/

/// Frequency returned for malformed note tokens (middle C).
pub const FALLBACK_FREQUENCY: f32 = 261.63;

/// A parsed note, stored as its MIDI-equivalent number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    midi: i32,
}

impl Note {
    /// Frequency in Hz under equal temperament, A4 = 440 Hz.
    pub fn frequency(&self) -> f32 {
        440.0 * 2.0_f32.powf((self.midi as f32 - 69.0) / 12.0)
    }

    /// MIDI-equivalent note number.
    pub fn midi(&self) -> i32 {
        self.midi
    }
}

impl FromStr for Note {
    type Err = ParseNoteError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let err = || ParseNoteError {
            token: token.to_string(),
        };

        let mut chars = token.chars();
        let letter = chars.next().ok_or_else(err)?;
        let base = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(err()),
        };

        let rest = chars.as_str();
        let (accidental, digits) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let octave: i32 = digits.parse().map_err(|_| err())?;

        Ok(Note {
            midi: (octave + 1) * 12 + base + accidental,
        })
    }
}

/// Resolve a note token to a frequency, falling back to middle C on
/// malformed input. Playback must not abort on a bad token; the warning is
/// the only trace it leaves.
pub fn frequency(token: &str) -> f32 {
    match token.parse::<Note>() {
        Ok(note) => note.frequency(),
        Err(_) => {
            warn!(token, fallback = FALLBACK_FREQUENCY, "invalid note token");
            FALLBACK_FREQUENCY
        }
    }
}
