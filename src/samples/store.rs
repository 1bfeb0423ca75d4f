use tracing::debug;

use crate::notes;
use crate::samples::loader::SampleBuffer;

/*
Nearest-Sample Lookup
=====================

Pluck mode plays a small set of recorded reference notes, pitch-shifted to
the requested note. Which recording to shift matters: stretching a sample
far from its recorded pitch sounds synthetic, so we pick the reference that
is musically closest, measured in octave distance:

    distance = |log2(target_hz / reference_hz)|

Linear Hz distance would be wrong here. 220 Hz is 110 Hz away from both
110 Hz and 330 Hz, but musically it is a full octave from the former and
less than a fifth from the latter.

When a target lands exactly between two references, the lower reference
frequency wins; shifting a recording up keeps its spectral envelope below
the target's, which tends to sound less strained than shifting down.
Entries are kept sorted by frequency so the tie-break is a property of the
scan order, not of insertion order.
*/

/// One recorded reference note.
#[derive(Debug, Clone)]
pub struct StoredSample {
    note: String,
    frequency: f32,
    buffer: SampleBuffer,
}

impl StoredSample {
    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }
}

/// Read-only-after-load mapping from reference notes to decoded buffers.
#[derive(Debug, Default)]
pub struct SampleStore {
    // Sorted by ascending frequency.
    samples: Vec<StoredSample>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoded buffer under its reference note. Re-inserting a
    /// note replaces the previous buffer.
    pub fn insert(&mut self, note: String, buffer: SampleBuffer) {
        let frequency = notes::frequency(&note);
        self.samples.retain(|sample| sample.note != note);

        let at = self
            .samples
            .iter()
            .position(|sample| sample.frequency > frequency)
            .unwrap_or(self.samples.len());
        self.samples.insert(
            at,
            StoredSample {
                note,
                frequency,
                buffer,
            },
        );
    }

    /// The reference sample closest to `target_hz` in octave distance.
    /// Ties resolve to the lower reference frequency.
    pub fn nearest(&self, target_hz: f32) -> Option<&StoredSample> {
        let mut best: Option<(&StoredSample, f32)> = None;
        for sample in &self.samples {
            let distance = (target_hz / sample.frequency).log2().abs();
            if best.map_or(true, |(_, closest)| distance < closest) {
                best = Some((sample, distance));
            }
        }
        if let Some((sample, distance)) = best {
            debug!(
                note = sample.note.as_str(),
                octaves = distance,
                "nearest sample selected"
            );
        }
        best.map(|(sample, _)| sample)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Reference notes in ascending frequency order.
    pub fn notes(&self) -> Vec<&str> {
        self.samples.iter().map(|sample| sample.note()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> SampleBuffer {
        SampleBuffer::new(vec![0.0; 512], 44_100)
    }

    fn store_with(notes: &[&str]) -> SampleStore {
        let mut store = SampleStore::new();
        for note in notes {
            store.insert(note.to_string(), buffer());
        }
        store
    }

    #[test]
    fn empty_store_has_no_nearest() {
        assert!(SampleStore::new().nearest(440.0).is_none());
    }

    #[test]
    fn picks_closest_in_octave_distance() {
        let store = store_with(&["B2", "B4"]);

        let a3 = store.nearest(notes::frequency("A3")).unwrap();
        assert_eq!(a3.note(), "B2");

        let a5 = store.nearest(notes::frequency("A5")).unwrap();
        assert_eq!(a5.note(), "B4");
    }

    #[test]
    fn exact_match_wins() {
        let store = store_with(&["B2", "B4"]);
        let b4 = store.nearest(notes::frequency("B4")).unwrap();
        assert_eq!(b4.note(), "B4");
    }

    #[test]
    fn ties_resolve_to_lower_reference() {
        // C4 sits exactly one octave from both C3 and C5.
        let store = store_with(&["C5", "C3"]);
        let pick = store.nearest(notes::frequency("C4")).unwrap();
        assert_eq!(pick.note(), "C3");
    }

    #[test]
    fn reinserting_a_note_replaces_it() {
        let mut store = store_with(&["C4"]);
        store.insert("C4".to_string(), SampleBuffer::new(vec![0.0; 7], 8_000));

        assert_eq!(store.len(), 1);
        assert_eq!(store.nearest(261.63).unwrap().buffer().len(), 7);
    }

    #[test]
    fn notes_are_ordered_by_frequency() {
        let store = store_with(&["B4", "C3", "E3"]);
        assert_eq!(store.notes(), vec!["C3", "E3", "B4"]);
    }
}
