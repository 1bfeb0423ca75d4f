use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::synth::sampler::SampleVoice;
use crate::synth::voice::SynthVoice;

/*
Voice Registry
==============

Ordered mapping from note id to live voice. Two rules make polyphony
predictable:

  - one voice per id: triggering an id that is already live replaces the
    old voice, so a retriggered string never doubles up;
  - FIFO eviction: when the bow-voice cap is reached, the oldest *inserted*
    bow voice goes, regardless of pitch or loudness. Insertion order is the
    documented contract, which is why entries live in a Vec rather than a
    hash map.

Pluck voices are registered (they occupy their id) but never count against
the cap; each one decays on its own.

Entries are removed on three paths: synchronously, when a voice is replaced,
evicted or panicked; and asynchronously, when the backend reports a source's
end. The asynchronous path runs from an ended callback that may arrive long
after the id was reused, so every entry carries a serial from a process-wide
counter and the callback removes the entry only while the serial still
matches.

The registry is shared between the engine and those callbacks through a
cheap cloneable handle. The execution model is single-threaded and
cooperative, so the handle is `Rc<RefCell<…>>`; a threaded engine would put
a lock here instead.
*/

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Allocate a registry serial. Unique for the lifetime of the process.
pub fn next_serial() -> u64 {
    NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
}

/// A live voice of either strategy.
pub enum Voice {
    Bow(SynthVoice),
    Pluck(SampleVoice),
}

impl Voice {
    pub fn is_bow(&self) -> bool {
        matches!(self, Voice::Bow(_))
    }
}

pub struct VoiceEntry {
    pub note_id: String,
    pub serial: u64,
    pub voice: Voice,
}

struct Inner {
    // Insertion-ordered; index 0 is the eviction candidate.
    entries: Vec<VoiceEntry>,
    max_polyphony: usize,
}

/// Cloneable handle to the shared voice table.
#[derive(Clone)]
pub struct VoiceRegistry {
    inner: Rc<RefCell<Inner>>,
}

impl VoiceRegistry {
    pub fn new(max_polyphony: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                entries: Vec::new(),
                max_polyphony,
            })),
        }
    }

    /// Register a voice under its id. The caller must have displaced any
    /// previous holder of the id first (see [`VoiceRegistry::take`]).
    pub fn insert(&self, entry: VoiceEntry) {
        let mut inner = self.inner.borrow_mut();
        debug_assert!(
            !inner.entries.iter().any(|e| e.note_id == entry.note_id),
            "duplicate voice id {}",
            entry.note_id
        );
        inner.entries.push(entry);
    }

    /// Remove and return the voice occupying `note_id`, if any.
    pub fn take(&self, note_id: &str) -> Option<VoiceEntry> {
        let mut inner = self.inner.borrow_mut();
        let index = inner.entries.iter().position(|e| e.note_id == note_id)?;
        Some(inner.entries.remove(index))
    }

    /// If the bow count is at the cap, remove and return the oldest-inserted
    /// bow voice to make room for one more.
    pub fn evict_for_bow(&self) -> Option<VoiceEntry> {
        let mut inner = self.inner.borrow_mut();
        let bow_count = inner.entries.iter().filter(|e| e.voice.is_bow()).count();
        if bow_count < inner.max_polyphony {
            return None;
        }
        let index = inner.entries.iter().position(|e| e.voice.is_bow())?;
        Some(inner.entries.remove(index))
    }

    /// Remove the entry for `note_id` only if it still carries `serial`.
    /// Used by ended callbacks, which may outlive the voice they were
    /// registered for. Returns whether an entry was removed.
    pub fn remove_expired(&self, note_id: &str, serial: u64) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|e| !(e.note_id == note_id && e.serial == serial));
        inner.entries.len() != before
    }

    /// Remove and return every entry. Backs panic and mode switches.
    pub fn drain(&self) -> Vec<VoiceEntry> {
        std::mem::take(&mut self.inner.borrow_mut().entries)
    }

    /// Run `f` against the voice registered under `note_id`. Returns `None`
    /// if the id is not live.
    pub fn with_voice_mut<R>(&self, note_id: &str, f: impl FnOnce(&mut Voice) -> R) -> Option<R> {
        let mut inner = self.inner.borrow_mut();
        let entry = inner.entries.iter_mut().find(|e| e.note_id == note_id)?;
        Some(f(&mut entry.voice))
    }

    pub fn contains(&self, note_id: &str) -> bool {
        self.inner
            .borrow()
            .entries
            .iter()
            .any(|e| e.note_id == note_id)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    pub fn bow_count(&self) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|e| e.voice.is_bow())
            .count()
    }

    /// Live ids in insertion order.
    pub fn note_ids(&self) -> Vec<String> {
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|e| e.note_id.clone())
            .collect()
    }
}
