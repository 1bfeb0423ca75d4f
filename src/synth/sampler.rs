use crate::graph::backend::{AudioBackend, NodeId};
use crate::samples::loader::SampleBuffer;

/*
Pluck Voice
===========

The sample-playback strategy: one buffer source pitched to the target note,
one gain stage, straight into the master output.

    buffer source ──→ gain (velocity × sample level) ──→ master

Playback rate is `target_hz / reference_hz`, so a recording of B2 played a
minor seventh up runs faster and sounds higher, like varispeed tape. There
is no envelope here: the recording carries its own attack and decay, and
the voice simply plays until the buffer runs out. A "stop" in pluck mode
lets the string ring; only retrigger, eviction paths and panic actually
stop the source, and stopping a source that already ran out is defined as
a no-op by the backend contract.

Velocity is baked into the gain at trigger time. There is no continuous
control over a plucked note once it is sounding.
*/

pub struct SampleVoice {
    source: NodeId,
    gain: NodeId,
    reference_note: String,
    playback_rate: f64,
    started_at: f64,
}

impl SampleVoice {
    /// Create a playback chain for `buffer` pitched by `playback_rate`,
    /// routed into `dest`, and start it immediately.
    pub fn spawn<B: AudioBackend>(
        backend: &mut B,
        buffer: SampleBuffer,
        reference_note: &str,
        playback_rate: f64,
        gain: f32,
        dest: NodeId,
    ) -> Self {
        let now = backend.now();
        let source = backend.create_buffer_source(buffer, playback_rate);
        let gain_node = backend.create_gain(gain);
        backend.connect(source, gain_node);
        backend.connect(gain_node, dest);
        backend.start(source, now);

        Self {
            source,
            gain: gain_node,
            reference_note: reference_note.to_string(),
            playback_rate,
            started_at: now,
        }
    }

    /// Stop playback now. Safe to call on a voice whose buffer already ran
    /// out.
    pub fn stop_now<B: AudioBackend>(&self, backend: &mut B) {
        let now = backend.now();
        backend.stop(self.source, now);
    }

    /// Node whose ended notification marks the voice as finished.
    pub fn lifetime_node(&self) -> NodeId {
        self.source
    }

    pub fn reference_note(&self) -> &str {
        &self.reference_note
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Backend time the voice was triggered at.
    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn gain_node(&self) -> NodeId {
        self.gain
    }
}
