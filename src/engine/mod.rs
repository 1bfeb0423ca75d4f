use std::fmt;
use std::str::FromStr;

use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, ParseModeError};
use crate::graph::backend::{AudioBackend, NodeId};
use crate::graph::chorus::ChorusNetwork;
use crate::graph::reverb::ReverbNetwork;
use crate::notes;
use crate::samples::loader::SampleLoader;
use crate::samples::store::SampleStore;
use crate::synth::registry::{next_serial, Voice, VoiceEntry, VoiceRegistry};
use crate::synth::sampler::SampleVoice;
use crate::synth::voice::SynthVoice;

/*
Engine Facade
=============

The public surface of the instrument. One engine owns the backend handle,
the voice registry, the sample store and the send networks, and turns note
events into scheduled curves:

    play/stop/velocity ──→ mode ──→ registry allocate/evict
                                         │
                      bow voice ──→ chorus ──┐
                                             ├──→ master ──→ [reverb] ──→ sink
                      pluck voice ───────────┘

`init` is the only async operation: it awaits the sample loader, then
builds the effect networks exactly once. Until it completes, every playback
call is a warn-and-return no-op — UI events may race initialization and
must not fault.

Mode changes silence everything first. The two strategies share the
registry and the master stage, so a leaked voice from the previous mode
would be indistinguishable from a stuck note; panic-before-switch makes the
postcondition trivial: after `set_mode`, zero voices are live.
*/

/// Which strategy services new notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Sustained dual-oscillator synthesis.
    #[default]
    Bow,
    /// Pitch-shifted sample playback.
    Pluck,
}

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bow" => Ok(Mode::Bow),
            "pluck" => Ok(Mode::Pluck),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Bow => "bow",
            Mode::Pluck => "pluck",
        })
    }
}

/// Nodes built once at init: the master gain and the two send networks.
struct OutputStage {
    master: NodeId,
    chorus: ChorusNetwork,
    reverb: ReverbNetwork,
}

pub struct Engine<B: AudioBackend> {
    backend: B,
    config: EngineConfig,
    mode: Mode,
    registry: VoiceRegistry,
    store: SampleStore,
    output: Option<OutputStage>,
    reverb_enabled: bool,
}

impl<B: AudioBackend> Engine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        let registry = VoiceRegistry::new(config.max_polyphony);
        Self {
            backend,
            config,
            mode: Mode::default(),
            registry,
            store: SampleStore::new(),
            output: None,
            reverb_enabled: false,
        }
    }

    /// Load the configured samples and build the effect graphs. Idempotent:
    /// repeated calls after success return immediately.
    ///
    /// With a single configured sample slot, a load failure is fatal and
    /// propagated; with several, failures are isolated per slot and the
    /// engine comes up with whatever decoded.
    pub async fn init<L: SampleLoader>(&mut self, loader: &L) -> Result<(), EngineError> {
        if self.output.is_some() {
            debug!("engine already initialized");
            return Ok(());
        }

        let slots = self.config.samples.clone();
        let single = slots.len() == 1;
        for slot in &slots {
            match loader.load(&slot.url).await {
                Ok(buffer) => {
                    debug!(note = slot.note.as_str(), url = slot.url.as_str(), "sample decoded");
                    self.store.insert(slot.note.clone(), buffer);
                }
                Err(source) if single => {
                    error!(note = slot.note.as_str(), error = %source, "primary sample failed to load");
                    return Err(EngineError::SampleLoad {
                        note: slot.note.clone(),
                        source,
                    });
                }
                Err(source) => {
                    warn!(note = slot.note.as_str(), error = %source, "sample unavailable; slot skipped");
                }
            }
        }

        let master = self.backend.create_gain(self.config.master_gain);
        let chorus = ChorusNetwork::build(&mut self.backend);
        let reverb = ReverbNetwork::build(&mut self.backend, &self.config);
        self.backend.connect(chorus.output(), master);
        self.output = Some(OutputStage {
            master,
            chorus,
            reverb,
        });

        self.set_reverb_enabled(self.config.reverb_enabled);

        info!(samples = self.store.len(), mode = %self.mode, "engine initialized");
        Ok(())
    }

    /// Start a voice for `note`. The voice is registered under `voice_id`
    /// when given (e.g. a string id), otherwise under the note name;
    /// retriggering a live id replaces its voice.
    pub fn play_note(&mut self, note: &str, voice_id: Option<&str>, velocity: f32) {
        let Some(stage) = self.output.as_ref() else {
            warn!(note, "engine not initialized; ignoring play");
            return;
        };
        let chorus_in = stage.chorus.input();
        let master = stage.master;

        let velocity = velocity.clamp(0.0, 1.0);
        let key = voice_id.unwrap_or(note);

        if let Some(existing) = self.registry.take(key) {
            debug!(voice = key, "retrigger replaces live voice");
            Self::silence(&mut self.backend, &self.config, existing);
        }

        match self.mode {
            Mode::Bow => {
                if let Some(oldest) = self.registry.evict_for_bow() {
                    debug!(
                        evicted = oldest.note_id.as_str(),
                        "polyphony cap reached; evicting oldest voice"
                    );
                    Self::silence(&mut self.backend, &self.config, oldest);
                }

                let frequency = notes::frequency(note);
                let voice =
                    SynthVoice::spawn(&mut self.backend, &self.config, frequency, velocity, chorus_in);
                self.register(key, Voice::Bow(voice));
                debug!(note, voice = key, velocity, "bow voice started");
            }
            Mode::Pluck => {
                let frequency = notes::frequency(note);
                let (buffer, reference, rate) = {
                    let Some(sample) = self.store.nearest(frequency) else {
                        warn!(note, "no sample available; ignoring play");
                        return;
                    };
                    (
                        sample.buffer().clone(),
                        sample.note().to_string(),
                        f64::from(frequency) / f64::from(sample.frequency()),
                    )
                };

                let gain = velocity * self.config.sample_level;
                let voice =
                    SampleVoice::spawn(&mut self.backend, buffer, &reference, rate, gain, master);
                self.register(key, Voice::Pluck(voice));
                debug!(
                    note,
                    voice = key,
                    sample = reference.as_str(),
                    rate,
                    "pluck voice started"
                );
            }
        }
    }

    /// Begin graceful teardown of the voice under `voice_id` (or the note
    /// name). Bow voices enter their release; pluck voices ring out on
    /// their own. Unknown ids are a silent no-op.
    pub fn stop_note(&mut self, note: &str, voice_id: Option<&str>) {
        if self.output.is_none() {
            warn!(note, "engine not initialized; ignoring stop");
            return;
        }
        let key = voice_id.unwrap_or(note);

        let registry = self.registry.clone();
        let backend = &mut self.backend;
        let config = &self.config;
        let found = registry.with_voice_mut(key, |voice| match voice {
            Voice::Bow(bow) => {
                bow.release(backend, config);
            }
            Voice::Pluck(_) => {
                debug!(voice = key, "pluck voice rings out past stop");
            }
        });
        if found.is_none() {
            debug!(voice = key, "stop for unknown voice id");
        }
    }

    /// Retarget a sustaining bow voice's velocity. No-op for unknown ids,
    /// releasing voices and pluck voices.
    pub fn set_velocity(&mut self, voice_id: &str, velocity: f32) {
        if self.output.is_none() {
            warn!(voice = voice_id, "engine not initialized; ignoring velocity");
            return;
        }
        let velocity = velocity.clamp(0.0, 1.0);

        let registry = self.registry.clone();
        let backend = &mut self.backend;
        let config = &self.config;
        let found = registry.with_voice_mut(voice_id, |voice| match voice {
            Voice::Bow(bow) => bow.set_velocity(backend, config, velocity),
            Voice::Pluck(_) => {
                debug!(voice = voice_id, "velocity fixed at trigger for pluck voices");
            }
        });
        if found.is_none() {
            debug!(voice = voice_id, "velocity for unknown voice id");
        }
    }

    /// Switch voice strategy. Always silences every live voice first so no
    /// voice leaks across modes.
    pub fn set_mode(&mut self, mode: Mode) {
        self.panic();
        if self.mode != mode {
            info!(from = %self.mode, to = %mode, "mode changed");
        }
        self.mode = mode;
    }

    /// Route the master stage through the reverb network or straight to the
    /// sink. Touches routing only; live voices and their schedules are
    /// untouched.
    pub fn set_reverb_enabled(&mut self, enabled: bool) {
        let Some(stage) = self.output.as_ref() else {
            warn!("engine not initialized; ignoring reverb toggle");
            return;
        };
        let master = stage.master;
        let reverb_in = stage.reverb.input();
        let reverb_out = stage.reverb.output();
        let sink = self.backend.destination();

        // Routing is exclusive: either the master feeds the reverb and the
        // reverb feeds the sink, or the master feeds the sink alone.
        self.backend.disconnect(master);
        if enabled {
            self.backend.connect(master, reverb_in);
            self.backend.connect(reverb_out, sink);
        } else {
            self.backend.disconnect(reverb_out);
            self.backend.connect(master, sink);
        }
        self.reverb_enabled = enabled;
        debug!(enabled, "reverb routing updated");
    }

    /// Immediately cut every live voice of either kind.
    pub fn panic(&mut self) {
        let entries = self.registry.drain();
        let count = entries.len();
        for entry in entries {
            Self::silence(&mut self.backend, &self.config, entry);
        }
        info!(voices = count, "panic: all voices stopped");
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_initialized(&self) -> bool {
        self.output.is_some()
    }

    pub fn reverb_enabled(&self) -> bool {
        self.reverb_enabled
    }

    /// Number of live voices across both strategies.
    pub fn active_voices(&self) -> usize {
        self.registry.len()
    }

    /// Live voice ids in insertion order.
    pub fn active_voice_ids(&self) -> Vec<String> {
        self.registry.note_ids()
    }

    /// Reference notes with a decoded sample, in ascending frequency order.
    pub fn sample_notes(&self) -> Vec<&str> {
        self.store.notes()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend access, for hosts driving the clock or wiring the
    /// sink.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Insert a voice under `key` and arm its ended callback. The callback
    /// removes the entry only while the serial matches, so it can never
    /// delete a replacement voice.
    fn register(&mut self, key: &str, voice: Voice) {
        let serial = next_serial();
        let lifetime = match &voice {
            Voice::Bow(bow) => bow.lifetime_node(),
            Voice::Pluck(pluck) => pluck.lifetime_node(),
        };

        let registry = self.registry.clone();
        let id = key.to_string();
        self.backend.set_on_ended(
            lifetime,
            Box::new(move || {
                registry.remove_expired(&id, serial);
            }),
        );

        self.registry.insert(VoiceEntry {
            note_id: key.to_string(),
            serial,
            voice,
        });
    }

    /// Forced teardown of a displaced registry entry.
    fn silence(backend: &mut B, config: &EngineConfig, mut entry: VoiceEntry) {
        match &mut entry.voice {
            Voice::Bow(bow) => {
                bow.cut_off(backend, config);
            }
            Voice::Pluck(pluck) => pluck.stop_now(backend),
        }
    }
}
