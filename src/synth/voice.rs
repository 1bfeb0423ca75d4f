use tracing::debug;

use crate::config::EngineConfig;
use crate::graph::backend::{AudioBackend, FilterShape, NodeId, Param, Waveform};
use crate::MIN_TIME;

/*
Bow Voice
=========

One sustained synthesis voice, the "bowed string" strategy. Two detuned
oscillators give the body of the tone:

    osc1 (square)   ──→ lowpass ──→ gain1 ──┐
                                            ├──→ out ──→ chorus send
    osc2 (sawtooth) ──→ lowpass ──→ gain2 ──┘
         at f × harmonicity

A slow sine LFO feeds both oscillator frequency parameters through a depth
gain of `f × vibrato_amount × 0.01`, so vibrato width stays proportional to
the note across the range.

Two envelopes share their trigger points but drive different parameters:

  - amplitude: each gain ramps 0 → 10^(level_db/20) × velocity over the amp
    attack; sustain is the held ramp target (no decay segment is scheduled);
    release ramps back to zero.
  - filter: cutoff ramps base → peak over its own attack, and back to base
    over its own release.

Everything is expressed as future-timestamped curves; the voice itself holds
only node handles and enough state to answer lifecycle questions. Any
reschedule of a curve that may still be in flight first re-anchors the
parameter at its current value, so retargeting never steps audibly.

Teardown stops the oscillators at `now + max(amp_release, filter_release)`.
The forced variant (`cut_off`) substitutes a near-instant release for both
envelopes: eviction has to reclaim the voice now, and a 10 ms fade is the
cheapest way to do that without a click.
*/

/// Where a voice is in its life. `Terminated` is not represented here: once
/// the backend reports the oscillators stopped, the voice's registry entry
/// is removed and the struct is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStage {
    Attacking,
    Sustaining,
    Releasing,
}

/// Reference level in dB to a linear gain multiplier.
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

pub struct SynthVoice {
    osc1: NodeId,
    osc2: NodeId,
    vibrato: NodeId,
    filter1: NodeId,
    filter2: NodeId,
    gain1: NodeId,
    gain2: NodeId,
    frequency: f32,
    velocity: f32,
    target_velocity: f32,
    started_at: f64,
    attack_ends_at: f64,
    released_at: Option<f64>,
}

impl SynthVoice {
    /// Build the voice graph, route it into `send`, start the oscillators
    /// and schedule both attack ramps.
    pub fn spawn<B: AudioBackend>(
        backend: &mut B,
        config: &EngineConfig,
        frequency: f32,
        velocity: f32,
        send: NodeId,
    ) -> Self {
        let now = backend.now();

        let osc1 = backend.create_oscillator(Waveform::Square, frequency);
        let osc2 = backend.create_oscillator(Waveform::Sawtooth, frequency * config.harmonicity);

        let vibrato = backend.create_oscillator(Waveform::Sine, config.vibrato_rate);
        let vibrato_depth = backend.create_gain(frequency * config.vibrato_amount * 0.01);
        backend.connect(vibrato, vibrato_depth);
        backend.connect_param(vibrato_depth, osc1, Param::Frequency);
        backend.connect_param(vibrato_depth, osc2, Param::Frequency);

        let filter1 = backend.create_filter(FilterShape::Lowpass, config.cutoff_base, 0.0);
        let filter2 = backend.create_filter(FilterShape::Lowpass, config.cutoff_base, 0.0);
        let gain1 = backend.create_gain(0.0);
        let gain2 = backend.create_gain(0.0);
        let out = backend.create_gain(1.0);

        backend.connect(osc1, filter1);
        backend.connect(filter1, gain1);
        backend.connect(osc2, filter2);
        backend.connect(filter2, gain2);
        backend.connect(gain1, out);
        backend.connect(gain2, out);
        backend.connect(out, send);

        backend.start(osc1, now);
        backend.start(osc2, now);
        backend.start(vibrato, now);

        let attack = f64::from(config.amp_env.attack).max(MIN_TIME);
        let filter_attack = f64::from(config.filter_env.attack).max(MIN_TIME);

        for (gain, level_db) in [(gain1, config.osc1_level_db), (gain2, config.osc2_level_db)] {
            backend.set_value_at(gain, Param::Gain, 0.0, now);
            backend.ramp_to_value_at(
                gain,
                Param::Gain,
                db_to_gain(level_db) * velocity,
                now + attack,
            );
        }
        for filter in [filter1, filter2] {
            backend.set_value_at(filter, Param::Cutoff, config.cutoff_base, now);
            backend.ramp_to_value_at(filter, Param::Cutoff, config.cutoff_peak, now + filter_attack);
        }

        Self {
            osc1,
            osc2,
            vibrato,
            filter1,
            filter2,
            gain1,
            gain2,
            frequency,
            velocity,
            target_velocity: velocity,
            started_at: now,
            attack_ends_at: now + attack,
            released_at: None,
        }
    }

    pub fn stage(&self, now: f64) -> VoiceStage {
        if self.released_at.is_some() {
            VoiceStage::Releasing
        } else if now < self.attack_ends_at {
            VoiceStage::Attacking
        } else {
            VoiceStage::Sustaining
        }
    }

    /// Retarget amplitude and filter cutoff toward a new velocity, smoothly
    /// from wherever the curves are right now. Ignored once the voice is
    /// releasing.
    pub fn set_velocity<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        config: &EngineConfig,
        velocity: f32,
    ) {
        if self.released_at.is_some() {
            debug!(velocity, "velocity change ignored for releasing voice");
            return;
        }

        let tau = f64::from(config.velocity_smoothing);
        self.target_velocity = velocity;

        for (gain, level_db) in [
            (self.gain1, config.osc1_level_db),
            (self.gain2, config.osc2_level_db),
        ] {
            retarget(backend, gain, Param::Gain, db_to_gain(level_db) * velocity, tau);
        }

        let cutoff = (config.cutoff_base + config.cutoff_peak * velocity * 0.5).max(20.0);
        for filter in [self.filter1, self.filter2] {
            retarget(backend, filter, Param::Cutoff, cutoff, tau);
        }
    }

    /// Graceful teardown using the configured release times. Returns the
    /// time the oscillators stop.
    pub fn release<B: AudioBackend>(&mut self, backend: &mut B, config: &EngineConfig) -> f64 {
        self.fade_out(
            backend,
            config,
            f64::from(config.amp_env.release),
            f64::from(config.filter_env.release),
        )
    }

    /// Forced teardown for eviction, retrigger cuts and panic: a minimal
    /// release on both envelopes so the voice is reclaimed immediately.
    pub fn cut_off<B: AudioBackend>(&mut self, backend: &mut B, config: &EngineConfig) -> f64 {
        let fast = f64::from(config.evict_release);
        self.fade_out(backend, config, fast, fast)
    }

    fn fade_out<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        config: &EngineConfig,
        amp_release: f64,
        filter_release: f64,
    ) -> f64 {
        let now = backend.now();
        let amp_release = amp_release.max(MIN_TIME);
        let filter_release = filter_release.max(MIN_TIME);

        for gain in [self.gain1, self.gain2] {
            fade_to(backend, gain, Param::Gain, 0.0, now + amp_release);
        }
        for filter in [self.filter1, self.filter2] {
            fade_to(backend, filter, Param::Cutoff, config.cutoff_base, now + filter_release);
        }

        // Earlier deadlines win if the voice was already releasing.
        let stop_at = now + amp_release.max(filter_release);
        backend.stop(self.osc1, stop_at);
        backend.stop(self.osc2, stop_at);
        backend.stop(self.vibrato, stop_at);

        self.released_at = Some(now);
        stop_at
    }

    /// Node whose ended notification marks the voice as fully terminated.
    pub fn lifetime_node(&self) -> NodeId {
        self.osc1
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Backend time the voice was triggered at.
    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn target_velocity(&self) -> f32 {
        self.target_velocity
    }
}

/// Cancel pending curves and restate the current value at `now`, then ramp
/// linearly to `target` at `end`.
fn fade_to<B: AudioBackend>(backend: &mut B, node: NodeId, param: Param, target: f32, end: f64) {
    let now = backend.now();
    let current = backend.param_value(node, param);
    backend.cancel_scheduled_values(node, param, now);
    backend.set_value_at(node, param, current, now);
    backend.ramp_to_value_at(node, param, target, end);
}

/// Cancel pending curves and restate the current value at `now`, then
/// approach `target` exponentially with time constant `tau`.
fn retarget<B: AudioBackend>(
    backend: &mut B,
    node: NodeId,
    param: Param,
    target: f32,
    tau: f64,
) {
    let now = backend.now();
    let current = backend.param_value(node, param);
    backend.cancel_scheduled_values(node, param, now);
    backend.set_value_at(node, param, current, now);
    backend.set_target_at(node, param, target, now, tau);
}
