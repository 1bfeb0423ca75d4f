//! Engine configuration.
//!
//! One plain-data struct covers the whole instrument: envelope timings,
//! oscillator levels, effect mix, polyphony, and the sample map for pluck
//! mode. `Default` reproduces the tuning of the original instrument patch.
//! All fields are public; hosts build a config once and hand it to
//! [`crate::engine::Engine::new`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linear-segment envelope timing. Attack and release are seconds; sustain
/// is a level fraction. The engine schedules only the attack and release
/// ramps — sustain is the value the attack ramp lands on — but the full
/// four-segment shape is kept so patches stay portable.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeConfig {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

/// One entry of the pluck-mode sample map: which note the recording is of,
/// and where the loader should fetch it from.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct SampleSlot {
    pub note: String,
    pub url: String,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum simultaneously-live bow voices. Sample voices decay on their
    /// own and are not counted.
    pub max_polyphony: usize,

    /// Vibrato depth as a fraction of the note frequency (scaled by 0.01).
    pub vibrato_amount: f32,
    /// Vibrato LFO rate in Hz.
    pub vibrato_rate: f32,
    /// Frequency ratio of the second oscillator relative to the first.
    pub harmonicity: f32,

    /// Amplitude envelope, applied to each oscillator's gain stage.
    pub amp_env: EnvelopeConfig,
    /// Filter envelope, applied to each oscillator's lowpass cutoff.
    pub filter_env: EnvelopeConfig,
    /// Cutoff the filters rest at (Hz).
    pub cutoff_base: f32,
    /// Cutoff the filter envelope opens to (Hz).
    pub cutoff_peak: f32,

    /// Reference level of the first oscillator, in dB.
    pub osc1_level_db: f32,
    /// Reference level of the second oscillator, in dB.
    pub osc2_level_db: f32,

    /// Time constant for velocity retargeting while a voice sustains (s).
    pub velocity_smoothing: f32,
    /// Release used for forced teardown (eviction, panic, retrigger cuts).
    /// Short enough to reclaim the voice immediately, long enough to avoid
    /// a click.
    pub evict_release: f32,

    /// Master output gain.
    pub master_gain: f32,
    /// Whether the master stage routes through the reverb after `init`.
    pub reverb_enabled: bool,
    /// Reverb wet bus gain.
    pub reverb_wet: f32,
    /// Reverb dry bus gain.
    pub reverb_dry: f32,
    /// Feedback gain of each reverb comb line.
    pub reverb_feedback: f32,

    /// Attenuation applied to sample playback, scaled by velocity.
    pub sample_level: f32,
    /// Pluck-mode sample map. A single slot is treated as the required
    /// primary sample: its load failure fails `init`. With multiple slots,
    /// failures are isolated per sample.
    pub samples: Vec<SampleSlot>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_polyphony: 8,

            vibrato_amount: 0.2,
            vibrato_rate: 2.0,
            harmonicity: 2.02,

            amp_env: EnvelopeConfig {
                attack: 0.1,
                decay: 0.3,
                sustain: 0.8,
                release: 0.3,
            },
            filter_env: EnvelopeConfig {
                attack: 0.1,
                decay: 0.3,
                sustain: 0.6,
                release: 0.5,
            },
            cutoff_base: 1.0,
            cutoff_peak: 4000.0,

            osc1_level_db: -22.0,
            osc2_level_db: -28.0,

            velocity_smoothing: 0.15,
            evict_release: 0.01,

            master_gain: 0.2,
            reverb_enabled: true,
            reverb_wet: 0.3,
            reverb_dry: 0.7,
            reverb_feedback: 0.5,

            sample_level: 0.8,
            samples: vec![SampleSlot {
                note: "C4".to_string(),
                url: "sounds/harp-c4.wav".to_string(),
            }],
        }
    }
}
