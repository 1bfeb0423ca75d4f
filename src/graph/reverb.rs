use crate::config::EngineConfig;
use crate::graph::backend::{AudioBackend, NodeId, Param};

/*
Reverb Network
==============

Four parallel delay lines with feedback, approximating a bank of decaying
comb filters:

              ┌─→ delay 23ms ─→ tap ─┐
              ├─→ delay 37ms ─→ tap ─┤
    input ────┼─→ delay 53ms ─→ tap ─┼─→ wet ─┐
         │    └─→ delay 67ms ─→ tap ─┘        ├─→ output
         │         ↑       feedback ┘         │
         └──────────────────────────→ dry ────┘

Each tap feeds a fixed-gain attenuator back into its own delay, so every
line rings down geometrically. The delay times avoid common factors, which
spreads the ring modes instead of piling them on one resonance.

Wet/dry balance and the feedback gain come from the engine config; the
topology itself never changes after `build`. The engine toggles reverb by
re-routing the master stage around the network, not by touching it.
*/

const COMB_DELAYS: [f64; 4] = [0.023, 0.037, 0.053, 0.067];
const TAP_SUM_LEVEL: f32 = 0.7;

/// The reverb send network; holds only its terminals.
pub struct ReverbNetwork {
    input: NodeId,
    output: NodeId,
}

impl ReverbNetwork {
    pub fn build<B: AudioBackend>(backend: &mut B, config: &EngineConfig) -> Self {
        let input = backend.create_gain(1.0);
        let output = backend.create_gain(1.0);
        let dry = backend.create_gain(config.reverb_dry);
        let wet = backend.create_gain(config.reverb_wet);

        backend.connect(input, dry);
        backend.connect(dry, output);

        let tap_level = TAP_SUM_LEVEL / COMB_DELAYS.len() as f32;
        for delay_time in COMB_DELAYS {
            let delay = backend.create_delay(delay_time);
            let tap = backend.create_gain(tap_level);
            let feedback = backend.create_gain(config.reverb_feedback);

            backend.connect(input, delay);
            backend.connect(delay, tap);
            backend.connect(tap, feedback);
            backend.connect(feedback, delay);
            backend.connect(tap, wet);
        }

        backend.connect(wet, output);

        Self { input, output }
    }

    /// Terminal the master stage feeds when reverb is enabled.
    pub fn input(&self) -> NodeId {
        self.input
    }

    /// Terminal feeding the sink when reverb is enabled.
    pub fn output(&self) -> NodeId {
        self.output
    }
}
