use crate::graph::backend::{AudioBackend, NodeId, Param, Waveform};

/*
Chorus Network
==============

The shared send effect for bow voices. Three parallel delay lines sit
between an input and an output terminal, each with its delay time slowly
wobbled by its own LFO:

              ┌─→ delay 20ms ─┐
    input ────┼─→ delay 30ms ─┼─→ wet (0.1) ─┐
         │    └─→ delay 40ms ─┘              ├─→ output
         └──────────────────────→ dry (0.9) ─┘

Each LFO runs at a slightly different rate (1.0 / 1.5 / 2.0 Hz) through a
2 ms depth gain into the line's delay-time parameter. The staggered rates
keep the three copies drifting against each other, which reads as several
strings sounding at once rather than one.

Built exactly once at engine init; every bow voice sums into `input` for
the engine's lifetime. Only the wet/dry balance is small enough to leave
fixed — this is a send effect, not a per-voice insert.
*/

const LINES: usize = 3;
const BASE_DELAY: f64 = 0.02;
const DELAY_SPREAD: f64 = 0.01;
const LFO_BASE_RATE: f32 = 1.0;
const LFO_RATE_STEP: f32 = 0.5;
const MOD_DEPTH: f32 = 0.002;
const WET_LEVEL: f32 = 0.1;
const DRY_LEVEL: f32 = 0.9;

/// The chorus send network. Holds only its two terminals; the internal
/// nodes belong to the backend.
pub struct ChorusNetwork {
    input: NodeId,
    output: NodeId,
}

impl ChorusNetwork {
    /// Materialize the network and start its LFOs.
    pub fn build<B: AudioBackend>(backend: &mut B) -> Self {
        let now = backend.now();
        let input = backend.create_gain(1.0);
        let output = backend.create_gain(1.0);
        let wet = backend.create_gain(WET_LEVEL);
        let dry = backend.create_gain(DRY_LEVEL);

        for line in 0..LINES {
            let delay = backend.create_delay(BASE_DELAY + line as f64 * DELAY_SPREAD);
            let lfo = backend
                .create_oscillator(Waveform::Sine, LFO_BASE_RATE + line as f32 * LFO_RATE_STEP);
            let depth = backend.create_gain(MOD_DEPTH);

            backend.connect(lfo, depth);
            backend.connect_param(depth, delay, Param::DelayTime);

            backend.connect(input, delay);
            backend.connect(delay, wet);

            backend.start(lfo, now);
        }

        backend.connect(input, dry);
        backend.connect(wet, output);
        backend.connect(dry, output);

        Self { input, output }
    }

    /// Terminal the voices sum into.
    pub fn input(&self) -> NodeId {
        self.input
    }

    /// Terminal feeding the master stage.
    pub fn output(&self) -> NodeId {
        self.output
    }
}
