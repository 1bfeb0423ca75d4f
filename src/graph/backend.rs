use crate::samples::loader::SampleBuffer;

/*
Backend Contract
================

The engine never touches samples directly. It builds a node graph out of a
small set of primitives and schedules parameter curves against the backend's
monotonic clock; the backend applies those curves sample-accurately without
further engine involvement. This is what lets a single-threaded control
layer drive a real-time signal path: every decision is expressed as a
future-timestamped curve, and cancellation always supersedes a pending
curve rather than waiting for it.

Scheduling Model
----------------

Each automatable parameter carries an event list:

  set_value_at(v, t)            jump to v at time t
  ramp_to_value_at(v, t)        linear ramp from the previous event to v,
                                arriving exactly at t
  set_target_at(v, t, tau)      exponential approach toward v starting at t,
                                with time constant tau (never quite arrives;
                                used for smooth retargeting)
  cancel_scheduled_values(t)    drop every event at or after t

Rescheduling a parameter that already has pending curves must follow the
anchor discipline: read the current value, cancel pending events, re-set the
current value at `now`, then schedule the new curve. Skipping the anchor
replays the old curve's endpoint and produces an audible step.

Node Lifetime
-------------

Sources (oscillators, buffer sources) are one-shot: created, started once,
stopped once. `stop` on an already-stopped source is a no-op so teardown
paths never have to track whether a sample ran to its natural end. The
backend reports the actual end of a source through the `set_on_ended`
callback, which is the engine's only notification channel; the engine never
polls the clock.
*/

/// Opaque handle to a backend node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Filter response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterShape {
    Lowpass,
    Highpass,
}

/// Automatable parameter of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Param {
    /// Oscillator frequency (Hz).
    Frequency,
    /// Gain multiplier.
    Gain,
    /// Filter cutoff (Hz).
    Cutoff,
    /// Delay time (s).
    DelayTime,
    /// Buffer source playback rate.
    PlaybackRate,
}

/// The out-of-scope signal backend, expressed as the contract the engine
/// needs: node construction, routing, source lifetime, and parameter curve
/// scheduling. See the module docs for the scheduling model.
pub trait AudioBackend {
    /// Monotonic clock in seconds. All scheduled times are on this clock.
    fn now(&self) -> f64;

    /// The output sink.
    fn destination(&self) -> NodeId;

    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId;
    fn create_filter(&mut self, shape: FilterShape, cutoff: f32, resonance: f32) -> NodeId;
    fn create_gain(&mut self, gain: f32) -> NodeId;
    fn create_delay(&mut self, delay: f64) -> NodeId;
    fn create_buffer_source(&mut self, buffer: SampleBuffer, playback_rate: f64) -> NodeId;

    /// Connect a node's output to another node's input. Connecting an
    /// already-connected pair is a no-op.
    fn connect(&mut self, from: NodeId, to: NodeId);

    /// Connect a node's output to a parameter of another node; the source's
    /// signal is summed into the parameter's scheduled value (LFO-style
    /// modulation).
    fn connect_param(&mut self, from: NodeId, to: NodeId, param: Param);

    /// Remove all of `node`'s outgoing connections.
    fn disconnect(&mut self, node: NodeId);

    fn start(&mut self, node: NodeId, when: f64);

    /// Schedule a source to stop. No-op if the source already stopped.
    fn stop(&mut self, node: NodeId, when: f64);

    /// Register a callback invoked once, after the source actually stops
    /// (scheduled stop or natural end of a buffer).
    fn set_on_ended(&mut self, node: NodeId, callback: Box<dyn FnOnce()>);

    /// Current instantaneous value of a parameter, with in-progress curves
    /// evaluated at `now`.
    fn param_value(&self, node: NodeId, param: Param) -> f32;

    fn set_value_at(&mut self, node: NodeId, param: Param, value: f32, at: f64);
    fn ramp_to_value_at(&mut self, node: NodeId, param: Param, value: f32, at: f64);
    fn set_target_at(&mut self, node: NodeId, param: Param, target: f32, at: f64, time_constant: f64);
    fn cancel_scheduled_values(&mut self, node: NodeId, param: Param, after: f64);
}
