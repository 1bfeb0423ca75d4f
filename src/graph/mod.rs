//! The audio-graph layer: the backend contract the engine schedules against,
//! and the fixed send-effect networks built on top of it.
//!
//! Nothing in this module renders audio. The engine describes node topology
//! and future-timestamped parameter curves; an [`backend::AudioBackend`]
//! implementation owns the signal path and applies the curves at the
//! scheduled times.

/// Backend contract: node primitives, routing, and curve scheduling.
pub mod backend;
/// Three-line modulated-delay chorus network.
pub mod chorus;
/// Scripted backend that records the graph and evaluates curves.
pub mod mock;
/// Four-line feedback comb reverb network.
pub mod reverb;
