//! The voice layer: the two sound-producing strategies and the registry
//! that sequences their lifetimes.
//!
//! A voice is a small bundle of backend node handles plus the state needed
//! to answer lifecycle questions; all timing lives in scheduled curves, not
//! in the structs. The registry owns the polyphony rules: one voice per
//! note id, FIFO eviction over bow voices, serial-guarded removal from
//! ended callbacks.

/// Insertion-ordered voice table with FIFO eviction.
pub mod registry;
/// Pluck-mode sample playback voice.
pub mod sampler;
/// Bow-mode dual-oscillator synthesis voice.
pub mod voice;
