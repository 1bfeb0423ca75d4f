//! Sample support for pluck mode: decoded buffers, the async loader
//! contract, and the note-keyed store with nearest-sample lookup.

/// Decoded PCM buffers and the `SampleLoader` trait.
pub mod loader;
/// Note-keyed sample store with log-frequency nearest lookup.
pub mod store;

pub use loader::{MemoryLoader, SampleBuffer, SampleLoader};
pub use store::SampleStore;
