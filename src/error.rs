//! Error types for the engine surface.
//!
//! Steady-state playback never returns errors; malformed input degrades with
//! a log line instead (see the fallback policy in `notes`). The fallible
//! surface is limited to initialization and the strict parsers.

use thiserror::Error;

/// Errors surfaced by [`crate::engine::Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The only configured sample failed to load. With a single-slot sample
    /// map there is nothing left for pluck mode to play, so initialization
    /// fails as a whole. Multi-slot maps isolate per-slot failures instead.
    #[error("sample {note} failed to load")]
    SampleLoad {
        note: String,
        #[source]
        source: SampleLoadError,
    },
}

/// Failure while fetching or decoding one sample.
#[derive(Debug, Error)]
pub enum SampleLoadError {
    #[error("fetching {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("decoding {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("no sample registered for {url}")]
    Missing { url: String },
}

/// A note token that does not match `letter [#|b] octave-digits`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid note token {token:?}")]
pub struct ParseNoteError {
    pub token: String,
}

/// A mode token other than `"bow"` or `"pluck"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode {0:?}, expected \"bow\" or \"pluck\"")]
pub struct ParseModeError(pub String);
