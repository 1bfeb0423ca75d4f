//! Sample loading.
//!
//! The engine does not fetch or decode anything itself: an async
//! [`SampleLoader`] collaborator turns a URL into a decoded [`SampleBuffer`]
//! during `init`, and the buffers are read-only from then on. Buffers share
//! their data behind an `Arc`, so handing one to a playback voice is cheap.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SampleLoadError;

/// A decoded mono PCM buffer.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    data: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            data: Arc::new(data),
            sample_rate,
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration in seconds at native playback rate.
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / f64::from(self.sample_rate.max(1))
    }
}

/// Fetches and decodes one sample. Implementations own transport and codec
/// concerns; the engine only awaits the decoded buffer.
#[allow(async_fn_in_trait)]
pub trait SampleLoader {
    async fn load(&self, url: &str) -> Result<SampleBuffer, SampleLoadError>;
}

/// Loader over pre-decoded in-memory buffers, for hosts that embed their
/// sample data and for tests. URLs that were never inserted resolve to
/// [`SampleLoadError::Missing`].
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    buffers: HashMap<String, SampleBuffer>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, buffer: SampleBuffer) {
        self.buffers.insert(url.into(), buffer);
    }
}

impl SampleLoader for MemoryLoader {
    async fn load(&self, url: &str) -> Result<SampleBuffer, SampleLoadError> {
        self.buffers
            .get(url)
            .cloned()
            .ok_or_else(|| SampleLoadError::Missing {
                url: url.to_string(),
            })
    }
}
