//! Error taxonomy for the frame pipeline.
//!
//! Every per-frame failure is a `PipelineError` so the scheduler can decide
//! how to degrade: a bad frame aborts only its own cycle, a missing output
//! tensor becomes an empty detection set, and cleanup failures are logged
//! and dropped. `ModelLoad` is the one fatal variant; it is raised during
//! session construction, before the loop ever starts.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The captured bytes were not a supported image encoding.
    #[error("failed to decode captured image: {0}")]
    Decode(#[from] image::ImageError),

    /// The decoded image has zero width or height.
    #[error("decoded image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// Capture source failed to produce a frame.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The inference backend faulted (not loaded, shape mismatch, runtime).
    #[error("inference failed: {0}")]
    Inference(String),

    /// An expected output tensor was absent from the model result.
    ///
    /// Callers treat this as an empty detection set, not a cycle failure.
    #[error("model output '{name}' missing; available: [{available}]")]
    MissingOutput { name: String, available: String },

    /// A capture temp artifact could not be removed. Logged, never fatal.
    #[error("failed to remove capture artifact {}: {source}", path.display())]
    ResourceCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model could not be loaded at startup. Fatal to starting the pipeline.
    #[error("failed to load model: {0}")]
    ModelLoad(String),
}

impl PipelineError {
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// True for the degraded-but-not-failed case: the cycle should publish
    /// an empty detection set instead of being discarded.
    pub fn is_missing_output(&self) -> bool {
        matches!(self, Self::MissingOutput { .. })
    }
}
