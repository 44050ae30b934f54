//! framewatch: live object-detection frame pipeline.
//!
//! Repeatedly captures a camera frame, converts it into the planar float32
//! tensor a detection network expects, invokes the network, decodes the
//! raw output into clean bounding boxes, and lets callers refilter cached
//! results by confidence without re-running inference.
//!
//! # Architecture
//!
//! - `preprocess`: image bytes -> normalized channel-major tensor
//! - `detect`: inference backend boundary, output decoding, per-class NMS
//! - `cache`: last full detection set + O(n) confidence refilter
//! - `capture`: snapshot source boundary (stub, file replay, HTTP)
//! - `pipeline`: the capture/inference scheduler with one-frame overlap
//! - `session`: explicit context object wiring the above together
//!
//! The scheduler keeps exactly one inference in flight and at most one
//! capture pre-started ahead of it; detection sets publish strictly in
//! capture order, and a failed cycle never stops the stream.

pub mod cache;
pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod labels;
pub mod pipeline;
pub mod preprocess;
pub mod session;

pub use cache::DetectionCache;
pub use capture::{CaptureSource, CapturedFrame};
pub use config::{
    CaptureSettings, DecoderSettings, FramewatchConfig, ModelConfig, ModelSettings, ModelVariant,
};
pub use detect::{
    BoundingBox, Detection, DetectionSet, InferenceBackend, ModelInput, ModelOutputs,
    OutputDecoder, StubBackend, TensorData,
};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use error::PipelineError;
pub use labels::LabelTable;
pub use pipeline::{ChannelSink, DetectionSink, NullSink, PipelineScheduler};
pub use preprocess::{preprocess, preprocess_file, PreprocessResult};
pub use session::{build_backend, DetectionSession};
