mod backend;
mod backends;
mod decode;
mod nms;
mod result;

pub use backend::{InferenceBackend, ModelInput, ModelOutputs, TensorData};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use decode::OutputDecoder;
pub use nms::{iou, suppress_per_class};
pub use result::{BoundingBox, Detection, DetectionSet};
