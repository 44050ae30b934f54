//! Inference invoker boundary.
//!
//! The network execution engine is a black box behind `InferenceBackend`:
//! a fixed-shape planar float32 tensor goes in, named output tensors come
//! out. Backends must not retain the input buffer between calls.

use std::collections::HashMap;

use crate::error::PipelineError;
use crate::preprocess::PreprocessResult;

/// A dense float32 tensor as returned by a backend.
#[derive(Clone, Debug)]
pub struct TensorData {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl TensorData {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        Self { data, shape }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Output tensors keyed by their well-known names.
#[derive(Clone, Debug, Default)]
pub struct ModelOutputs {
    tensors: HashMap<String, TensorData>,
}

impl ModelOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: TensorData) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&TensorData> {
        self.tensors.get(name)
    }

    /// Fetch a required tensor, or a `MissingOutput` error naming what the
    /// model actually produced.
    pub fn require(&self, name: &str) -> Result<&TensorData, PipelineError> {
        self.tensors.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
            available.sort_unstable();
            PipelineError::MissingOutput {
                name: name.to_string(),
                available: available.join(", "),
            }
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.tensors.keys().map(String::as_str).collect()
    }
}

/// Everything a backend may need to assemble its input feed.
///
/// The image tensor is `[1, 3, input_size, input_size]`, channel order
/// R,G,B. Models that also take `im_shape` / `scale_factor` auxiliary
/// tensors build them from the original dimensions and per-axis scales.
#[derive(Clone, Debug)]
pub struct ModelInput<'a> {
    pub planar: &'a [f32],
    pub input_size: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl<'a> ModelInput<'a> {
    pub fn from_preprocess(result: &'a PreprocessResult, input_size: u32) -> Self {
        Self {
            planar: &result.planar,
            input_size,
            original_width: result.original_width,
            original_height: result.original_height,
            scale_x: result.scale_x,
            scale_y: result.scale_y,
        }
    }

    /// `[height, width]` auxiliary tensor contents.
    pub fn im_shape(&self) -> [f32; 2] {
        [self.original_height as f32, self.original_width as f32]
    }

    /// `[scale_y, scale_x]` auxiliary tensor contents.
    pub fn scale_factor(&self) -> [f32; 2] {
        [self.scale_y, self.scale_x]
    }
}

/// Inference backend trait.
///
/// Exactly one `run` call is in flight at any time; the scheduler
/// serializes invocations. Failures abort only the current cycle.
pub trait InferenceBackend: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Run the network on one preprocessed frame.
    fn run(&mut self, input: &ModelInput<'_>) -> Result<ModelOutputs, PipelineError>;

    /// Optional warm-up hook, run once before the loop starts.
    fn warm_up(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_available_tensor_names() {
        let mut outputs = ModelOutputs::new();
        outputs.insert("scores", TensorData::new(vec![0.0], vec![1]));

        let err = outputs.require("boxes").unwrap_err();
        match err {
            PipelineError::MissingOutput { name, available } => {
                assert_eq!(name, "boxes");
                assert_eq!(available, "scores");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn auxiliary_tensors_follow_height_then_width_order() {
        let result = PreprocessResult {
            planar: vec![0.0; 3 * 4 * 4],
            original_width: 320,
            original_height: 240,
            scale_x: 1.0,
            scale_y: 320.0 / 240.0,
        };
        let input = ModelInput::from_preprocess(&result, 4);

        assert_eq!(input.im_shape(), [240.0, 320.0]);
        assert_eq!(input.scale_factor(), [320.0 / 240.0, 1.0]);
    }
}
