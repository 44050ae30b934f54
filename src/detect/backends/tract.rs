#![cfg(feature = "backend-tract")]

use std::path::Path;

use tract_onnx::prelude::*;

use crate::detect::backend::{InferenceBackend, ModelInput, ModelOutputs, TensorData};
use crate::error::PipelineError;

/// Tract-based backend for ONNX inference.
///
/// Loads a local model file with a fixed `[1, 3, input_size, input_size]`
/// input fact. Models that take `im_shape` / `scale_factor` auxiliary
/// inputs get those as inputs 1 and 2 (`[1, 2]` f32 each).
///
/// Tract returns output tensors positionally; `output_names` maps them to
/// the well-known names the decoder looks up.
pub struct TractBackend {
    plan: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    input_size: u32,
    aux_inputs: bool,
    output_names: Vec<String>,
}

impl TractBackend {
    /// Load and optimize an ONNX model.
    ///
    /// Errors here are fatal to starting the pipeline; they are raised
    /// during session construction, never inside the frame loop.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_size: u32,
        aux_inputs: bool,
        output_names: Vec<String>,
    ) -> Result<Self, PipelineError> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;

        let mut model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| {
                PipelineError::ModelLoad(format!(
                    "failed to read ONNX model {}: {}",
                    model_path.display(),
                    e
                ))
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .map_err(|e| PipelineError::ModelLoad(format!("failed to set image fact: {}", e)))?;

        if aux_inputs {
            for slot in [1, 2] {
                model = model
                    .with_input_fact(slot, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 2)))
                    .map_err(|e| {
                        PipelineError::ModelLoad(format!(
                            "failed to set auxiliary fact {}: {}",
                            slot, e
                        ))
                    })?;
            }
        }

        let plan = model
            .into_optimized()
            .map_err(|e| PipelineError::ModelLoad(format!("failed to optimize model: {}", e)))?
            .into_runnable()
            .map_err(|e| PipelineError::ModelLoad(format!("failed to build plan: {}", e)))?;

        Ok(Self {
            plan,
            input_size,
            aux_inputs,
            output_names,
        })
    }

    fn build_image_tensor(&self, input: &ModelInput<'_>) -> Result<Tensor, PipelineError> {
        let size = self.input_size as usize;
        let expected = 3 * size * size;
        if input.planar.len() != expected {
            return Err(PipelineError::inference(format!(
                "planar buffer has {} values, expected {}",
                input.planar.len(),
                expected
            )));
        }
        tract_ndarray::Array4::from_shape_vec((1, 3, size, size), input.planar.to_vec())
            .map(|arr| arr.into_tensor())
            .map_err(|e| PipelineError::inference(format!("failed to shape input tensor: {}", e)))
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn run(&mut self, input: &ModelInput<'_>) -> Result<ModelOutputs, PipelineError> {
        let image = self.build_image_tensor(input)?;

        let feed: TVec<TValue> = if self.aux_inputs {
            let im_shape =
                tract_ndarray::Array2::from_shape_vec((1, 2), input.im_shape().to_vec())
                    .map_err(|e| PipelineError::inference(format!("im_shape tensor: {}", e)))?
                    .into_tensor();
            let scale_factor =
                tract_ndarray::Array2::from_shape_vec((1, 2), input.scale_factor().to_vec())
                    .map_err(|e| PipelineError::inference(format!("scale_factor tensor: {}", e)))?
                    .into_tensor();
            tvec!(image.into(), im_shape.into(), scale_factor.into())
        } else {
            tvec!(image.into())
        };

        let outputs = self
            .plan
            .run(feed)
            .map_err(|e| PipelineError::inference(format!("ONNX inference failed: {}", e)))?;

        let mut named = ModelOutputs::new();
        for (slot, name) in self.output_names.iter().enumerate() {
            let Some(tensor) = outputs.get(slot) else {
                continue;
            };
            // Valid-count outputs come back as i32 on some exports; widen
            // everything to f32 for the decoder.
            let data: Vec<f32> = if let Ok(view) = tensor.to_array_view::<f32>() {
                view.iter().copied().collect()
            } else if let Ok(view) = tensor.to_array_view::<i32>() {
                view.iter().map(|v| *v as f32).collect()
            } else {
                return Err(PipelineError::inference(format!(
                    "output '{}' has unsupported dtype {:?}",
                    name,
                    tensor.datum_type()
                )));
            };
            named.insert(name.clone(), TensorData::new(data, tensor.shape().to_vec()));
        }
        Ok(named)
    }
}
