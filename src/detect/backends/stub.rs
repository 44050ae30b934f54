use crate::detect::backend::{InferenceBackend, ModelInput, ModelOutputs, TensorData};
use crate::error::PipelineError;

/// Stub backend for tests and model-less runs.
///
/// Two modes: replay a canned `ModelOutputs` on every call, or synthesize
/// a raw-anchor output with a single confident box that drifts across the
/// frame as calls accumulate (so a live overlay visibly updates).
pub struct StubBackend {
    mode: StubMode,
    calls: u64,
}

enum StubMode {
    Canned(ModelOutputs),
    Synthetic { num_anchors: usize, num_classes: usize },
}

impl StubBackend {
    /// Replay the same outputs every cycle.
    pub fn canned(outputs: ModelOutputs) -> Self {
        Self {
            mode: StubMode::Canned(outputs),
            calls: 0,
        }
    }

    /// Emit raw-anchor tensors with one synthetic detection per cycle.
    pub fn synthetic(num_anchors: usize, num_classes: usize) -> Self {
        Self {
            mode: StubMode::Synthetic {
                num_anchors,
                num_classes,
            },
            calls: 0,
        }
    }

    fn synthesize(
        &self,
        input: &ModelInput<'_>,
        num_anchors: usize,
        num_classes: usize,
    ) -> ModelOutputs {
        let size = input.input_size as f32;
        // Drift a quarter-frame box along the diagonal, wrapping.
        let step = (self.calls % 16) as f32 / 16.0;
        let x1 = step * size * 0.5;
        let y1 = step * size * 0.5;
        let (x2, y2) = (x1 + size * 0.25, y1 + size * 0.25);

        let anchor = (self.calls as usize) % num_anchors;
        let class = (self.calls as usize) % num_classes;

        let mut boxes = vec![0.0f32; num_anchors * 4];
        boxes[anchor * 4] = x1;
        boxes[anchor * 4 + 1] = y1;
        boxes[anchor * 4 + 2] = x2;
        boxes[anchor * 4 + 3] = y2;

        let mut scores = vec![0.0f32; num_classes * num_anchors];
        scores[class * num_anchors + anchor] = 0.85;

        let mut outputs = ModelOutputs::new();
        outputs.insert("boxes", TensorData::new(boxes, vec![1, num_anchors, 4]));
        outputs.insert(
            "scores",
            TensorData::new(scores, vec![1, num_classes, num_anchors]),
        );
        outputs
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn run(&mut self, input: &ModelInput<'_>) -> Result<ModelOutputs, PipelineError> {
        let outputs = match &self.mode {
            StubMode::Canned(outputs) => outputs.clone(),
            StubMode::Synthetic {
                num_anchors,
                num_classes,
            } => self.synthesize(input, *num_anchors, *num_classes),
        };
        self.calls += 1;
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::PreprocessResult;

    fn input(result: &PreprocessResult) -> ModelInput<'_> {
        ModelInput::from_preprocess(result, 320)
    }

    #[test]
    fn synthetic_mode_places_one_scored_anchor() {
        let frame = PreprocessResult {
            planar: vec![0.0; 3],
            original_width: 320,
            original_height: 320,
            scale_x: 1.0,
            scale_y: 1.0,
        };
        let mut backend = StubBackend::synthetic(8, 2);

        let outputs = backend.run(&input(&frame)).expect("stub run");
        let scores = outputs.get("scores").expect("scores tensor");
        let hot = scores.data.iter().filter(|s| **s > 0.0).count();
        assert_eq!(hot, 1);

        let boxes = outputs.get("boxes").expect("boxes tensor");
        assert_eq!(boxes.data.len(), 8 * 4);
    }

    #[test]
    fn canned_mode_replays_outputs() {
        let frame = PreprocessResult {
            planar: vec![0.0; 3],
            original_width: 64,
            original_height: 64,
            scale_x: 5.0,
            scale_y: 5.0,
        };
        let mut canned = ModelOutputs::new();
        canned.insert("boxes", TensorData::new(vec![1.0; 4], vec![1, 1, 4]));

        let mut backend = StubBackend::canned(canned);
        let first = backend.run(&input(&frame)).expect("run");
        let second = backend.run(&input(&frame)).expect("run");
        assert_eq!(
            first.get("boxes").map(|t| t.data.clone()),
            second.get("boxes").map(|t| t.data.clone())
        );
    }
}
