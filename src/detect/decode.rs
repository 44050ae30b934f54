//! Raw model output to clean detection list.
//!
//! Two decoder variants cover the two model generations:
//! - `RawAnchor`: per-anchor boxes in model-input pixel space plus
//!   channel-major per-class scores; class selection, rescaling and
//!   per-class NMS happen here.
//! - `PreSuppressed`: the network already ran suppression on-device and
//!   emits `[class_id, confidence, x1, y1, x2, y2]` records in
//!   original-image space, plus a valid count; decoding is iteration and
//!   sentinel skipping.
//!
//! The variant is fixed at configuration time, never sniffed per frame.

use crate::config::{DecoderSettings, ModelVariant};
use crate::detect::backend::ModelOutputs;
use crate::detect::nms::suppress_per_class;
use crate::detect::result::{BoundingBox, Detection, DetectionSet};
use crate::error::PipelineError;
use crate::labels::LabelTable;
use crate::preprocess::PreprocessResult;

pub struct OutputDecoder {
    settings: DecoderSettings,
    labels: LabelTable,
}

impl OutputDecoder {
    pub fn new(settings: DecoderSettings, labels: LabelTable) -> Self {
        Self { settings, labels }
    }

    pub fn variant(&self) -> &ModelVariant {
        &self.settings.variant
    }

    /// Decode one cycle's outputs into the full unfiltered detection set.
    ///
    /// The user-facing confidence threshold is NOT applied here; the whole
    /// set is cached so threshold changes refilter without re-inference.
    pub fn decode(
        &self,
        outputs: &ModelOutputs,
        frame: &PreprocessResult,
        frame_index: u64,
    ) -> Result<DetectionSet, PipelineError> {
        let detections = match self.settings.variant {
            ModelVariant::RawAnchor {
                num_anchors,
                num_classes,
            } => self.decode_raw_anchor(outputs, frame, num_anchors, num_classes)?,
            ModelVariant::PreSuppressed => self.decode_pre_suppressed(outputs)?,
        };

        Ok(DetectionSet {
            detections,
            original_width: frame.original_width,
            original_height: frame.original_height,
            frame_index,
        })
    }

    fn decode_raw_anchor(
        &self,
        outputs: &ModelOutputs,
        frame: &PreprocessResult,
        num_anchors: usize,
        num_classes: usize,
    ) -> Result<Vec<Detection>, PipelineError> {
        let boxes = outputs.require(&self.settings.boxes_tensor)?;
        let scores = outputs.require(&self.settings.scores_tensor)?;

        if boxes.data.len() != num_anchors * 4 {
            return Err(PipelineError::inference(format!(
                "boxes tensor has {} values, expected {} (num_anchors={})",
                boxes.data.len(),
                num_anchors * 4,
                num_anchors
            )));
        }
        if scores.data.len() != num_classes * num_anchors {
            return Err(PipelineError::inference(format!(
                "scores tensor has {} values, expected {} ({} classes x {} anchors)",
                scores.data.len(),
                num_classes * num_anchors,
                num_classes,
                num_anchors
            )));
        }

        let floor = self.settings.pre_nms_score_floor;
        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            // Scores are channel-major: all anchors for class 0, then
            // class 1, ... Accept the best class only above the floor.
            let mut best_class = -1i32;
            let mut best_score = floor;
            for c in 0..num_classes {
                let s = scores.data[c * num_anchors + i];
                if s > best_score {
                    best_score = s;
                    best_class = c as i32;
                }
            }
            if best_class < 0 {
                continue;
            }

            // Boxes are xyxy in model-input pixel space; invert the
            // independent-axis stretch to get original-image coordinates.
            let x1 = boxes.data[i * 4] / frame.scale_x;
            let y1 = boxes.data[i * 4 + 1] / frame.scale_y;
            let x2 = boxes.data[i * 4 + 2] / frame.scale_x;
            let y2 = boxes.data[i * 4 + 3] / frame.scale_y;

            candidates.push(Detection {
                class_id: best_class,
                class_name: self.labels.name(best_class),
                confidence: best_score,
                bbox: BoundingBox { x1, y1, x2, y2 },
            });
        }

        log::debug!(
            "decoder: {} candidates above score floor {}",
            candidates.len(),
            floor
        );

        Ok(suppress_per_class(
            candidates,
            self.settings.nms_iou_threshold,
        ))
    }

    fn decode_pre_suppressed(
        &self,
        outputs: &ModelOutputs,
    ) -> Result<Vec<Detection>, PipelineError> {
        let records = outputs.require(&self.settings.records_tensor)?;
        let valid_count = outputs.require(&self.settings.valid_count_tensor)?;

        let count = valid_count.data.first().copied().unwrap_or(0.0).max(0.0) as usize;
        let available = records.data.len() / 6;
        if count > available {
            log::warn!(
                "valid count {} exceeds {} available records; clamping",
                count,
                available
            );
        }
        let count = count.min(available);

        let mut detections = Vec::with_capacity(count);
        for i in 0..count {
            let record = &records.data[i * 6..(i + 1) * 6];
            let class_id = record[0].round() as i32;
            // Padding slots are marked with class_id == -1.
            if class_id < 0 {
                continue;
            }
            detections.push(Detection {
                class_id,
                class_name: self.labels.name(class_id),
                confidence: record[1],
                bbox: BoundingBox {
                    x1: record[2],
                    y1: record[3],
                    x2: record[4],
                    y2: record[5],
                },
            });
        }
        Ok(detections)
    }
}
