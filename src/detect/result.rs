use serde::Serialize;

/// Axis-aligned box in original-image pixel coordinates, `x1 < x2`,
/// `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

/// One detected object. Immutable once produced; a new inference cycle
/// produces an entirely new set.
#[derive(Clone, Debug, Serialize)]
pub struct Detection {
    pub class_id: i32,
    pub class_name: String,
    /// Score in `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Full unfiltered output of one inference cycle, plus the frame geometry
/// the renderer needs to scale boxes into its own display space.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
    pub original_width: u32,
    pub original_height: u32,
    /// Monotonic cycle counter assigned by the scheduler.
    pub frame_index: u64,
}

impl DetectionSet {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Detections at or above `threshold`. Pure, no I/O.
    pub fn filter_by_confidence(&self, threshold: f32) -> Vec<Detection> {
        self.detections
            .iter()
            .filter(|d| d.confidence >= threshold)
            .cloned()
            .collect()
    }
}
