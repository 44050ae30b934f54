//! Greedy per-class non-max suppression.

use std::collections::BTreeMap;

use crate::detect::result::{BoundingBox, Detection};

/// Intersection-over-union of two boxes. Zero when they do not overlap.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);
    let iw = (ix2 - ix1).max(0.0);
    let ih = (iy2 - iy1).max(0.0);
    let intersection = iw * ih;
    if intersection == 0.0 {
        return 0.0;
    }
    intersection / (a.area() + b.area() - intersection)
}

/// Suppress overlapping same-class candidates, keeping the highest-scoring
/// box of each cluster.
///
/// Candidates are grouped by class; within a class they are sorted by
/// descending confidence and the usual greedy sweep runs: keep the best
/// unsuppressed box, drop every remaining box whose IoU with it exceeds
/// `iou_threshold`. Output order is grouped by class, confidence-descending
/// within each class.
pub fn suppress_per_class(candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    let mut by_class: BTreeMap<i32, Vec<Detection>> = BTreeMap::new();
    for det in candidates {
        by_class.entry(det.class_id).or_default().push(det);
    }

    let mut kept = Vec::new();
    for (_, mut group) in by_class {
        group.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut suppressed = vec![false; group.len()];
        for i in 0..group.len() {
            if suppressed[i] {
                continue;
            }
            for j in (i + 1)..group.len() {
                if !suppressed[j] && iou(&group[i].bbox, &group[j].bbox) > iou_threshold {
                    suppressed[j] = true;
                }
            }
            kept.push(group[i].clone());
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: i32, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            class_id,
            class_name: format!("class_{}", class_id),
            confidence,
            bbox: BoundingBox { x1, y1, x2, y2 },
        }
    }

    #[test]
    fn iou_of_box_with_itself_is_one() {
        let b = BoundingBox {
            x1: 3.0,
            y1: 4.0,
            x2: 10.0,
            y2: 20.0,
        };
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
        };
        let b = BoundingBox {
            x1: 50.0,
            y1: 50.0,
            x2: 60.0,
            y2: 60.0,
        };
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn overlapping_same_class_box_is_suppressed() {
        // IoU of the two class-0 boxes is 81/119 > 0.5; the class-1 box is
        // far away and untouched.
        let candidates = vec![
            det(0, 0.9, 0.0, 0.0, 10.0, 10.0),
            det(0, 0.8, 1.0, 1.0, 11.0, 11.0),
            det(1, 0.7, 50.0, 50.0, 60.0, 60.0),
        ];

        let kept = suppress_per_class(candidates, 0.5);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].class_id, 0);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(kept[1].class_id, 1);
    }

    #[test]
    fn same_overlap_different_class_is_kept() {
        let candidates = vec![
            det(0, 0.9, 0.0, 0.0, 10.0, 10.0),
            det(1, 0.8, 1.0, 1.0, 11.0, 11.0),
        ];
        let kept = suppress_per_class(candidates, 0.5);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn nms_is_idempotent() {
        let candidates = vec![
            det(0, 0.9, 0.0, 0.0, 10.0, 10.0),
            det(0, 0.8, 1.0, 1.0, 11.0, 11.0),
            det(0, 0.6, 30.0, 30.0, 40.0, 40.0),
            det(1, 0.7, 50.0, 50.0, 60.0, 60.0),
        ];

        let once = suppress_per_class(candidates, 0.5);
        let twice = suppress_per_class(once.clone(), 0.5);

        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.class_id, b.class_id);
            assert_eq!(a.confidence, b.confidence);
            assert_eq!(a.bbox, b.bbox);
        }
    }

    #[test]
    fn kept_same_class_pairs_stay_under_iou_threshold() {
        let candidates = vec![
            det(0, 0.95, 0.0, 0.0, 10.0, 10.0),
            det(0, 0.90, 2.0, 2.0, 12.0, 12.0),
            det(0, 0.85, 4.0, 4.0, 14.0, 14.0),
            det(0, 0.80, 6.0, 6.0, 16.0, 16.0),
            det(0, 0.75, 20.0, 20.0, 30.0, 30.0),
        ];
        let threshold = 0.5;

        let kept = suppress_per_class(candidates, threshold);

        for i in 0..kept.len() {
            for j in (i + 1)..kept.len() {
                if kept[i].class_id == kept[j].class_id {
                    assert!(iou(&kept[i].bbox, &kept[j].bbox) <= threshold);
                }
            }
        }
    }
}
