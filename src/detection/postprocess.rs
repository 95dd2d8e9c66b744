//! Decoding of YOLO-style detection heads.
//!
//! The model emits a `[1, 4 + classes, anchors]` tensor. The first four rows
//! are box centre x, centre y, width and height in letterboxed input pixels;
//! the remaining rows are per-class scores.

use crate::detection::preprocessing::Letterbox;
use crate::error::InferenceError;
use crate::models::{BoundingBox, Detection};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessConfig {
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// Turn a raw `[attrs, anchors]` output slice into detections in source space
pub fn decode(
    output: &[f32],
    attrs: usize,
    anchors: usize,
    letterbox: &Letterbox,
    image_size: (u32, u32),
    config: &PostprocessConfig,
) -> Result<Vec<Detection>, InferenceError> {
    if attrs <= 4 {
        return Err(InferenceError::Inference(format!(
            "expected at least 5 attributes per anchor, got {}",
            attrs
        )));
    }
    if output.len() != attrs * anchors {
        return Err(InferenceError::Inference(format!(
            "output has {} values, expected {}x{}",
            output.len(),
            attrs,
            anchors
        )));
    }

    let at = |attr: usize, anchor: usize| output[attr * anchors + anchor];
    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    let mut candidates = Vec::new();

    for anchor in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for class in 0..attrs - 4 {
            let score = at(4 + class, anchor);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }

        if best_score < config.conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let (x1, y1) = letterbox.unmap(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.unmap(cx + w / 2.0, cy + h / 2.0);

        let bbox = BoundingBox::from_corners(
            x1.clamp(0.0, img_w),
            y1.clamp(0.0, img_h),
            x2.clamp(0.0, img_w),
            y2.clamp(0.0, img_h),
        );
        if bbox.area() <= 0.0 {
            continue;
        }

        candidates.push(Detection {
            class_id: best_class,
            confidence: best_score,
            bbox,
        });
    }

    Ok(non_max_suppression(
        candidates,
        config.iou_threshold,
        config.max_detections,
    ))
}

/// Greedy class-aware NMS. Output is sorted by descending confidence.
pub fn non_max_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    // Stable sort keeps anchor order for equal scores
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in detections {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}
