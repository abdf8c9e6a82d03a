use crate::config::InferenceConfig;
use common::span;
use ndarray::ArrayViewD;

/// Upper bound on candidates entering NMS, highest confidence first.
const MAX_NMS_CANDIDATES: usize = 30_000;

/// Axis-aligned box in pixel corners with the model's raw class id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl BoundingBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_x1 = self.x1.max(other.x1);
        let inter_y1 = self.y1.max(other.y1);
        let inter_x2 = self.x2.min(other.x2);
        let inter_y2 = self.y2.min(other.y2);

        let inter_area = (inter_x2 - inter_x1).max(0.0) * (inter_y2 - inter_y1).max(0.0);
        let union_area = self.area() + other.area() - inter_area;

        if union_area <= 0.0 {
            0.0
        } else {
            inter_area / union_area
        }
    }
}

/// Letterbox parameters needed to map input-space boxes back onto the upload.
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl TransformParams {
    fn to_original(&self, bbox: BoundingBox) -> BoundingBox {
        let width = self.orig_width as f32;
        let height = self.orig_height as f32;

        BoundingBox {
            x1: ((bbox.x1 - self.offset_x) / self.scale).max(0.0).min(width),
            y1: ((bbox.y1 - self.offset_y) / self.scale).max(0.0).min(height),
            x2: ((bbox.x2 - self.offset_x) / self.scale).max(0.0).min(width),
            y2: ((bbox.y2 - self.offset_y) / self.scale).max(0.0).min(height),
            ..bbox
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[1, 4 + num_classes, N]`, NMS still to be applied
    Raw { num_candidates: usize },
    /// `[1, N, 6]`, NMS already applied inside the graph
    EndToEnd { num_rows: usize },
}

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub num_classes: usize,
}

impl PostProcessor {
    pub fn new(config: &InferenceConfig, num_classes: usize) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
            num_classes,
        }
    }

    pub fn layout(&self, shape: &[usize]) -> anyhow::Result<OutputLayout> {
        match *shape {
            [1, channels, num_candidates] if channels == 4 + self.num_classes => {
                Ok(OutputLayout::Raw { num_candidates })
            }
            [1, num_rows, 6] => Ok(OutputLayout::EndToEnd { num_rows }),
            _ => anyhow::bail!(
                "Unexpected prediction shape {:?} for a model with {} classes",
                shape,
                self.num_classes
            ),
        }
    }

    /// Decode model predictions into boxes in original image pixels,
    /// ordered by descending confidence.
    #[tracing::instrument(skip(self, predictions, transform))]
    pub fn parse_detections(
        &self,
        predictions: &ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<BoundingBox>> {
        let boxes = match self.layout(predictions.shape())? {
            OutputLayout::Raw { num_candidates } => {
                let candidates = self.decode_raw(predictions, num_candidates);
                tracing::trace!(candidates = candidates.len(), "Candidates above threshold");
                self.non_maximum_suppression(candidates)
            }
            OutputLayout::EndToEnd { num_rows } => self.decode_end_to_end(predictions, num_rows)?,
        };

        Ok(boxes
            .into_iter()
            .map(|bbox| transform.to_original(bbox))
            .collect())
    }

    fn decode_raw(&self, predictions: &ArrayViewD<f32>, num_candidates: usize) -> Vec<BoundingBox> {
        let _s = span!("decode_raw");

        let mut candidates = Vec::new();

        for i in 0..num_candidates {
            // argmax over class scores
            let mut confidence = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in 0..self.num_classes {
                let score = predictions[[0, 4 + c, i]];
                if score > confidence {
                    confidence = score;
                    class_id = c;
                }
            }

            if !passes_threshold(confidence, self.confidence_threshold) {
                continue;
            }

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(
                predictions[[0, 0, i]],
                predictions[[0, 1, i]],
                predictions[[0, 2, i]],
                predictions[[0, 3, i]],
            );

            candidates.push(BoundingBox {
                x1,
                y1,
                x2,
                y2,
                confidence,
                class_id,
            });
        }

        candidates
    }

    fn decode_end_to_end(
        &self,
        predictions: &ArrayViewD<f32>,
        num_rows: usize,
    ) -> anyhow::Result<Vec<BoundingBox>> {
        let _s = span!("decode_end_to_end");

        let mut boxes = Vec::new();

        for i in 0..num_rows {
            let confidence = predictions[[0, i, 4]];
            if !passes_threshold(confidence, self.confidence_threshold) {
                continue;
            }

            let class_value = predictions[[0, i, 5]];
            if !class_value.is_finite() || class_value < 0.0 {
                anyhow::bail!("Invalid class id {} in prediction row {}", class_value, i);
            }

            boxes.push(BoundingBox {
                x1: predictions[[0, i, 0]],
                y1: predictions[[0, i, 1]],
                x2: predictions[[0, i, 2]],
                y2: predictions[[0, i, 3]],
                confidence,
                class_id: class_value.round() as usize,
            });

            if boxes.len() == self.max_detections {
                break;
            }
        }

        Ok(boxes)
    }

    /// Class-aware greedy NMS.
    fn non_maximum_suppression(&self, mut candidates: Vec<BoundingBox>) -> Vec<BoundingBox> {
        let _s = span!("non_maximum_suppression");

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.truncate(MAX_NMS_CANDIDATES);

        let mut kept: Vec<BoundingBox> = Vec::with_capacity(self.max_detections.min(candidates.len()));

        for candidate in candidates {
            if kept.len() >= self.max_detections {
                break;
            }

            let suppressed = kept.iter().any(|k| {
                k.class_id == candidate.class_id && k.iou(&candidate) > self.iou_threshold
            });

            if !suppressed {
                kept.push(candidate);
            }
        }

        kept
    }
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
/// NaN scores never pass.
fn passes_threshold(confidence: f32, threshold: f32) -> bool {
    confidence >= threshold
}

fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}
