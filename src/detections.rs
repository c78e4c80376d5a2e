//! Inference response model.
//!
//! Detections arrive as JSON produced by the hosted inference service and
//! are persisted verbatim next to the X-ray they belong to, so the field
//! names here mirror that wire format (`class`, centroid `x`/`y`, `width`,
//! `height`, optional polygon `points`).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// One polygon vertex in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolyPoint {
    pub x: f64,
    pub y: f64,
}

/// One model-identified region: class label plus bounding geometry.
/// `(x, y)` is the centroid of the axis-aligned bounding box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<PolyPoint>>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Detection {
    /// Bounding-box area. Always width x height, even when a polygon is
    /// present; persisted percentages were computed this way and must stay
    /// comparable.
    pub fn box_area(&self) -> f64 {
        self.width * self.height
    }
}

/// The inference service's response envelope. The `image` block is carried
/// through untouched so a reloaded response serializes back out with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub predictions: Vec<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<serde_json::Value>,
}

impl InferenceResult {
    /// Class labels in prediction order, duplicates kept.
    pub fn class_names(&self) -> Vec<String> {
        self.predictions
            .iter()
            .map(|p| p.class_name.clone())
            .collect()
    }

    /// Detections whose class is in `included`, original order preserved.
    pub fn retain_classes(&self, included: &HashSet<String>) -> Vec<Detection> {
        self.predictions
            .iter()
            .filter(|p| included.contains(&p.class_name))
            .cloned()
            .collect()
    }

    /// Split into (remaining, removed) around one class name. Used when a
    /// legend entry is excluded: the removed detections are kept aside so
    /// re-including the class can merge them back.
    pub fn partition_by_class(&self, class_name: &str) -> (Vec<Detection>, Vec<Detection>) {
        self.predictions
            .iter()
            .cloned()
            .partition(|p| p.class_name != class_name)
    }
}

pub fn parse_inference_json(
    json: &str,
) -> Result<InferenceResult, Box<dyn std::error::Error + Send + Sync>> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_inference_json(
    path: &Path,
) -> Result<InferenceResult, Box<dyn std::error::Error + Send + Sync>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("read predictions {}: {}", path.display(), e))?;
    serde_json::from_str(&json)
        .map_err(|e| format!("parse predictions {}: {}", path.display(), e).into())
}
