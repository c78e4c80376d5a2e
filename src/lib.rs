//! Dental X-ray annotation engine.
//!
//! Takes the JSON detections produced by a hosted inference service over a
//! patient X-ray and turns them into an annotated image (translucent region
//! fills, collision-avoided text labels, a finishing contrast pass) plus a
//! legend summary with per-class area percentages. Also carries the
//! surrounding plumbing: config and model registry in SQLite, output file
//! management, and a batch pipeline with progress reporting.

pub mod annotate;
pub mod colors;
pub mod config;
pub mod detections;
pub mod image_utils;
pub mod legend;
pub mod percentage;
pub mod pipeline;

pub use annotate::{draw_added_label, label_font, render_detections, LabelBox};
pub use colors::{hex_to_bgr, resolve_colors};
pub use detections::{Detection, InferenceResult};
pub use legend::Legend;
pub use percentage::class_percentages;
