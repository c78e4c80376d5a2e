//! Legend entries: one row per detected class with its display color,
//! area percentage and an include flag driving re-renders.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::colors::resolve_colors;
use crate::detections::Detection;
use crate::percentage::class_percentages;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Legend {
    pub name: String,
    pub color_hex: String,
    pub percentage: f64,
    pub include: bool,
}

/// Build one legend per distinct class in the detection list, all included.
/// Sorted by name so serialized summaries are stable across runs.
pub fn build_legends(detections: &[Detection]) -> Vec<Legend> {
    let percentages = class_percentages(detections);
    let colors = resolve_colors(detections.iter().map(|d| d.class_name.as_str()));

    let mut legends: Vec<Legend> = percentages
        .into_iter()
        .map(|(name, percentage)| {
            let color_hex = colors
                .get(&name)
                .cloned()
                .unwrap_or_else(|| crate::colors::DEFAULT_COLOR.to_string());
            Legend {
                name,
                color_hex,
                percentage,
                include: true,
            }
        })
        .collect();
    legends.sort_by(|a, b| a.name.cmp(&b.name));
    legends
}

/// Class names whose legends are currently included.
pub fn included_classes(legends: &[Legend]) -> HashSet<String> {
    legends
        .iter()
        .filter(|l| l.include)
        .map(|l| l.name.clone())
        .collect()
}

/// Flip one legend's include flag. Returns false when no legend has that
/// name. Percentages are left untouched; they always describe the full
/// detection set the prediction was created from.
pub fn set_included(legends: &mut [Legend], name: &str, include: bool) -> bool {
    match legends.iter_mut().find(|l| l.name == name) {
        Some(legend) => {
            legend.include = include;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_name: &str, width: f64, height: f64) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            x: 0.0,
            y: 0.0,
            width,
            height,
            confidence: 1.0,
            points: None,
        }
    }

    #[test]
    fn builds_sorted_included_legends() {
        let detections = vec![det("Caries", 10.0, 10.0), det("Bone", 30.0, 10.0)];
        let legends = build_legends(&detections);
        assert_eq!(legends.len(), 2);
        assert_eq!(legends[0].name, "Bone");
        assert_eq!(legends[0].color_hex, "#AFEEEE");
        assert_eq!(legends[0].percentage, 75.0);
        assert_eq!(legends[1].name, "Caries");
        assert_eq!(legends[1].color_hex, "#008080");
        assert!(legends.iter().all(|l| l.include));
    }

    #[test]
    fn unknown_class_gets_white_legend() {
        let legends = build_legends(&[det("Mystery", 5.0, 5.0)]);
        assert_eq!(legends[0].color_hex, "#FFFFFF");
    }

    #[test]
    fn included_classes_honors_flags() {
        let detections = vec![det("Caries", 10.0, 10.0), det("Bone", 10.0, 10.0)];
        let mut legends = build_legends(&detections);
        assert!(set_included(&mut legends, "Bone", false));
        let included = included_classes(&legends);
        assert!(included.contains("Caries"));
        assert!(!included.contains("Bone"));
    }

    #[test]
    fn set_included_rejects_unknown_name() {
        let mut legends = build_legends(&[det("Caries", 10.0, 10.0)]);
        assert!(!set_included(&mut legends, "Bone", false));
        assert!(legends[0].include);
    }
}
