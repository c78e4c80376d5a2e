//! Share of detected area per class.

use std::collections::HashMap;

use crate::detections::Detection;

/// Percentage of total detected area covered by each class, rounded to two
/// decimals. Areas are bounding-box areas even for polygon detections.
///
/// A total area of zero (no detections, or only degenerate boxes) maps every
/// observed class to 0 instead of failing. Input is assumed well-formed;
/// nothing is validated here.
pub fn class_percentages(detections: &[Detection]) -> HashMap<String, f64> {
    let mut total_area = 0.0;
    let mut class_areas: HashMap<String, f64> = HashMap::new();

    for det in detections {
        let area = det.box_area();
        total_area += area;
        *class_areas.entry(det.class_name.clone()).or_insert(0.0) += area;
    }

    if total_area <= 0.0 {
        return class_areas.into_keys().map(|name| (name, 0.0)).collect();
    }

    class_areas
        .into_iter()
        .map(|(name, area)| (name, round2(area / total_area * 100.0)))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
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
    fn percentages_sum_to_one_hundred() {
        // Three equal areas round to 33.33 each; the sum tolerance absorbs
        // the lost 0.01.
        let detections = vec![det("a", 10.0, 10.0), det("b", 10.0, 10.0), det("c", 10.0, 10.0)];
        let percentages = class_percentages(&detections);
        let sum: f64 = percentages.values().sum();
        assert!((sum - 100.0).abs() <= 0.01, "sum was {sum}");
    }

    #[test]
    fn splits_area_between_classes() {
        let detections = vec![det("Caries", 30.0, 10.0), det("Bone", 10.0, 10.0)];
        let percentages = class_percentages(&detections);
        assert_eq!(percentages["Caries"], 75.0);
        assert_eq!(percentages["Bone"], 25.0);
    }

    #[test]
    fn accumulates_repeated_classes() {
        let detections = vec![
            det("Caries", 10.0, 10.0),
            det("Caries", 10.0, 10.0),
            det("Bone", 20.0, 10.0),
        ];
        let percentages = class_percentages(&detections);
        assert_eq!(percentages.len(), 2);
        assert_eq!(percentages["Caries"], 50.0);
        assert_eq!(percentages["Bone"], 50.0);
    }

    #[test]
    fn identical_duplicate_detections_collapse_to_one_entry() {
        let detections = vec![det("Caries", 50.0, 20.0), det("Caries", 50.0, 20.0)];
        let percentages = class_percentages(&detections);
        assert_eq!(percentages.len(), 1);
        assert_eq!(percentages["Caries"], 100.0);
    }

    #[test]
    fn zero_total_area_maps_every_class_to_zero() {
        let detections = vec![det("Caries", 0.0, 20.0), det("Bone", 50.0, 0.0)];
        let percentages = class_percentages(&detections);
        assert_eq!(percentages.len(), 2);
        assert_eq!(percentages["Caries"], 0.0);
        assert_eq!(percentages["Bone"], 0.0);
    }

    #[test]
    fn empty_input_yields_empty_mapping() {
        assert!(class_percentages(&[]).is_empty());
    }

    #[test]
    fn rounds_to_two_decimals() {
        let detections = vec![det("a", 1.0, 1.0), det("b", 2.0, 1.0)];
        let percentages = class_percentages(&detections);
        assert_eq!(percentages["a"], 33.33);
        assert_eq!(percentages["b"], 66.67);
    }
}
