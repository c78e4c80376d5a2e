//! Display colors for detection classes.
//!
//! The table is fixed at compile time; class names not listed resolve to
//! white rather than an error, so newly trained classes still render.

use std::collections::HashMap;

use image::Rgb;

/// Fallback for class names missing from the table.
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// Hex display color for a detection class.
pub fn color_for(class_name: &str) -> &'static str {
    match class_name {
        "Attrited Enamel" => "#00CED1",
        "Bone" => "#AFEEEE",
        "Bone level" => "#ADD8E6",
        "BoneLoss-InterRadicular" => "#800020",
        "Boneloss-Interdental" => "#800020",
        "CEJ" => "#FFC0CB",
        "Calculus" => "#4B0082",
        "Caries" => "#008080",
        "ConeCut" => "#AFEEEE",
        "Crown Prosthesis" => "#C0C0C0",
        "Enamel" => "#FFB6C1",
        "Impacted Molar" => "#FFC0CB",
        "Implant" => "#FFD700",
        "Incisor" => "#FFFFE0",
        "InfAlvNrv" => "#4169E1",
        "Mandibular Canine" => "#90EE90",
        "Mandibular Molar" => "#90EE90",
        "Mandibular Premolar" => "#E6E6FA",
        "Mandibular Tooth" => "#CCFF99",
        "Maxilary Canine" => "#ADD8E6",
        "Maxilary Premolar" => "#FFDAB9",
        "Maxillary Molar" => "#87CEEB",
        "Maxillary Tooth" => "#FFC0CB",
        "Missing Tooth" => "#4169E1",
        "Obturated Canal" => "#FF8C00",
        "Open Margin" => "#8B4513",
        "OverHanging Restoration" => "#191970",
        "Periapical Pathology" => "#DC143C",
        "Pulp" => "#FFA07A",
        "Restoration" => "#FFBF00",
        "Root Stump" => "#FF8C00",
        "Sinus" => "#AFEEEE",
        "cr" => "#008080",
        "crown length" => "#8B4513",
        "im" => "#FFD700",
        "nrv" => "#FF8C00",
        "4" => "#CCFF99",
        "5" => "#8622FF",
        "6" => "#FE0056",
        "7" => "#DC143C",
        "8" => "#FF8C00",
        "9" => "#008080",
        "10" => "#FFA07A",
        "11" => "#FFB6C1",
        "12" => "#87CEEB",
        "13" => "#FFC0CB",
        "14" => "#4169E1",
        "15" => "#8B4513",
        "16" => "#90EE90",
        "17" => "#4B0082",
        "18" => "#800020",
        "19" => "#FF8C00",
        "20" => "#DC143C",
        "21" => "#00CED1",
        "22" => "#AFEEEE",
        "23" => "#800020",
        "24" => "#FFDAB9",
        "25" => "#DB7093",
        "26" => "#FFD700",
        "27" => "#E6E6FA",
        "28" => "#CCFF99",
        "29" => "#8622FF",
        "30" => "#FE0056",
        "31" => "#DC143C",
        "32" => "#FF8C00",
        "Impacted Incisors" => "#90EE90",
        "Inf Alv Nrv" => "#87CEEB",
        "License- CC BY 4-0" => "#008080",
        "Mandibular Fracture" => "#4169E1",
        "Provided by a Roboflow user" => "#FFA07A",
        "cone cut" => "#4B0082",
        "https-universe-roboflow-com-salud360-dental-qbbud" => "#FFB6C1",
        "pathology" => "#8B4513",
        _ => DEFAULT_COLOR,
    }
}

/// Build the class -> hex mapping for a list of labels.
/// Duplicate labels collapse to one entry.
pub fn resolve_colors<I, S>(labels: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hex_codes = HashMap::new();
    for label in labels {
        let label = label.as_ref();
        hex_codes
            .entry(label.to_string())
            .or_insert_with(|| color_for(label).to_string());
    }
    hex_codes
}

fn hex_channels(hex_color: &str) -> (u8, u8, u8) {
    let hex = hex_color.trim_start_matches('#');
    // Unparseable digit pairs read as 0xFF, the same white fallback as an
    // unknown class name.
    let channel = |i: usize| -> u8 {
        hex.get(i..i + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .unwrap_or(0xFF)
    };
    (channel(0), channel(2), channel(4))
}

/// Convert `#RRGGBB` to a blue-green-red ordered triple, the channel order
/// the persisted annotation records follow.
pub fn hex_to_bgr(hex_color: &str) -> (u8, u8, u8) {
    let (r, g, b) = hex_channels(hex_color);
    (b, g, r)
}

/// Convert `#RRGGBB` to the raster pixel type used for drawing.
pub fn hex_to_rgb(hex_color: &str) -> Rgb<u8> {
    let (r, g, b) = hex_channels(hex_color);
    Rgb([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_classes_resolve_deterministically() {
        assert_eq!(color_for("Caries"), "#008080");
        assert_eq!(color_for("Implant"), "#FFD700");
        assert_eq!(color_for("25"), "#DB7093");
    }

    #[test]
    fn unknown_class_resolves_to_white() {
        assert_eq!(color_for("UnknownXYZ"), "#FFFFFF");
        let codes = resolve_colors(["UnknownXYZ"]);
        assert_eq!(codes["UnknownXYZ"], "#FFFFFF");
    }

    #[test]
    fn resolve_colors_collapses_duplicates() {
        let codes = resolve_colors(["Caries", "Caries", "Bone"]);
        assert_eq!(codes.len(), 2);
        assert_eq!(codes["Caries"], "#008080");
        assert_eq!(codes["Bone"], "#AFEEEE");
    }

    #[test]
    fn hex_to_bgr_reorders_channels() {
        assert_eq!(hex_to_bgr("#FF0000"), (0, 0, 255));
        assert_eq!(hex_to_bgr("#00FF00"), (0, 255, 0));
        assert_eq!(hex_to_bgr("#0000FF"), (255, 0, 0));
        assert_eq!(hex_to_bgr("#008080"), (128, 128, 0));
    }

    #[test]
    fn hex_to_rgb_matches_bgr_reversed() {
        let Rgb([r, g, b]) = hex_to_rgb("#112233");
        assert_eq!(hex_to_bgr("#112233"), (b, g, r));
    }
}
