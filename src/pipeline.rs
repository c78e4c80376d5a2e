//! Batch annotation: locate stored inference responses, render overlays,
//! write outputs and legend summaries, report progress.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use ab_glyph::FontArc;
use log::{info, warn};

use crate::annotate::{label_font, render_detections};
use crate::config::AppConfig;
use crate::detections::load_inference_json;
use crate::image_utils::{load_rgb, save_annotated_jpeg};
use crate::legend::{build_legends, included_classes, Legend};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, serde::Serialize)]
pub struct ProgressPayload {
    pub processed: usize,
    pub total: usize,
    pub current_file: String,
    pub status: String,
    pub detection_count: usize,
    pub class_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

#[derive(Clone, serde::Serialize)]
pub struct DonePayload {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub total_detections: usize,
    pub distinct_classes: usize,
}

/// Stored inference response belonging to an X-ray: `<stem>.predictions.json`
/// next to the image.
pub fn predictions_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("predictions.json")
}

/// Legend summary belonging to an X-ray: `<stem>.labels.json` next to the
/// image. Survives across runs so include/exclude edits stick.
pub fn legends_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("labels.json")
}

/// Result of annotating one X-ray.
pub struct ProcessedFile {
    pub output: PathBuf,
    pub legends: Vec<Legend>,
    pub rendered_detections: usize,
}

/// Annotate a single X-ray from its stored inference response.
///
/// Legends are rebuilt from the full detection set (percentages always
/// describe the whole prediction); include flags from a previous legend
/// summary are carried over, and only included classes are drawn.
pub fn annotate_xray(
    image_path: &Path,
    config: &AppConfig,
    font: &FontArc,
) -> Result<ProcessedFile, BoxError> {
    let result = load_inference_json(&predictions_path(image_path))?;
    let image = load_rgb(image_path)?;

    let mut legends = build_legends(&result.predictions);
    let legends_file = legends_path(image_path);
    if legends_file.exists() {
        let prior: Vec<Legend> = serde_json::from_str(
            &std::fs::read_to_string(&legends_file)
                .map_err(|e| format!("read legends {}: {}", legends_file.display(), e))?,
        )
        .map_err(|e| format!("parse legends {}: {}", legends_file.display(), e))?;
        for legend in &mut legends {
            if let Some(p) = prior.iter().find(|p| p.name == legend.name) {
                legend.include = p.include;
                legend.color_hex = p.color_hex.clone();
            }
        }
    }

    let included = included_classes(&legends);
    let kept = result.retain_classes(&included);
    let colors: HashMap<String, String> = legends
        .iter()
        .map(|l| (l.name.clone(), l.color_hex.clone()))
        .collect();

    let rendered = render_detections(&image, &kept, &colors, font);
    let output = save_annotated_jpeg(
        &rendered,
        Path::new(&config.analyzed_dir),
        config.jpeg_quality_value(),
    )?;

    if config.save_legends_enabled() {
        std::fs::write(&legends_file, serde_json::to_string_pretty(&legends)?)
            .map_err(|e| format!("write legends {}: {}", legends_file.display(), e))?;
    }

    Ok(ProcessedFile {
        output,
        legends,
        rendered_detections: kept.len(),
    })
}

/// Process a list of X-ray files sequentially, reporting per-file progress.
/// The cancel flag is polled between files; files already processed stay on
/// disk. Individual failures are counted and logged, not fatal.
pub fn run_processing_files(
    files: &[String],
    config: &AppConfig,
    cancel: &AtomicBool,
    mut on_log: impl FnMut(&str),
    mut on_progress: impl FnMut(&ProgressPayload),
    mut on_done: impl FnMut(&DonePayload),
) -> Result<(), BoxError> {
    if files.is_empty() {
        return Err("No files to process".into());
    }

    let font = label_font();
    let total = files.len();
    let mut successful = 0_usize;
    let mut failed = 0_usize;
    let mut total_detections = 0_usize;
    let mut distinct_classes: HashSet<String> = HashSet::new();

    on_log(&format!("Annotating {} file(s)...", total));

    for (index, file) in files.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!("processing cancelled after {} file(s)", index);
            on_log("Cancelled.");
            break;
        }

        match annotate_xray(Path::new(file), config, &font) {
            Ok(outcome) => {
                successful += 1;
                total_detections += outcome.rendered_detections;
                distinct_classes.extend(
                    outcome
                        .legends
                        .iter()
                        .filter(|l| l.include)
                        .map(|l| l.name.clone()),
                );
                on_log(&format!(
                    "{} -> {} ({} detections)",
                    file,
                    outcome.output.display(),
                    outcome.rendered_detections
                ));
                on_progress(&ProgressPayload {
                    processed: index + 1,
                    total,
                    current_file: file.clone(),
                    status: "done".into(),
                    detection_count: outcome.rendered_detections,
                    class_count: outcome.legends.iter().filter(|l| l.include).count(),
                    output_file: Some(outcome.output.display().to_string()),
                });
            }
            Err(e) => {
                failed += 1;
                warn!("failed to annotate {}: {}", file, e);
                on_log(&format!("Failed: {} ({})", file, e));
                on_progress(&ProgressPayload {
                    processed: index + 1,
                    total,
                    current_file: file.clone(),
                    status: "failed".into(),
                    detection_count: 0,
                    class_count: 0,
                    output_file: None,
                });
            }
        }
    }

    let done = DonePayload {
        successful,
        failed,
        total,
        total_detections,
        distinct_classes: distinct_classes.len(),
    };
    on_log(&format!("Done. {} succeeded, {} failed.", successful, failed));
    on_done(&done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const PREDICTIONS: &str = r#"{
        "predictions": [
            {"class": "Caries", "x": 16.0, "y": 16.0, "width": 10.0, "height": 8.0},
            {"class": "Bone", "x": 24.0, "y": 20.0, "width": 12.0, "height": 8.0}
        ]
    }"#;

    fn write_fixture(dir: &Path) -> PathBuf {
        let image_path = dir.join("xray.png");
        RgbImage::from_pixel(48, 40, Rgb([90, 90, 90]))
            .save(&image_path)
            .unwrap();
        std::fs::write(predictions_path(&image_path), PREDICTIONS).unwrap();
        image_path
    }

    fn test_config(dir: &Path) -> AppConfig {
        AppConfig {
            analyzed_dir: dir.join("analyzed").display().to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn sidecar_paths_replace_the_extension() {
        let p = Path::new("/data/scan.png");
        assert_eq!(predictions_path(p), Path::new("/data/scan.predictions.json"));
        assert_eq!(legends_path(p), Path::new("/data/scan.labels.json"));
    }

    #[test]
    fn annotates_file_and_writes_legend_summary() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_fixture(dir.path());
        let config = test_config(dir.path());

        let outcome = annotate_xray(&image_path, &config, &label_font()).unwrap();
        assert!(outcome.output.exists());
        assert_eq!(outcome.rendered_detections, 2);

        let legends: Vec<Legend> =
            serde_json::from_str(&std::fs::read_to_string(legends_path(&image_path)).unwrap())
                .unwrap();
        assert_eq!(legends.len(), 2);
        assert!(legends.iter().all(|l| l.include));
    }

    #[test]
    fn excluded_legend_classes_are_not_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_fixture(dir.path());
        let config = test_config(dir.path());

        let mut legends = {
            let outcome = annotate_xray(&image_path, &config, &label_font()).unwrap();
            outcome.legends
        };
        crate::legend::set_included(&mut legends, "Bone", false);
        std::fs::write(
            legends_path(&image_path),
            serde_json::to_string(&legends).unwrap(),
        )
        .unwrap();

        let outcome = annotate_xray(&image_path, &config, &label_font()).unwrap();
        assert_eq!(outcome.rendered_detections, 1);
        // The exclusion is preserved in the rewritten summary.
        let back: Vec<Legend> =
            serde_json::from_str(&std::fs::read_to_string(legends_path(&image_path)).unwrap())
                .unwrap();
        assert!(!back.iter().find(|l| l.name == "Bone").unwrap().include);
        // Percentages still describe the full detection set.
        let caries = back.iter().find(|l| l.name == "Caries").unwrap();
        assert!(caries.percentage < 100.0);
    }

    #[test]
    fn batch_counts_successes_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_fixture(dir.path());
        let config = test_config(dir.path());

        let files = vec![
            image_path.display().to_string(),
            dir.path().join("missing.png").display().to_string(),
        ];
        let cancel = AtomicBool::new(false);
        let mut progress = Vec::new();
        let mut done: Option<DonePayload> = None;

        run_processing_files(
            &files,
            &config,
            &cancel,
            |_| {},
            |p| progress.push(p.clone()),
            |d| done = Some(d.clone()),
        )
        .unwrap();

        let done = done.unwrap();
        assert_eq!(done.successful, 1);
        assert_eq!(done.failed, 1);
        assert_eq!(done.total, 2);
        assert_eq!(done.total_detections, 2);
        assert_eq!(done.distinct_classes, 2);
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].status, "done");
        assert_eq!(progress[1].status, "failed");
    }

    #[test]
    fn empty_file_list_is_an_error() {
        let config = AppConfig::default();
        let cancel = AtomicBool::new(false);
        let err = run_processing_files(&[], &config, &cancel, |_| {}, |_| {}, |_| {}).unwrap_err();
        assert!(err.to_string().contains("No files"));
    }

    #[test]
    fn cancel_flag_stops_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_fixture(dir.path());
        let config = test_config(dir.path());

        let cancel = AtomicBool::new(true);
        let mut done: Option<DonePayload> = None;
        run_processing_files(
            &[image_path.display().to_string()],
            &config,
            &cancel,
            |_| {},
            |_| {},
            |d| done = Some(d.clone()),
        )
        .unwrap();

        let done = done.unwrap();
        assert_eq!(done.successful, 0);
        assert_eq!(done.failed, 0);
    }
}
