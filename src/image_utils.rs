//! Raster I/O for X-rays and annotated output files.

use std::path::{Path, PathBuf};

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use rand::Rng;

/// Decode an X-ray and convert to 8-bit RGB. Radiographs commonly arrive as
/// 16-bit grayscale TIFF or PNG; everything downstream draws on RGB8.
pub fn load_rgb(image_path: &Path) -> Result<RgbImage, Box<dyn std::error::Error + Send + Sync>> {
    let img = image::open(image_path)
        .map_err(|e| format!("open image {}: {}", image_path.display(), e))?;
    Ok(img.to_rgb8())
}

/// Generated output filename: timestamp plus a 4-digit random suffix,
/// e.g. `20260807153000-4821.jpeg`.
pub fn generated_jpeg_name() -> String {
    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let suffix = rand::thread_rng().gen_range(1000..=9999);
    format!("{}-{}.jpeg", stamp, suffix)
}

/// First non-existing variant of `p`, appending `_1`, `_2`, ... to the stem.
pub fn unique_path(p: &Path) -> PathBuf {
    if !p.exists() {
        return p.to_path_buf();
    }
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let ext = p.extension().and_then(|s| s.to_str()).unwrap_or("jpeg");
    let parent = p.parent().unwrap_or(Path::new("."));
    for n in 1..10000 {
        let candidate = parent.join(format!("{}_{}.{}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
    }
    parent.join(format!("{}_{}.{}", stem, 0, ext))
}

/// Encode the annotated image as JPEG under `output_dir` with a generated
/// name. Returns the path written.
pub fn save_annotated_jpeg(
    image: &RgbImage,
    output_dir: &Path,
    quality: u8,
) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(output_dir)?;
    let out = unique_path(&output_dir.join(generated_jpeg_name()));

    let mut file = std::fs::File::create(&out)
        .map_err(|e| format!("create {}: {}", out.display(), e))?;
    let mut encoder = JpegEncoder::new_with_quality(&mut file, quality);
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_has_expected_shape() {
        let name = generated_jpeg_name();
        // 14-digit timestamp, dash, 4-digit suffix, ".jpeg"
        assert_eq!(name.len(), 14 + 1 + 4 + 5);
        assert!(name.ends_with(".jpeg"));
        let (stamp, rest) = name.split_at(14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert!(rest.starts_with('-'));
    }

    #[test]
    fn unique_path_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out.jpeg");
        assert_eq!(unique_path(&p), p);

        std::fs::write(&p, b"x").unwrap();
        let second = unique_path(&p);
        assert_eq!(second, dir.path().join("out_1.jpeg"));

        std::fs::write(&second, b"x").unwrap();
        assert_eq!(unique_path(&p), dir.path().join("out_2.jpeg"));
    }

    #[test]
    fn saves_and_reloads_annotated_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(16, 8, image::Rgb([120, 130, 140]));
        let out = save_annotated_jpeg(&img, dir.path(), 98).unwrap();
        assert!(out.exists());

        let back = load_rgb(&out).unwrap();
        assert_eq!(back.dimensions(), (16, 8));
    }

    #[test]
    fn load_rgb_reports_missing_file() {
        let err = load_rgb(Path::new("/nonexistent/xray.png")).unwrap_err();
        assert!(err.to_string().contains("open image"));
    }
}
