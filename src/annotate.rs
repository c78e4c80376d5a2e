//! Overlay renderer: polygon fills, label placement and the finishing pass.
//!
//! Labels are placed strictly in detection order. Each placement checks the
//! boxes accepted so far, so the loop must stay sequential; running
//! detections in parallel would change which labels win uncontested spots.

use std::collections::HashMap;

use ab_glyph::{FontArc, PxScale};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_polygon_mut, draw_text_mut, text_size};
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::debug;

use crate::colors::{hex_to_rgb, DEFAULT_COLOR};
use crate::detections::{Detection, PolyPoint};

/// Pixel padding around label text.
const LABEL_PADDING: i32 = 5;
/// Extra gap added to every nudge stride.
const NUDGE_SPACING: i32 = 5;
/// Placement gives up after this many nudges and keeps the last candidate,
/// overlap or not.
const MAX_NUDGES: u32 = 10;
/// Opacity of polygon region fills.
const MASK_ALPHA: f32 = 0.4;
/// Fraction of the underlying image surviving beneath a label background.
const LABEL_BG_KEEP: f32 = 0.3;
/// Label text size in pixels before image-size scaling.
const BASE_FONT_PX: f32 = 22.0;
/// Outline thickness for manually added annotation rectangles, before scaling.
const BASE_RECT_THICKNESS: f32 = 2.0;
/// Finishing pass: v' = clamp(CONTRAST_GAIN * v + BRIGHTNESS_BIAS).
const CONTRAST_GAIN: f32 = 1.1;
const BRIGHTNESS_BIAS: f32 = 5.0;

/// Reference image size the base font metrics were tuned for; larger or
/// smaller images scale label text proportionally in the add-label path.
const REFERENCE_SIZE: (f32, f32) = (800.0, 600.0);

/// Editor viewport manual annotation coordinates are expressed in.
pub const EDITOR_VIEWPORT: (f64, f64) = (480.0, 400.0);

static FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// The bundled label font.
pub fn label_font() -> FontArc {
    FontArc::try_from_slice(FONT_DATA).expect("bundled font parses")
}

/// On-image rectangle reserved for one detection's caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LabelBox {
    /// Box around text anchored at baseline `(x, y)`.
    fn around_text(x: i32, y: i32, text_w: i32, text_h: i32, pad: i32) -> Self {
        Self {
            x1: x - pad,
            y1: y - text_h - 2 * pad,
            x2: x + text_w + pad,
            y2: y + pad,
        }
    }

    /// Inclusive intersection test: boxes that merely touch count as
    /// overlapping.
    pub fn overlaps(&self, other: &LabelBox) -> bool {
        !(self.x2 < other.x1 || self.x1 > other.x2 || self.y2 < other.y1 || self.y1 > other.y2)
    }
}

fn measure_text(scale: PxScale, font: &FontArc, text: &str) -> (i32, i32) {
    let (w, h) = text_size(scale, font, text);
    (w as i32, h as i32)
}

/// Nudge a label anchor until its box clears every previously placed box:
/// up on even iterations, right on odd ones, at most [`MAX_NUDGES`] moves.
/// Returns the final anchor, the accepted box and the nudge count. The
/// accepted box may still overlap once the cap is hit; callers treat that
/// as degraded output, not an error.
fn place_label(
    mut x: i32,
    mut y: i32,
    text_w: i32,
    text_h: i32,
    pad: i32,
    placed: &[LabelBox],
) -> (i32, i32, LabelBox, u32) {
    let mut candidate = LabelBox::around_text(x, y, text_w, text_h, pad);
    let mut nudges = 0;
    while placed.iter().any(|b| candidate.overlaps(b)) {
        if nudges % 2 == 0 {
            y -= text_h + 2 * pad + NUDGE_SPACING;
        } else {
            x += text_w + 2 * pad + NUDGE_SPACING;
        }
        candidate = LabelBox::around_text(x, y, text_w, text_h, pad);
        nudges += 1;
        if nudges >= MAX_NUDGES {
            break;
        }
    }
    (x, y, candidate, nudges)
}

/// Rasterize a polygon outline as a filled mask the size of the image.
/// Returns None for fewer than three usable vertices; the caller skips the
/// fill silently in that case.
pub(crate) fn fill_polygon_mask(width: u32, height: u32, points: &[PolyPoint]) -> Option<GrayImage> {
    let mut poly: Vec<Point<i32>> = points
        .iter()
        .map(|p| Point::new(p.x as i32, p.y as i32))
        .collect();
    poly.dedup();
    // draw_polygon_mut rejects a repeated closing vertex.
    if poly.len() >= 2 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() < 3 {
        return None;
    }
    let mut mask = GrayImage::new(width, height);
    draw_polygon_mut(&mut mask, &poly, Luma([255u8]));
    Some(mask)
}

/// Blend `color` into the image at `alpha`, restricted to mask pixels.
fn blend_mask(image: &mut RgbImage, mask: &GrayImage, color: Rgb<u8>, alpha: f32) {
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 {
            continue;
        }
        let px = image.get_pixel_mut(x, y);
        for c in 0..3 {
            px[c] = (alpha * color[c] as f32 + (1.0 - alpha) * px[c] as f32).round() as u8;
        }
    }
}

/// Darken the label background region to `keep` of its brightness. Parts of
/// the box outside the image are ignored.
fn darken_box(image: &mut RgbImage, b: &LabelBox, keep: f32) {
    let (w, h) = image.dimensions();
    let x1 = b.x1.max(0);
    let y1 = b.y1.max(0);
    let x2 = b.x2.min(w as i32 - 1);
    let y2 = b.y2.min(h as i32 - 1);
    for y in y1..=y2 {
        for x in x1..=x2 {
            let px = image.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                px[c] = (keep * px[c] as f32).round() as u8;
            }
        }
    }
}

/// Cosmetic finishing pass applied after all detections are drawn:
/// `v' = clamp(1.1 * v + 5)`.
pub fn finish_image(image: &mut RgbImage) {
    for px in image.pixels_mut() {
        for c in 0..3 {
            px[c] = (CONTRAST_GAIN * px[c] as f32 + BRIGHTNESS_BIAS)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }
}

/// Render the full annotation overlay: per detection, in input order, a
/// translucent polygon fill (when an outline is present), a darkened label
/// background placed to avoid earlier labels, and the class name in the
/// class color. Ends with the whole-image finishing pass, so an empty
/// detection list still returns `finish_image(input)`.
pub fn render_detections(
    image: &RgbImage,
    detections: &[Detection],
    colors: &HashMap<String, String>,
    font: &FontArc,
) -> RgbImage {
    let mut annotated = image.clone();
    let scale = PxScale::from(BASE_FONT_PX);
    let mut placed: Vec<LabelBox> = Vec::new();

    for det in detections {
        let hex = colors
            .get(&det.class_name)
            .map(String::as_str)
            .unwrap_or(DEFAULT_COLOR);
        let color = hex_to_rgb(hex);

        if let Some(points) = det.points.as_deref() {
            if let Some(mask) = fill_polygon_mask(annotated.width(), annotated.height(), points) {
                blend_mask(&mut annotated, &mask, color, MASK_ALPHA);
            }
        }

        // Anchor at the bounding box top-left; the polygon plays no part in
        // label placement.
        let anchor_x = (det.x - det.width / 2.0) as i32;
        let anchor_y = (det.y - det.height / 2.0) as i32;
        let (text_w, text_h) = measure_text(scale, font, &det.class_name);
        let (x, y, label_box, nudges) =
            place_label(anchor_x, anchor_y, text_w, text_h, LABEL_PADDING, &placed);
        if nudges > 0 {
            debug!("label '{}' nudged {} time(s)", det.class_name, nudges);
        }
        placed.push(label_box);

        darken_box(&mut annotated, &label_box, LABEL_BG_KEEP);
        draw_text_mut(&mut annotated, color, x, y - text_h, scale, font, &det.class_name);
    }

    finish_image(&mut annotated);
    annotated
}

/// Map a rectangle from editor-viewport coordinates to image pixels.
/// Returns top-left position and size.
pub fn scale_viewport_rect(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    image_w: u32,
    image_h: u32,
) -> (i32, i32, i32, i32) {
    let scale_x = image_w as f64 / EDITOR_VIEWPORT.0;
    let scale_y = image_h as f64 / EDITOR_VIEWPORT.1;
    (
        (x * scale_x) as i32,
        (y * scale_y) as i32,
        (width * scale_x) as i32,
        (height * scale_y) as i32,
    )
}

/// Draw one manually added annotation onto an already-annotated image: the
/// bounding rectangle outline plus a captioned label, with font, thickness
/// and padding scaled to the image size. The label flips below the box when
/// it would leave the top edge. No blending and no finishing pass here; the
/// base image already went through them.
pub fn draw_added_label(
    image: &mut RgbImage,
    text: &str,
    color_hex: &str,
    rect_x: i32,
    rect_y: i32,
    rect_w: i32,
    rect_h: i32,
    font: &FontArc,
) {
    let (img_w, img_h) = image.dimensions();
    let ratio = (img_w as f32 / REFERENCE_SIZE.0).min(img_h as f32 / REFERENCE_SIZE.1);
    let scale = PxScale::from(BASE_FONT_PX * ratio);
    let pad = ((LABEL_PADDING as f32 * ratio) as i32).max(1);
    let thickness = ((BASE_RECT_THICKNESS * ratio) as i32).max(1);

    let color = hex_to_rgb(color_hex);
    draw_rect_outline(image, rect_x, rect_y, rect_w, rect_h, color, thickness);

    let (text_w, text_h) = measure_text(scale, font, text);
    let text_x = rect_x;
    let mut text_y = rect_y - pad;
    if text_y - text_h < 0 {
        text_y = rect_y + rect_h + text_h + pad;
    }

    let bg = LabelBox::around_text(text_x, text_y, text_w, text_h, pad);
    let bg_w = (bg.x2 - bg.x1).max(1) as u32;
    let bg_h = (bg.y2 - bg.y1).max(1) as u32;
    draw_filled_rect_mut(
        image,
        Rect::at(bg.x1, bg.y1).of_size(bg_w, bg_h),
        Rgb([0, 0, 0]),
    );
    draw_text_mut(image, color, text_x, text_y - text_h, scale, font, text);
}

/// Hollow rectangle with thickness, clamped to the image.
fn draw_rect_outline(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    color: Rgb<u8>,
    thickness: i32,
) {
    let (img_w, img_h) = image.dimensions();
    let x_min = x.max(0).min(img_w as i32);
    let y_min = y.max(0).min(img_h as i32);
    let x_max = (x + w).max(0).min(img_w as i32);
    let y_max = (y + h).max(0).min(img_h as i32);
    let rw = (x_max - x_min).max(1) as u32;
    let rh = (y_max - y_min).max(1) as u32;

    draw_hollow_rect_mut(image, Rect::at(x_min, y_min).of_size(rw, rh), color);
    for t in 1..thickness.min(rw as i32 / 2).min(rh as i32 / 2) {
        let rw2 = rw.saturating_sub(2 * t as u32).max(1);
        let rh2 = rh.saturating_sub(2 * t as u32).max(1);
        draw_hollow_rect_mut(image, Rect::at(x_min + t, y_min + t).of_size(rw2, rh2), color);
    }
}
