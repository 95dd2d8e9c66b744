//! Burn detection boxes and labels into the source pixels.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::models::{AnnotatedImage, BoundingBox, Detection};

const BOX_THICKNESS: u32 = 2;
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const LABEL_PAD: u32 = 2;

/// Per-class box colors, cycled by class id
pub const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38],
    [0xFF, 0x9D, 0x97],
    [0xFF, 0x70, 0x1F],
    [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31],
    [0x48, 0xF9, 0x0A],
    [0x92, 0xCC, 0x17],
    [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34],
    [0x00, 0xD4, 0xBB],
    [0x2C, 0x99, 0xA8],
    [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93],
    [0x64, 0x73, 0xFF],
    [0x00, 0x18, 0xEC],
    [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85],
    [0xCB, 0x38, 0xFF],
    [0xFF, 0x95, 0xC8],
    [0xFF, 0x37, 0xC7],
];

pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draw every detection onto a copy of `source`
pub fn annotate(source: &DynamicImage, detections: &[Detection]) -> AnnotatedImage {
    let mut image = source.to_rgb8();
    let (img_w, img_h) = image.dimensions();

    if img_w > 0 && img_h > 0 {
        let scale = (img_w.min(img_h) / 320).max(1);
        for detection in detections {
            let color = class_color(detection.class_id);
            let rect = rect_from_bbox(&detection.bbox, img_w, img_h);
            draw_box(&mut image, rect, color);
            let label = format!("{} {:.2}", detection.class_id, detection.confidence);
            draw_label(&mut image, rect, &label, color, scale);
        }
    }

    AnnotatedImage {
        image,
        detections: detections.to_vec(),
    }
}

/// Convert a floating-point box to a pixel rect clamped to the image
fn rect_from_bbox(bbox: &BoundingBox, img_w: u32, img_h: u32) -> Rect {
    let max_x = (img_w - 1) as f32;
    let max_y = (img_h - 1) as f32;

    let x1 = bbox.x.clamp(0.0, max_x);
    let y1 = bbox.y.clamp(0.0, max_y);
    let x2 = bbox.max_x().clamp(0.0, max_x);
    let y2 = bbox.max_y().clamp(0.0, max_y);

    let width = (x2 - x1).max(1.0).round() as u32;
    let height = (y2 - y1).max(1.0).round() as u32;

    Rect::at(x1.round() as i32, y1.round() as i32).of_size(width, height)
}

fn draw_box(image: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS {
        if rect.width() <= 2 * inset || rect.height() <= 2 * inset {
            break;
        }
        let inner = Rect::at(rect.left() + inset as i32, rect.top() + inset as i32)
            .of_size(rect.width() - 2 * inset, rect.height() - 2 * inset);
        draw_hollow_rect_mut(image, inner, color);
    }
}

/// Filled tab above the box (inside it at the top edge) with the label text
fn draw_label(image: &mut RgbImage, rect: Rect, text: &str, color: Rgb<u8>, scale: u32) {
    let tab_w = text.len() as u32 * (GLYPH_W + 1) * scale + 2 * LABEL_PAD;
    let tab_h = GLYPH_H * scale + 2 * LABEL_PAD;

    let top = if rect.top() >= tab_h as i32 {
        rect.top() - tab_h as i32
    } else {
        rect.top()
    };
    let tab_w = tab_w.min(image.width().saturating_sub(rect.left() as u32)).max(1);
    let tab = Rect::at(rect.left(), top).of_size(tab_w, tab_h);
    draw_filled_rect_mut(image, tab, color);

    let luma = 0.299 * color[0] as f32 + 0.587 * color[1] as f32 + 0.114 * color[2] as f32;
    let ink = if luma > 150.0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) };

    let mut pen_x = rect.left() + LABEL_PAD as i32;
    let pen_y = top + LABEL_PAD as i32;
    for ch in text.chars() {
        draw_glyph(image, ch, pen_x, pen_y, ink, scale);
        pen_x += ((GLYPH_W + 1) * scale) as i32;
    }
}

fn draw_glyph(image: &mut RgbImage, ch: char, x: i32, y: i32, ink: Rgb<u8>, scale: u32) {
    let Some(rows) = glyph(ch) else {
        return;
    };

    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_W {
            if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + (col * scale + dx) as i32;
                    let py = y + (row as u32 * scale + dy) as i32;
                    let inside = px >= 0
                        && py >= 0
                        && (px as u32) < image.width()
                        && (py as u32) < image.height();
                    if inside {
                        image.put_pixel(px as u32, py as u32, ink);
                    }
                }
            }
        }
    }
}

/// 5x7 bitmaps, most significant of the low five bits is the leftmost column
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ' ' => [0x00; 7],
        _ => return None,
    };
    Some(rows)
}
