use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

/// Padding value used by YOLO-family models
pub const LETTERBOX_FILL: u8 = 114;

/// Transform from source pixels to the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub size: u32,
}

impl Letterbox {
    pub fn new(width: u32, height: u32, size: u32) -> Self {
        let scale = if width == 0 || height == 0 {
            1.0
        } else {
            (size as f32 / width as f32).min(size as f32 / height as f32)
        };
        let (scaled_w, scaled_h) = scaled_dims(width, height, scale);

        Self {
            scale,
            pad_x: ((size - scaled_w.min(size)) / 2) as f32,
            pad_y: ((size - scaled_h.min(size)) / 2) as f32,
            size,
        }
    }

    /// Map a point in model input space back to source image space
    pub fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

fn scaled_dims(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        ((width as f32 * scale).round() as u32).max(1),
        ((height as f32 * scale).round() as u32).max(1),
    )
}

/// Resize `img` into a `size`x`size` canvas keeping its aspect ratio
pub fn letterbox(img: &DynamicImage, size: u32) -> (RgbImage, Letterbox) {
    let rgb = img.to_rgb8();
    let transform = Letterbox::new(rgb.width(), rgb.height(), size);
    let (scaled_w, scaled_h) = scaled_dims(rgb.width(), rgb.height(), transform.scale);

    let (target_w, target_h) = (scaled_w.min(size), scaled_h.min(size));
    let resized = imageops::resize(&rgb, target_w, target_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
    imageops::overlay(
        &mut canvas,
        &resized,
        transform.pad_x as i64,
        transform.pad_y as i64,
    );

    (canvas, transform)
}

/// Planar CHW floats in [0, 1]
pub fn to_chw(img: &RgbImage) -> Vec<f32> {
    let plane = img.width() as usize * img.height() as usize;
    let mut data = vec![0.0f32; plane * 3];

    for (i, pixel) in img.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = pixel[c] as f32 / 255.0;
        }
    }

    data
}
