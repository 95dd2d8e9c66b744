use image::{DynamicImage, ImageFormat, RgbImage};
use serde::Serialize;

/// How the user supplied the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    Upload,
    Camera,
}

impl std::fmt::Display for InputMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputMethod::Upload => write!(f, "upload"),
            InputMethod::Camera => write!(f, "camera"),
        }
    }
}

/// Decoded image supplied by the user, before inference
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: DynamicImage,
    pub method: InputMethod,
    pub format: ImageFormat,
}

impl SourceImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

/// Result of asking an image provider for input.
///
/// `Absent` means the user has not acted yet; it is not an error.
#[derive(Debug, Clone)]
pub enum Acquired {
    Image(SourceImage),
    Absent,
}

impl Acquired {
    pub fn is_absent(&self) -> bool {
        matches!(self, Acquired::Absent)
    }

    pub fn into_image(self) -> Option<SourceImage> {
        match self {
            Acquired::Image(image) => Some(image),
            Acquired::Absent => None,
        }
    }
}

/// Axis-aligned box in source image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0.0),
            height: (y2 - y1).max(0.0),
        }
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.max_x().min(other.max_x()) - self.x.max(other.x)).max(0.0);
        let iy = (self.max_y().min(other.max_y()) - self.y.max(other.y)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            return 0.0;
        }

        intersection / union
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Source pixels with detection overlays burned in
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    pub image: RgbImage,
    pub detections: Vec<Detection>,
}

impl AnnotatedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub const DOWNLOAD_FILE_NAME: &str = "detected.jpg";
pub const DOWNLOAD_MIME: &str = "image/jpeg";

/// Encoded result offered to the user for download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadArtifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

impl DownloadArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoundingBox::from_corners(10.0, 10.0, 50.0, 50.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::from_corners(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::from_corners(5.0, 0.0, 15.0, 10.0);
        // 50 / 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_boxes_have_zero_iou() {
        let a = BoundingBox::from_corners(5.0, 5.0, 5.0, 5.0);
        assert_eq!(a.iou(&a), 0.0);
    }
}
