use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use snapdetect::error::{InferenceError, PipelineError, PresentError};
use snapdetect::models::{AnnotatedImage, BoundingBox, Detection, DownloadArtifact, SourceImage};
use snapdetect::{Detector, ModelLoader, PresentationSurface};
use tempfile::NamedTempFile;

/// Top-left and bottom-right corners of the dark "object" painted into test images
pub const OBJECT: (u32, u32, u32, u32) = (200, 150, 320, 260);

/// Encodes a light gray image with a dark rectangle inside `OBJECT`.
pub fn encode_test_image(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let (x1, y1, x2, y2) = OBJECT;
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        if x >= x1 && x < x2 && y >= y1 && y < y2 {
            Rgb([20u8, 20u8, 20u8])
        } else {
            Rgb([200u8, 200u8, 200u8])
        }
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format)
        .expect("Failed to encode test image");
    bytes
}

/// First half of a JPEG: valid header, missing scan data
pub fn truncated_jpeg() -> Vec<u8> {
    let mut bytes = encode_test_image(ImageFormat::Jpeg, 64, 64);
    bytes.truncate(bytes.len() / 2);
    bytes
}

/// Creates a fake weights file and returns it.
/// The file will be automatically cleaned up when dropped.
pub fn create_weights_file() -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".rten")
        .tempfile()
        .expect("Failed to create temp weights file");
    std::fs::write(file.path(), b"fake weights").expect("Failed to write weights");
    file
}

/// Reports the bounding box of dark pixels as a single class-0 detection.
/// Images narrower than `min_width` fail, standing in for a shape mismatch.
pub struct DarkRegionDetector {
    pub min_width: u32,
}

impl Detector for DarkRegionDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, InferenceError> {
        if image.width() < self.min_width {
            return Err(InferenceError::Inference(format!(
                "input width {} below model minimum {}",
                image.width(),
                self.min_width
            )));
        }

        let gray = image.to_luma8();
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in gray.enumerate_pixels() {
            if pixel[0] >= 64 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }

        Ok(bounds
            .map(|(min_x, min_y, max_x, max_y)| Detection {
                class_id: 0,
                confidence: 0.9,
                bbox: BoundingBox::from_corners(
                    min_x as f32,
                    min_y as f32,
                    (max_x + 1) as f32,
                    (max_y + 1) as f32,
                ),
            })
            .into_iter()
            .collect())
    }
}

/// Reads the weights file on every load and counts how often it did so
#[derive(Clone)]
pub struct CountingLoader {
    pub loads: Arc<AtomicUsize>,
    pub delay: Duration,
    pub min_width: u32,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self {
            loads: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            min_width: 16,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn weight_reads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for CountingLoader {
    type Model = DarkRegionDetector;

    fn load(&self, weights_path: &Path) -> Result<DarkRegionDetector, InferenceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        std::fs::read(weights_path).map_err(|e| InferenceError::ModelLoad {
            path: weights_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(DarkRegionDetector {
            min_width: self.min_width,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Prompt(String),
    ShowInput(u32, u32),
    ShowResult(u32, u32),
    OfferDownload(String),
    ReportError(String),
}

/// Records what the pipeline asked it to show
#[derive(Default)]
pub struct RecordingSurface {
    pub events: Vec<SurfaceEvent>,
    pub fail_download: bool,
}

impl RecordingSurface {
    pub fn failing_downloads() -> Self {
        Self {
            events: Vec::new(),
            fail_download: true,
        }
    }

    pub fn count<F: Fn(&SurfaceEvent) -> bool>(&self, predicate: F) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

impl PresentationSurface for RecordingSurface {
    fn prompt(&mut self, message: &str) {
        self.events.push(SurfaceEvent::Prompt(message.to_string()));
    }

    fn show_input(&mut self, image: &SourceImage) {
        self.events
            .push(SurfaceEvent::ShowInput(image.width(), image.height()));
    }

    fn show_result(&mut self, image: &AnnotatedImage) {
        self.events
            .push(SurfaceEvent::ShowResult(image.width(), image.height()));
    }

    fn offer_download(&mut self, artifact: &DownloadArtifact) -> Result<(), PresentError> {
        if self.fail_download {
            return Err(PresentError::Write(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "download location is read-only",
            )));
        }
        self.events
            .push(SurfaceEvent::OfferDownload(artifact.file_name.clone()));
        Ok(())
    }

    fn report_error(&mut self, error: &PipelineError) {
        self.events.push(SurfaceEvent::ReportError(error.to_string()));
    }
}
