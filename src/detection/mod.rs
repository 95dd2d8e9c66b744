pub mod annotate;
pub mod postprocess;
pub mod preprocessing;
pub mod yolo;

use std::path::Path;

use image::DynamicImage;

use crate::error::InferenceError;
use crate::models::Detection;

pub use postprocess::PostprocessConfig;
pub use yolo::{RtenYolo, RtenYoloLoader};

/// A loaded detection model that can be run over one image
pub trait Detector: Send + Sync {
    /// Run a forward pass and return detections in source image coordinates
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, InferenceError>;
}

/// Builds a `Detector` from a weights file. Loading is assumed to be expensive.
pub trait ModelLoader: Send + Sync {
    type Model: Detector;

    fn load(&self, weights_path: &Path) -> Result<Self::Model, InferenceError>;
}
