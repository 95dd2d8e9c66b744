use std::path::Path;

use image::DynamicImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use tracing::debug;

use crate::detection::postprocess::{self, PostprocessConfig};
use crate::detection::preprocessing::{self, Letterbox};
use crate::detection::{Detector, ModelLoader};
use crate::error::InferenceError;
use crate::models::Detection;

pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// YOLO detector exported to the `.rten` format
pub struct RtenYolo {
    model: Model,
    input_size: u32,
    postprocess: PostprocessConfig,
}

impl Detector for RtenYolo {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, InferenceError> {
        let (canvas, letterbox) = preprocessing::letterbox(image, self.input_size);
        let size = self.input_size as usize;
        let input = NdTensor::from_data([1, 3, size, size], preprocessing::to_chw(&canvas));

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| InferenceError::Inference(format!("unexpected output tensor: {:?}", e)))?;

        detections_from_output(
            output,
            &letterbox,
            (image.width(), image.height()),
            &self.postprocess,
        )
    }
}

/// Decode a `[1, 4 + classes, anchors]` head into detections in source space
fn detections_from_output(
    output: NdTensor<f32, 3>,
    letterbox: &Letterbox,
    image_size: (u32, u32),
    config: &PostprocessConfig,
) -> Result<Vec<Detection>, InferenceError> {
    let [batch, attrs, anchors] = output.shape();
    if batch != 1 {
        return Err(InferenceError::Inference(format!(
            "expected batch size 1, got {}",
            batch
        )));
    }
    debug!(attrs, anchors, "model output");

    postprocess::decode(&output.to_vec(), attrs, anchors, letterbox, image_size, config)
}

/// Loads `RtenYolo` from a weights file
#[derive(Debug, Clone)]
pub struct RtenYoloLoader {
    pub input_size: u32,
    pub postprocess: PostprocessConfig,
}

impl Default for RtenYoloLoader {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            postprocess: PostprocessConfig::default(),
        }
    }
}

impl ModelLoader for RtenYoloLoader {
    type Model = RtenYolo;

    fn load(&self, weights_path: &Path) -> Result<RtenYolo, InferenceError> {
        if !weights_path.exists() {
            return Err(InferenceError::ModelLoad {
                path: weights_path.to_path_buf(),
                reason: "weights file not found".to_string(),
            });
        }

        let model = Model::load_file(weights_path).map_err(|e| InferenceError::ModelLoad {
            path: weights_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(RtenYolo {
            model,
            input_size: self.input_size,
            postprocess: self.postprocess,
        })
    }
}
