use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::detection::{PostprocessConfig, RtenYoloLoader};
use crate::detection::yolo::DEFAULT_INPUT_SIZE;
use crate::presenter::{DEFAULT_JPEG_QUALITY, Presenter};

/// Weights file read on the first inference request
pub const DEFAULT_WEIGHTS_PATH: &str = "rust-corrosion.rten";

/// Largest accepted model input side
pub const MAX_INPUT_SIZE: u32 = 4096;

/// Optional human-readable names for model class ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    /// Parse a comma-separated list, ignoring blank entries
    pub fn parse(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Configured name, or `class <id>` when there is none
    pub fn label(&self, class_id: usize) -> String {
        self.0
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class_id))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub weights_path: PathBuf,
    pub input_size: u32,
    pub postprocess: PostprocessConfig,
    pub jpeg_quality: u8,
    pub class_names: ClassNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from(DEFAULT_WEIGHTS_PATH),
            input_size: DEFAULT_INPUT_SIZE,
            postprocess: PostprocessConfig::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            class_names: ClassNames::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.input_size % 32 != 0 {
            bail!("Input size must be a positive multiple of 32, got {}", self.input_size);
        }
        if self.input_size > MAX_INPUT_SIZE {
            bail!(
                "Input size must be at most {}, got {}",
                MAX_INPUT_SIZE,
                self.input_size
            );
        }
        let PostprocessConfig {
            conf_threshold,
            iou_threshold,
            max_detections,
        } = self.postprocess;
        if !(0.0..=1.0).contains(&conf_threshold) {
            bail!("Confidence threshold must be within 0..=1, got {}", conf_threshold);
        }
        if !(0.0..=1.0).contains(&iou_threshold) {
            bail!("IoU threshold must be within 0..=1, got {}", iou_threshold);
        }
        if max_detections == 0 {
            bail!("Max detections must be at least 1");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("JPEG quality must be within 1..=100, got {}", self.jpeg_quality);
        }
        Ok(())
    }

    pub fn loader(&self) -> RtenYoloLoader {
        RtenYoloLoader {
            input_size: self.input_size,
            postprocess: self.postprocess,
        }
    }

    pub fn presenter(&self) -> Presenter {
        Presenter::new(self.jpeg_quality)
    }
}
