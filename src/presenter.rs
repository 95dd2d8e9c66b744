//! Turns an annotated image into a downloadable JPEG artifact.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::ImageError;
use image::codecs::jpeg::JpegEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use tracing::debug;

use crate::error::PresentError;
use crate::models::{AnnotatedImage, DOWNLOAD_FILE_NAME, DOWNLOAD_MIME, DownloadArtifact};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone)]
pub struct Presenter {
    quality: u8,
    file_name: String,
}

impl Presenter {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            file_name: DOWNLOAD_FILE_NAME.to_string(),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode `annotated` as JPEG
    pub fn present(&self, annotated: &AnnotatedImage) -> Result<DownloadArtifact, PresentError> {
        let (width, height) = annotated.dimensions();
        if width == 0 || height == 0 {
            return Err(PresentError::Encode(ImageError::Parameter(
                ParameterError::from_kind(ParameterErrorKind::DimensionMismatch),
            )));
        }

        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
        encoder.encode_image(&annotated.image)?;

        debug!(width, height, bytes = bytes.len(), "Encoded download artifact");

        Ok(DownloadArtifact {
            bytes,
            file_name: self.file_name.clone(),
            mime: DOWNLOAD_MIME,
            width,
            height,
        })
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl DownloadArtifact {
    /// Write the bytes to a uniquely named file in `dir` and keep it.
    ///
    /// Nothing cleans these files up; callers own the returned path.
    pub fn write_transient(&self, dir: &Path) -> Result<PathBuf, PresentError> {
        let mut file = tempfile::Builder::new()
            .prefix("detected-")
            .suffix(".jpg")
            .tempfile_in(dir)?;
        file.write_all(&self.bytes)?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }
}
