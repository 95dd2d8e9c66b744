//! Image acquisition from one of two interchangeable providers.

use std::io::Read;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tracing::debug;

use crate::error::AcquireError;
use crate::models::{Acquired, InputMethod, SourceImage};

/// File extensions the upload provider accepts
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Anything that can hand the pipeline the raw bytes of one still image
pub trait ImageProvider {
    fn method(&self) -> InputMethod;

    /// Raw encoded bytes, or `None` if the user has not supplied anything yet
    fn bytes(&self) -> Option<&[u8]>;

    /// Original file name, if the provider has one
    fn file_name(&self) -> Option<&str> {
        None
    }
}

/// A user-selected file
#[derive(Debug, Clone, Default)]
pub struct UploadProvider {
    pub file_name: String,
    pub bytes: Option<Vec<u8>>,
}

impl UploadProvider {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: Some(bytes),
        }
    }

    /// Nothing selected yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read the file at `path` into an upload
    pub fn from_path(path: &Path) -> Result<Self, AcquireError> {
        let bytes = std::fs::read(path).map_err(|source| AcquireError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, bytes))
    }
}

impl ImageProvider for UploadProvider {
    fn method(&self) -> InputMethod {
        InputMethod::Upload
    }

    fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    fn file_name(&self) -> Option<&str> {
        Some(&self.file_name)
    }
}

/// A snapshot from a capture device
#[derive(Debug, Clone, Default)]
pub struct CameraProvider {
    pub snapshot: Option<Vec<u8>>,
}

impl CameraProvider {
    pub fn new(snapshot: Vec<u8>) -> Self {
        Self {
            snapshot: Some(snapshot),
        }
    }

    /// No picture taken yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a whole snapshot from a stream (e.g. stdin)
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, AcquireError> {
        let mut snapshot = Vec::new();
        reader
            .read_to_end(&mut snapshot)
            .map_err(|source| AcquireError::Io {
                path: PathBuf::from("<snapshot stream>"),
                source,
            })?;
        Ok(Self::new(snapshot))
    }
}

impl ImageProvider for CameraProvider {
    fn method(&self) -> InputMethod {
        InputMethod::Camera
    }

    fn bytes(&self) -> Option<&[u8]> {
        self.snapshot.as_deref()
    }
}

fn has_accepted_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}

/// Obtain one decoded image from `provider`, or `Absent` if it has none yet
pub fn acquire(provider: &dyn ImageProvider) -> Result<Acquired, AcquireError> {
    let bytes = match provider.bytes() {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Ok(Acquired::Absent),
    };

    if provider.method() == InputMethod::Upload {
        let name = provider.file_name().unwrap_or_default();
        if !has_accepted_extension(name) {
            return Err(AcquireError::UnsupportedFormat(name.to_string()));
        }
    }

    let format = image::guess_format(bytes)?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(AcquireError::UnsupportedFormat(format!("{:?}", format)));
    }

    let image = image::load_from_memory_with_format(bytes, format)?;

    debug!(
        method = %provider.method(),
        ?format,
        width = image.width(),
        height = image.height(),
        "decoded source image"
    );

    Ok(Acquired::Image(SourceImage {
        image,
        method: provider.method(),
        format,
    }))
}
