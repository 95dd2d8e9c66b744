use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineState;

/// Failures while turning user-supplied bytes into a `SourceImage`
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported image format: {0} (accepted: jpg, jpeg, png)")]
    UnsupportedFormat(String),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Failures inside the inference stage.
///
/// Cloneable so a failed model load can be replayed to every later caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Failed to load model weights from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Inference failed: {0}")]
    Inference(String),
}

#[derive(Error, Debug)]
pub enum PresentError {
    #[error("Failed to encode result image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Failed to write download artifact: {0}")]
    Write(#[from] std::io::Error),
}

// Main pipeline error type

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Present(#[from] PresentError),
    #[error("Invalid pipeline transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
    #[error("Debug output error: {0}")]
    Debug(String),
}
