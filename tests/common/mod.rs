#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from snapdetect for tests
pub use snapdetect::{
    Acquired, CameraProvider, InferenceAdapter, InferenceError, Pipeline, PipelineState, Stage,
    UploadProvider, acquire,
};
