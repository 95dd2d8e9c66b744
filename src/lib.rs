pub mod config;
pub mod detection;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod presenter;
pub mod source;

pub use config::{ClassNames, Config};
pub use detection::{Detector, ModelLoader};
pub use error::{AcquireError, InferenceError, PipelineError, PresentError};
pub use inference::InferenceAdapter;
pub use models::{
    Acquired, AnnotatedImage, BoundingBox, Detection, DownloadArtifact, InputMethod, SourceImage,
};
pub use pipeline::{Interaction, Pipeline, PipelineState, PresentationSurface, Stage};
pub use presenter::Presenter;
pub use source::{CameraProvider, ImageProvider, UploadProvider, acquire};
