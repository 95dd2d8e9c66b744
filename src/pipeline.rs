use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::config::ClassNames;
use crate::detection::ModelLoader;
use crate::error::{PipelineError, PresentError};
use crate::inference::InferenceAdapter;
use crate::models::{Acquired, AnnotatedImage, BoundingBox, DownloadArtifact, SourceImage};
use crate::presenter::Presenter;
use crate::source::{self, ImageProvider};

/// Shown when the user has not supplied an image yet
pub const NO_IMAGE_PROMPT: &str = "Please provide an image using Upload or Camera.";

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Acquire,
    Infer,
    Present,
}

/// Lifecycle of one interaction.
///
/// `NoImage -> Inferring -> Presented`, with `Failed` reachable from either
/// non-terminal state. There is no way back to `NoImage`; a new interaction
/// is needed instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    NoImage,
    Inferring,
    Presented,
    Failed(Stage),
}

impl PipelineState {
    pub fn advance(self, next: PipelineState) -> Result<PipelineState, PipelineError> {
        use PipelineState::*;

        match (self, next) {
            (NoImage, Inferring)
            | (NoImage, Failed(Stage::Acquire))
            | (Inferring, Presented)
            | (Inferring, Failed(Stage::Infer))
            | (Inferring, Failed(Stage::Present)) => Ok(next),
            _ => Err(PipelineError::InvalidTransition {
                from: self,
                to: next,
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Presented | PipelineState::Failed(_))
    }
}

/// Display seam. Rendering is the host's business; the pipeline only says
/// what to show and when.
pub trait PresentationSurface {
    fn prompt(&mut self, message: &str);

    fn show_input(&mut self, image: &SourceImage);

    fn show_result(&mut self, image: &AnnotatedImage);

    /// Hand the artifact to the user. Persisting it may fail.
    fn offer_download(&mut self, artifact: &DownloadArtifact) -> Result<(), PresentError>;

    fn report_error(&mut self, error: &PipelineError);
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to every stage
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
    pub class_names: ClassNames,
}

/// Everything one interaction produced
#[derive(Debug)]
pub struct Interaction {
    pub id: Uuid,
    pub state: PipelineState,
    pub annotated: Option<AnnotatedImage>,
    pub artifact: Option<DownloadArtifact>,
    pub error: Option<PipelineError>,
}

impl Interaction {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: PipelineState::NoImage,
            annotated: None,
            artifact: None,
            error: None,
        }
    }

    fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        self.state = self.state.advance(next)?;
        Ok(())
    }

    pub fn is_presented(&self) -> bool {
        self.state == PipelineState::Presented
    }

    /// Serializable summary for machine-readable output
    pub fn report(&self, class_names: &ClassNames) -> InteractionReport {
        let detections = self
            .annotated
            .as_ref()
            .map(|annotated| {
                annotated
                    .detections
                    .iter()
                    .map(|d| DetectionReport {
                        label: class_names.label(d.class_id),
                        class_id: d.class_id,
                        confidence: d.confidence,
                        bbox: d.bbox,
                    })
                    .collect()
            })
            .unwrap_or_default();

        InteractionReport {
            id: self.id.to_string(),
            state: self.state,
            detections,
            artifact: self.artifact.as_ref().map(|a| ArtifactReport {
                file_name: a.file_name.clone(),
                mime: a.mime,
                bytes: a.len(),
                width: a.width,
                height: a.height,
            }),
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InteractionReport {
    pub id: String,
    pub state: PipelineState,
    pub detections: Vec<DetectionReport>,
    pub artifact: Option<ArtifactReport>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectionReport {
    pub label: String,
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

#[derive(Debug, Serialize)]
pub struct ArtifactReport {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: usize,
    pub width: u32,
    pub height: u32,
}

/// Image Source -> Inference Adapter -> Result Presenter, once per interaction
pub struct Pipeline<'a, L: ModelLoader> {
    adapter: &'a InferenceAdapter<L>,
    presenter: Presenter,
    context: PipelineContext,
}

impl<'a, L: ModelLoader> Pipeline<'a, L> {
    pub fn new(adapter: &'a InferenceAdapter<L>) -> Self {
        Self {
            adapter,
            presenter: Presenter::default(),
            context: PipelineContext::default(),
        }
    }

    pub fn with_presenter(mut self, presenter: Presenter) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn with_class_names(mut self, class_names: ClassNames) -> Self {
        self.context.class_names = class_names;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });

        Ok(self)
    }

    /// Handle one user interaction end to end.
    ///
    /// Never panics on user or model errors; the outcome is in the returned
    /// `Interaction`, and failures have already been reported to `surface`.
    pub fn run(
        &self,
        provider: &dyn ImageProvider,
        surface: &mut dyn PresentationSurface,
    ) -> Interaction {
        let mut interaction = Interaction::new();
        let span = info_span!("interaction", id = %interaction.id, method = %provider.method());
        let _enter = span.enter();

        if let Err((stage, err)) = self.drive(&mut interaction, provider, surface) {
            error!(?stage, error = %err, "Interaction failed");
            surface.report_error(&err);
            // A rejected transition means the state machine itself is wrong;
            // keep whichever error explains it
            let err = match interaction.advance(PipelineState::Failed(stage)) {
                Ok(()) => err,
                Err(transition) => transition,
            };
            interaction.error = Some(err);
        }

        interaction
    }

    fn drive(
        &self,
        interaction: &mut Interaction,
        provider: &dyn ImageProvider,
        surface: &mut dyn PresentationSurface,
    ) -> Result<(), (Stage, PipelineError)> {
        let at = |stage: Stage| move |e: PipelineError| (stage, e);

        let acquired =
            source::acquire(provider).map_err(|e| (Stage::Acquire, PipelineError::from(e)))?;
        let source = match acquired {
            Acquired::Image(image) => image,
            Acquired::Absent => {
                info!("No image supplied");
                surface.prompt(NO_IMAGE_PROMPT);
                return Ok(());
            }
        };

        interaction
            .advance(PipelineState::Inferring)
            .map_err(at(Stage::Acquire))?;
        info!(width = source.width(), height = source.height(), "Running inference");
        surface.show_input(&source);
        self.save_debug_output(0, "input", |path| source.image.save(path));

        let annotated = self
            .adapter
            .infer(&source)
            .map_err(|e| (Stage::Infer, PipelineError::from(e)))?;
        for detection in &annotated.detections {
            info!(
                label = %self.context.class_names.label(detection.class_id),
                confidence = detection.confidence,
                "Detected object"
            );
        }
        surface.show_result(&annotated);
        self.save_debug_output(1, "inference", |path| annotated.image.save(path));

        let presented = self.presenter.present(&annotated);
        let detections = annotated.detections.len();
        interaction.annotated = Some(annotated);
        let artifact = presented.map_err(|e| (Stage::Present, PipelineError::from(e)))?;
        surface
            .offer_download(&artifact)
            .map_err(|e| (Stage::Present, PipelineError::from(e)))?;
        interaction.artifact = Some(artifact);

        interaction
            .advance(PipelineState::Presented)
            .map_err(at(Stage::Present))?;
        info!(detections, "Interaction presented");

        Ok(())
    }

    /// Save a stage image under `<debug_dir>/<NN>_<name>/` if debug mode is on.
    ///
    /// Debug output never decides the outcome of an interaction; failures are
    /// logged and the run carries on.
    fn save_debug_output<F>(&self, index: usize, name: &str, save: F)
    where
        F: FnOnce(&std::path::Path) -> image::ImageResult<()>,
    {
        let Some(debug_config) = &self.context.debug else {
            return;
        };
        if let Err(e) = Self::write_debug_image(debug_config, index, name, save) {
            warn!(stage = name, error = %e, "Skipping debug output");
        }
    }

    fn write_debug_image<F>(
        debug_config: &DebugConfig,
        index: usize,
        name: &str,
        save: F,
    ) -> Result<(), PipelineError>
    where
        F: FnOnce(&std::path::Path) -> image::ImageResult<()>,
    {
        let step_dir_name = format!("{:02}_{}", index, name);
        let step_dir = debug_config.output_dir.join(&step_dir_name);
        std::fs::create_dir_all(&step_dir).map_err(|e| PipelineError::Debug(e.to_string()))?;

        // One image per interaction, numbered after what is already there
        let existing = std::fs::read_dir(&step_dir)
            .map_err(|e| PipelineError::Debug(e.to_string()))?
            .count();
        let filename = format!("{:02}.png", existing + 1);
        save(&step_dir.join(&filename))
            .map_err(|e| PipelineError::Debug(format!("Failed to save debug image: {}", e)))?;

        tracing::debug!("Debug: saved {}/{}", step_dir_name, filename);
        Ok(())
    }
}
