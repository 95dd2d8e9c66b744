//! Inference adapter: a lazily loaded detection model behind a single call.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::detection::annotate;
use crate::detection::{Detector, ModelLoader};
use crate::error::InferenceError;
use crate::models::{AnnotatedImage, SourceImage};

/// Wraps a `ModelLoader` and caches the model it produces.
///
/// The first `infer` call loads the weights; every later call reuses the
/// result. Concurrent first callers block on the same load. A failed load is
/// cached too and replayed to every caller until the adapter is rebuilt.
pub struct InferenceAdapter<L: ModelLoader> {
    loader: L,
    weights_path: PathBuf,
    model: OnceLock<Result<L::Model, InferenceError>>,
    loads: AtomicUsize,
    invocations: AtomicUsize,
}

impl<L: ModelLoader> InferenceAdapter<L> {
    pub fn new(loader: L, weights_path: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            weights_path: weights_path.into(),
            model: OnceLock::new(),
            loads: AtomicUsize::new(0),
            invocations: AtomicUsize::new(0),
        }
    }

    /// Number of times the loader has actually been called
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `infer` calls, successful or not
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.model.get(), Some(Ok(_)))
    }

    fn model(&self) -> Result<&L::Model, InferenceError> {
        self.model
            .get_or_init(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                info!(path = %self.weights_path.display(), "Loading detection model");
                let started = Instant::now();

                let result = self.loader.load(&self.weights_path);
                match &result {
                    Ok(_) => info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Detection model loaded"
                    ),
                    Err(e) => error!(error = %e, "Detection model failed to load"),
                }
                result
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Load the model now instead of on the first request
    pub fn warm_up(&self) -> Result<(), InferenceError> {
        self.model().map(|_| ())
    }

    /// Run detection over `source` and return it with the overlays drawn in
    pub fn infer(&self, source: &SourceImage) -> Result<AnnotatedImage, InferenceError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let model = self.model()?;

        let started = Instant::now();
        let detections = model.detect(&source.image)?;
        debug!(
            count = detections.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inference finished"
        );

        Ok(annotate::annotate(&source.image, &detections))
    }
}
