//! End-to-end tests for single interactions through the pipeline.
//!
//! Tests cover:
//! - Upload of a JPEG with one object is annotated and offered for download
//! - No input leaves the pipeline in `NoImage` without touching the model
//! - Corrupt input halts before inference
//! - A missing weights file fails only the inference stage
//! - Download failures happen after the result was shown

mod common;

use image::ImageFormat;
use snapdetect::detection::annotate::class_color;
use snapdetect::pipeline::NO_IMAGE_PROMPT;
use snapdetect::{ClassNames, PipelineError, Presenter};

use common::*;

#[test]
fn upload_jpeg_is_annotated_and_downloadable() -> anyhow::Result<()> {
    let weights = create_weights_file();
    let adapter = InferenceAdapter::new(CountingLoader::new(), weights.path());
    let pipeline = Pipeline::new(&adapter);
    let mut surface = RecordingSurface::default();

    let bytes = encode_test_image(ImageFormat::Jpeg, 640, 480);
    let provider = UploadProvider::new("corroded.jpg", bytes);
    let interaction = pipeline.run(&provider, &mut surface);

    assert_eq!(interaction.state, PipelineState::Presented);
    assert!(interaction.error.is_none());

    let annotated = interaction.annotated.as_ref().expect("annotated image");
    assert_eq!(annotated.dimensions(), (640, 480));
    assert!(!annotated.detections.is_empty());

    // The left edge of the first box is burned into the pixels
    let bbox = annotated.detections[0].bbox;
    let edge = annotated
        .image
        .get_pixel(bbox.x.round() as u32, (bbox.y + bbox.height / 2.0) as u32);
    assert_eq!(edge, &class_color(0));

    let artifact = interaction.artifact.as_ref().expect("download artifact");
    assert_eq!(artifact.mime, "image/jpeg");
    assert_eq!(artifact.file_name, "detected.jpg");
    let decoded = image::load_from_memory(&artifact.bytes)?;
    assert_eq!((decoded.width(), decoded.height()), (640, 480));

    assert_eq!(
        surface.events,
        vec![
            SurfaceEvent::ShowInput(640, 480),
            SurfaceEvent::ShowResult(640, 480),
            SurfaceEvent::OfferDownload("detected.jpg".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn camera_snapshot_runs_the_same_pipeline() {
    let weights = create_weights_file();
    let adapter = InferenceAdapter::new(CountingLoader::new(), weights.path());
    let pipeline = Pipeline::new(&adapter).with_presenter(Presenter::new(60));
    let mut surface = RecordingSurface::default();

    let provider = CameraProvider::new(encode_test_image(ImageFormat::Png, 480, 360));
    let interaction = pipeline.run(&provider, &mut surface);

    assert!(interaction.is_presented());
    assert_eq!(adapter.invocations(), 1);
}

#[test]
fn no_image_never_reaches_inference_or_presenter() {
    let weights = create_weights_file();
    let loader = CountingLoader::new();
    let adapter = InferenceAdapter::new(loader.clone(), weights.path());
    let pipeline = Pipeline::new(&adapter);
    let mut surface = RecordingSurface::default();

    let interaction = pipeline.run(&UploadProvider::empty(), &mut surface);

    assert_eq!(interaction.state, PipelineState::NoImage);
    assert!(interaction.annotated.is_none());
    assert!(interaction.artifact.is_none());
    assert!(interaction.error.is_none());
    assert_eq!(adapter.invocations(), 0);
    assert_eq!(loader.weight_reads(), 0);
    assert_eq!(
        surface.events,
        vec![SurfaceEvent::Prompt(NO_IMAGE_PROMPT.to_string())]
    );
}

#[test]
fn corrupt_jpeg_halts_before_inference() {
    let weights = create_weights_file();
    let loader = CountingLoader::new();
    let adapter = InferenceAdapter::new(loader.clone(), weights.path());
    let pipeline = Pipeline::new(&adapter);
    let mut surface = RecordingSurface::default();

    let provider = UploadProvider::new("photo.jpg", truncated_jpeg());
    let interaction = pipeline.run(&provider, &mut surface);

    assert_eq!(interaction.state, PipelineState::Failed(Stage::Acquire));
    assert!(matches!(
        interaction.error,
        Some(PipelineError::Acquire(snapdetect::AcquireError::Decode(_)))
    ));
    assert_eq!(adapter.invocations(), 0);
    assert_eq!(loader.weight_reads(), 0);
    assert_eq!(surface.count(|e| matches!(e, SurfaceEvent::ReportError(_))), 1);
    assert_eq!(surface.count(|e| matches!(e, SurfaceEvent::ShowInput(..))), 0);
}

#[test]
fn missing_weights_fail_only_the_inference_stage() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let adapter = InferenceAdapter::new(CountingLoader::new(), dir.path().join("absent.rten"));
    let pipeline = Pipeline::new(&adapter);
    let mut surface = RecordingSurface::default();

    let bytes = encode_test_image(ImageFormat::Jpeg, 640, 480);
    let interaction = pipeline.run(&UploadProvider::new("a.jpg", bytes.clone()), &mut surface);

    assert_eq!(interaction.state, PipelineState::Failed(Stage::Infer));
    assert!(matches!(
        interaction.error,
        Some(PipelineError::Inference(InferenceError::ModelLoad { .. }))
    ));
    // The source stage ran normally
    assert_eq!(surface.events[0], SurfaceEvent::ShowInput(640, 480));
    assert_eq!(surface.count(|e| matches!(e, SurfaceEvent::ShowResult(..))), 0);

    // Image source and presenter still work on their own
    let source = acquire(&UploadProvider::new("a.jpg", bytes))?
        .into_image()
        .expect("image present");
    let annotated = snapdetect::detection::annotate::annotate(&source.image, &[]);
    let artifact = Presenter::default().present(&annotated)?;
    assert_eq!((artifact.width, artifact.height), (640, 480));
    Ok(())
}

#[test]
fn repeated_interactions_reuse_the_model() {
    let weights = create_weights_file();
    let loader = CountingLoader::new();
    let adapter = InferenceAdapter::new(loader.clone(), weights.path());
    let pipeline = Pipeline::new(&adapter);
    let mut surface = RecordingSurface::default();

    for _ in 0..3 {
        let provider = UploadProvider::new("x.png", encode_test_image(ImageFormat::Png, 400, 300));
        assert!(pipeline.run(&provider, &mut surface).is_presented());
    }
    pipeline.run(&UploadProvider::empty(), &mut surface);

    assert_eq!(loader.weight_reads(), 1);
    assert_eq!(adapter.invocations(), 3);
}

#[test]
fn download_failure_after_result_is_shown() {
    let weights = create_weights_file();
    let adapter = InferenceAdapter::new(CountingLoader::new(), weights.path());
    let pipeline = Pipeline::new(&adapter);
    let mut surface = RecordingSurface::failing_downloads();

    let provider = UploadProvider::new("x.png", encode_test_image(ImageFormat::Png, 400, 300));
    let interaction = pipeline.run(&provider, &mut surface);

    assert_eq!(interaction.state, PipelineState::Failed(Stage::Present));
    assert!(interaction.annotated.is_some());
    assert!(interaction.artifact.is_none());
    assert_eq!(surface.count(|e| matches!(e, SurfaceEvent::ShowResult(..))), 1);
    assert_eq!(surface.count(|e| matches!(e, SurfaceEvent::ReportError(_))), 1);
}

#[test]
fn debug_mode_saves_stage_images() -> anyhow::Result<()> {
    let weights = create_weights_file();
    let debug_dir = tempfile::TempDir::new()?;
    let adapter = InferenceAdapter::new(CountingLoader::new(), weights.path());
    let pipeline = Pipeline::new(&adapter).with_debug(debug_dir.path().to_path_buf())?;
    let mut surface = RecordingSurface::default();

    for _ in 0..2 {
        let provider = UploadProvider::new("x.png", encode_test_image(ImageFormat::Png, 400, 300));
        assert!(pipeline.run(&provider, &mut surface).is_presented());
    }

    for stage_dir in ["00_input", "01_inference"] {
        for file in ["01.png", "02.png"] {
            let path = debug_dir.path().join(stage_dir).join(file);
            assert!(path.exists(), "missing {}", path.display());
        }
    }
    Ok(())
}

#[test]
fn unwritable_debug_dir_does_not_fail_the_interaction() -> anyhow::Result<()> {
    let weights = create_weights_file();
    let root = tempfile::TempDir::new()?;
    let debug_dir = root.path().join("dumps");
    let adapter = InferenceAdapter::new(CountingLoader::new(), weights.path());
    let pipeline = Pipeline::new(&adapter).with_debug(debug_dir.clone())?;

    // Stage directories can no longer be created under a plain file
    std::fs::remove_dir_all(&debug_dir)?;
    std::fs::write(&debug_dir, b"in the way")?;

    let mut surface = RecordingSurface::default();
    let provider = UploadProvider::new("x.png", encode_test_image(ImageFormat::Png, 400, 300));
    let interaction = pipeline.run(&provider, &mut surface);

    assert_eq!(interaction.state, PipelineState::Presented);
    assert!(interaction.error.is_none());
    assert!(interaction.artifact.is_some());
    assert_eq!(adapter.invocations(), 1);
    assert_eq!(surface.count(|e| matches!(e, SurfaceEvent::ReportError(_))), 0);
    Ok(())
}

#[test]
fn debug_mode_requires_empty_directory() -> anyhow::Result<()> {
    let weights = create_weights_file();
    let debug_dir = tempfile::TempDir::new()?;
    std::fs::write(debug_dir.path().join("leftover.txt"), b"x")?;

    let adapter = InferenceAdapter::new(CountingLoader::new(), weights.path());
    let result = Pipeline::new(&adapter).with_debug(debug_dir.path().to_path_buf());

    let error_msg = result.err().expect("non-empty dir rejected").to_string();
    assert!(
        error_msg.contains("not empty"),
        "Error should mention the directory is not empty, got: {}",
        error_msg
    );
    Ok(())
}

#[test]
fn report_serializes_outcome() -> anyhow::Result<()> {
    let weights = create_weights_file();
    let adapter = InferenceAdapter::new(CountingLoader::new(), weights.path());
    let names = ClassNames::parse("rust");
    let pipeline = Pipeline::new(&adapter).with_class_names(names.clone());
    let mut surface = RecordingSurface::default();

    let provider = UploadProvider::new("x.png", encode_test_image(ImageFormat::Png, 400, 300));
    let interaction = pipeline.run(&provider, &mut surface);
    let report = serde_json::to_value(interaction.report(&names))?;

    assert_eq!(report["state"], "presented");
    assert_eq!(report["detections"][0]["label"], "rust");
    assert_eq!(report["artifact"]["mime"], "image/jpeg");
    assert!(report["error"].is_null());

    let failed = pipeline.run(&UploadProvider::new("x.jpg", truncated_jpeg()), &mut surface);
    let report = serde_json::to_value(failed.report(&names))?;
    assert_eq!(report["state"]["failed"], "acquire");
    assert!(report["error"].is_string());
    Ok(())
}
