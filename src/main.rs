use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use snapdetect::config::DEFAULT_WEIGHTS_PATH;
use snapdetect::detection::PostprocessConfig;
use snapdetect::detection::yolo::DEFAULT_INPUT_SIZE;
use snapdetect::error::PresentError;
use snapdetect::presenter::DEFAULT_JPEG_QUALITY;
use snapdetect::{
    AnnotatedImage, CameraProvider, ClassNames, Config, DownloadArtifact, ImageProvider,
    InferenceAdapter, Interaction, Pipeline, PipelineError, PresentationSurface, SourceImage,
    UploadProvider,
};

#[derive(Parser)]
#[command(name = "snapdetect")]
#[command(about = "Run a pretrained object detector over an uploaded or captured image")]
struct Cli {
    /// Path to the model weights (.rten)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_WEIGHTS_PATH, global = true)]
    weights: PathBuf,

    /// Minimum class score for a detection
    #[arg(long, default_value_t = 0.25, global = true)]
    conf: f32,

    /// IoU above which overlapping boxes of one class are merged
    #[arg(long, default_value_t = 0.45, global = true)]
    iou: f32,

    /// Square model input size in pixels
    #[arg(long, default_value_t = DEFAULT_INPUT_SIZE, global = true)]
    input_size: u32,

    /// Maximum detections kept per image
    #[arg(long, default_value_t = 300, global = true)]
    max_det: usize,

    /// JPEG quality of the download artifact
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, global = true)]
    quality: u8,

    /// Comma-separated class names, indexed by class id
    #[arg(long, value_name = "NAMES", global = true)]
    class_names: Option<String>,

    /// Directory for the download artifact (defaults to the system temp dir)
    #[arg(long, value_name = "DIR", global = true)]
    out: Option<PathBuf>,

    /// Save stage images to directory (must be empty)
    #[arg(long, value_name = "DIR", global = true)]
    debug_out: Option<PathBuf>,

    /// Print a JSON report per interaction
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect objects in an image file (jpg, jpeg, png)
    Upload {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,
    },
    /// Detect objects in a camera snapshot read from a file or stdin
    Camera {
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
    },
    /// Read image paths from stdin, one interaction per line, reusing the model
    Session,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            weights_path: self.weights.clone(),
            input_size: self.input_size,
            postprocess: PostprocessConfig {
                conf_threshold: self.conf,
                iou_threshold: self.iou,
                max_detections: self.max_det,
            },
            jpeg_quality: self.quality,
            class_names: self
                .class_names
                .as_deref()
                .map(ClassNames::parse)
                .unwrap_or_default(),
        }
    }
}

/// Prints to the terminal and writes downloads into `out_dir`
struct TerminalSurface {
    out_dir: PathBuf,
    class_names: ClassNames,
    quiet: bool,
}

impl PresentationSurface for TerminalSurface {
    fn prompt(&mut self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    fn show_input(&mut self, image: &SourceImage) {
        if !self.quiet {
            println!(
                "Input image ({}): {}x{}",
                image.method,
                image.width(),
                image.height()
            );
        }
    }

    fn show_result(&mut self, image: &AnnotatedImage) {
        if self.quiet {
            return;
        }
        println!("\n=== Detection Result ===");
        println!("Total detections: {}", image.detections.len());
        for detection in &image.detections {
            let bbox = &detection.bbox;
            println!(
                "  {} at ({:.0}, {:.0}) {:.0}x{:.0} - confidence: {:.2}",
                self.class_names.label(detection.class_id),
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height,
                detection.confidence
            );
        }
    }

    fn offer_download(&mut self, artifact: &DownloadArtifact) -> Result<(), PresentError> {
        let path = artifact.write_transient(&self.out_dir)?;
        if !self.quiet {
            println!(
                "\nDownload: {} ({}, {} bytes, save as {})",
                path.display(),
                artifact.mime,
                artifact.len(),
                artifact.file_name
            );
        }
        Ok(())
    }

    fn report_error(&mut self, error: &PipelineError) {
        eprintln!("Error: {}", error);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn emit_report(
    cli: &Cli,
    interaction: &Interaction,
    class_names: &ClassNames,
) -> anyhow::Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string(&interaction.report(class_names))?);
    }
    Ok(())
}

/// Failed interactions have already been reported through the surface, so
/// they only turn into the exit status here
fn status(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config();
    config.validate()?;

    let adapter = InferenceAdapter::new(config.loader(), config.weights_path.clone());
    let mut pipeline = Pipeline::new(&adapter)
        .with_presenter(config.presenter())
        .with_class_names(config.class_names.clone());
    if let Some(debug_dir) = cli.debug_out.clone() {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let mut surface = TerminalSurface {
        out_dir: cli.out.clone().unwrap_or_else(std::env::temp_dir),
        class_names: config.class_names.clone(),
        quiet: cli.json,
    };

    let run_one = |provider: &dyn ImageProvider, surface: &mut TerminalSurface| {
        let interaction = pipeline.run(provider, surface);
        emit_report(&cli, &interaction, &config.class_names)?;
        anyhow::Ok(interaction)
    };

    let code = match &cli.command {
        Command::Upload { image_path } => {
            let provider = UploadProvider::from_path(image_path)?;
            let interaction = run_one(&provider, &mut surface)?;
            status(interaction.error.is_some())
        }
        Command::Camera { snapshot } => {
            let provider = match snapshot {
                Some(path) => CameraProvider::new(
                    std::fs::read(path)
                        .with_context(|| format!("Failed to read snapshot {}", path.display()))?,
                ),
                None => CameraProvider::from_reader(std::io::stdin().lock())?,
            };
            let interaction = run_one(&provider, &mut surface)?;
            status(interaction.error.is_some())
        }
        Command::Session => {
            let mut failures = 0usize;
            for line in std::io::stdin().lock().lines() {
                let line = line?;
                let path = line.trim();
                let provider = if path.is_empty() {
                    UploadProvider::empty()
                } else {
                    match UploadProvider::from_path(Path::new(path)) {
                        Ok(provider) => provider,
                        Err(e) => {
                            surface.report_error(&PipelineError::from(e));
                            failures += 1;
                            continue;
                        }
                    }
                };
                if run_one(&provider, &mut surface)?.error.is_some() {
                    failures += 1;
                }
            }
            if failures > 0 {
                tracing::warn!(failures, "Session finished with failed interactions");
            }
            status(failures > 0)
        }
    };

    Ok(code)
}
