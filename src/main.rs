#![warn(unused_extern_crates)]
use anyhow::{Error, Result};
use clap::{Args, Parser, Subcommand};
use facepaint::compositor::Compositor;
use facepaint::config::EngineConfig;
use facepaint::extract::load_reference;
use facepaint::landmarks::{FixedLandmarks, LandmarkOracle};
use facepaint::mask::MaskBuilder;
use facepaint::params::{ParameterStore, load_parameters, save_parameters};
use facepaint::regions::MakeupKind;
use num_cpus::get as get_cpu_count;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Level, debug, info, span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(feature = "camera")]
mod video;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CmdArgs {
    /// Engine tuning file (JSON). Built-in defaults if unset
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Max threads for the landmark model
    #[arg(short, long, global = true)]
    max_threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct LandmarkArgs {
    /// Precomputed landmarks (JSON), used for every image
    #[arg(long, value_name = "FILE")]
    landmarks: Option<PathBuf>,

    /// Face-mesh ONNX model. Needs the `onnx` feature
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract makeup colors from a reference image into a parameter file
    Extract(ExtractArgs),
    /// Apply makeup to a single image
    Apply(ApplyArgs),
    /// Apply makeup to the webcam feed. Needs the `camera` feature
    Live(LiveArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Reference image to take colors from
    #[arg(short, long, value_name = "IMG")]
    reference: PathBuf,

    /// Makeup types to extract. All of them if unset
    #[arg(short, long, num_args = 1..)]
    types: Vec<String>,

    /// Existing parameters to merge into
    #[arg(short, long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Overwrite colors picked by hand
    #[arg(long)]
    reload: bool,

    /// Where to write the merged parameters
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    #[command(flatten)]
    landmarks: LandmarkArgs,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    #[arg(short, long, value_name = "IMG")]
    input: PathBuf,

    #[arg(short, long, value_name = "IMG")]
    output: PathBuf,

    /// Makeup parameters. Configured defaults if unset
    #[arg(short, long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Tint each makeup region instead of compositing
    #[arg(long)]
    trace: bool,

    #[command(flatten)]
    landmarks: LandmarkArgs,
}

#[derive(Args, Debug)]
struct LiveArgs {
    /// Makeup parameters. Configured defaults if unset
    #[arg(short, long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Target frame rate
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Camera index. The last camera found if unset
    #[arg(long)]
    camera: Option<u32>,

    /// Loopback device to write to. Displays in window if unset
    #[arg(short, long)]
    device: Option<String>,

    /// Stop after showing this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    #[command(flatten)]
    landmarks: LandmarkArgs,
}

fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let args = CmdArgs::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    debug!("{config:?}");

    let total_threads = get_cpu_count();
    let threads = args
        .max_threads
        .unwrap_or(total_threads)
        .clamp(1, total_threads.max(1));

    match args.command {
        Command::Extract(extract_args) => extract(&config, extract_args, threads),
        Command::Apply(apply_args) => apply(&config, apply_args, threads),
        Command::Live(live_args) => live(&config, live_args, threads),
    }
}

fn extract(config: &EngineConfig, args: ExtractArgs, threads: usize) -> Result<()> {
    let store = ParameterStore::new();
    if let Some(path) = &args.params {
        store.load_saved(&load_parameters(path)?);
    }

    let types = if args.types.is_empty() {
        MakeupKind::ALL
            .iter()
            .map(|k| k.name().to_string())
            .collect()
    } else {
        args.types
    };

    let mut oracle = landmark_oracle(config, &args.landmarks, threads)?;
    let colors = load_reference(
        &args.reference,
        oracle.as_mut(),
        &types,
        &MaskBuilder::new(config.mask),
        &store,
        args.reload,
    )?;
    for (kind, color) in &colors {
        info!("{kind}: {color:?}");
    }

    save_parameters(&args.output, &store.saved())?;
    info!("Parameters at {:?}", args.output);
    Ok(())
}

fn apply(config: &EngineConfig, args: ApplyArgs, threads: usize) -> Result<()> {
    let store = parameter_store(args.params.as_deref())?;
    let mut oracle = landmark_oracle(config, &args.landmarks, threads)?;
    let compositor = Compositor::new(config);

    let mut img = image::open(&args.input)?.into_rgb8();
    let start = Instant::now();

    let faces = oracle.detect(&img)?;
    if faces.is_empty() {
        warn!("No face found in {:?}, writing it unchanged", args.input);
    }

    let span = span!(Level::DEBUG, "process_image");
    let guard = span.enter();
    if args.trace {
        for face in &faces {
            compositor.visualize_regions(&mut img, face);
        }
    } else {
        let params = store.snapshot();
        for report in compositor.apply_to_faces(&mut img, &faces, &params) {
            debug!("Applied {:?}, skipped {}", report.applied, report.skipped.len());
        }
    }
    drop(guard);
    debug!("Took {:?}", start.elapsed());

    img.save(&args.output)?;
    info!("Result at {:?}", args.output);
    Ok(())
}

#[cfg(feature = "camera")]
fn live(config: &EngineConfig, args: LiveArgs, threads: usize) -> Result<()> {
    use facepaint::pipeline::{FramePipeline, FrameSource, PipelineState, SourceFactory};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::{error, trace};
    use video::{CameraSource, OutputVideoStream};

    let store = Arc::new(parameter_store(args.params.as_deref())?);
    let oracle = landmark_oracle(config, &args.landmarks, threads)?;
    let compositor = Arc::new(Compositor::new(config));

    let (index, fps) = (args.camera, args.fps);
    let open_source: SourceFactory = Box::new(move || {
        let source: Box<dyn FrameSource> = Box::new(CameraSource::open(index, fps)?);
        Ok(source)
    });

    let (pipeline, frames) =
        FramePipeline::new(open_source, oracle, store, compositor, config.queue_capacity);
    pipeline.start()?;

    let mut output: Option<OutputVideoStream> = None;
    let mut shown = 0u64;
    loop {
        if args.max_frames.is_some_and(|max| shown >= max) {
            break;
        }

        let Some(frame) = frames.pop_timeout(Duration::from_millis(500)) else {
            if pipeline.state() == PipelineState::Idle {
                warn!("Capture ended");
                break;
            }
            continue;
        };

        let span = span!(Level::DEBUG, "write_frame");
        let _guard = span.enter();
        if output.is_none() {
            let (width, height) = frame.image.dimensions();
            output = Some(OutputVideoStream::new(width, height, args.device.clone())?);
        }
        if let Some(out) = output.as_mut() {
            match out.write_frame(&frame.image) {
                Ok(_) => trace!("Rendered frame {}", frame.seq),
                Err(e) => {
                    error!("Failed to render frame: {e:?}");
                    break;
                }
            }
        }
        shown += 1;
    }

    pipeline.stop();
    info!("Shown {shown} frames, dropped {}", pipeline.dropped());
    Ok(())
}

#[cfg(not(feature = "camera"))]
fn live(_config: &EngineConfig, _args: LiveArgs, _threads: usize) -> Result<()> {
    Err(Error::msg("Live capture needs the `camera` feature"))
}

fn parameter_store(params: Option<&Path>) -> Result<ParameterStore> {
    match params {
        Some(path) => {
            let store = ParameterStore::new();
            store.load_saved(&load_parameters(path)?);
            Ok(store)
        }
        None => Ok(ParameterStore::with_defaults()),
    }
}

fn landmark_oracle(
    config: &EngineConfig,
    args: &LandmarkArgs,
    threads: usize,
) -> Result<Box<dyn LandmarkOracle>> {
    if let Some(path) = &args.landmarks {
        return Ok(Box::new(FixedLandmarks::load(path)?));
    }

    match &args.model {
        Some(path) => mesh_oracle(path, threads, config.min_presence),
        None => Err(Error::msg("Either --landmarks or --model is required")),
    }
}

#[cfg(feature = "onnx")]
fn mesh_oracle(
    model: &Path,
    threads: usize,
    min_presence: f32,
) -> Result<Box<dyn LandmarkOracle>> {
    let landmarker =
        facepaint::landmarks::MeshLandmarker::new(model, threads)?.with_min_presence(min_presence);
    Ok(Box::new(landmarker))
}

#[cfg(not(feature = "onnx"))]
fn mesh_oracle(
    _model: &Path,
    _threads: usize,
    _min_presence: f32,
) -> Result<Box<dyn LandmarkOracle>> {
    Err(Error::msg("--model needs the `onnx` feature"))
}
