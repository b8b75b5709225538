use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use framereel_core::buffer::domain::buffer_state::BufferConfig;
use framereel_core::buffer::domain::memory_pressure::MemoryPressureSignal;
use framereel_core::buffer::infrastructure::system_memory_monitor::{
    PressureTracker, SystemMemoryMonitor,
};
use framereel_core::pipeline::generate_video_use_case::{
    GenerateVideoRequest, GenerateVideoResponse, GenerateVideoUseCase,
};
use framereel_core::pipeline::images_to_video_use_case::{ImageInput, ImagesToVideoUseCase};
use framereel_core::pipeline::sampling::TimelapseSettings;
use framereel_core::pipeline::session_logger::{SessionLogger, StdoutSessionLogger};
use framereel_core::pipeline::timelapse_use_case::TimelapseUseCase;
use framereel_core::pipeline::video_encoding_sink::{ProgressCallback, SessionConfig};
use framereel_core::shared::constants::{
    DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK, DEFAULT_PRESSURE_THRESHOLD, DEFAULT_PROBE_LIMIT,
};
use framereel_core::shared::pipeline_error::PipelineError;
use framereel_core::source::infrastructure::file_sequence_frame_source::FileSequenceOptions;
use framereel_core::source::infrastructure::image_crate_decoder::ImageCrateDecoder;
use framereel_core::source::infrastructure::overlay_compositor::OverlayCompositor;
use framereel_core::video::infrastructure::ffmpeg_encoder::FfmpegEncoder;
use framereel_core::video::infrastructure::ffmpeg_frame_extractor::FfmpegClipOpener;

/// Turns still images and video clips into encoded video.
#[derive(Parser)]
#[command(name = "framereel")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode still images into a video.
    Images(ImagesArgs),
    /// Speed a clip up by sampling it evenly.
    Timelapse(TimelapseArgs),
    /// Combine videos and images as described by a JSON request; prints a
    /// JSON response.
    Generate(GenerateArgs),
}

#[derive(Args)]
struct ImagesArgs {
    /// Output video file.
    output: PathBuf,

    /// Image files, encoded in the given order.
    #[arg(long, num_args = 1.., conflicts_with = "sequence")]
    inputs: Vec<PathBuf>,

    /// Numbered sequence template, e.g. frames/img_%04d.png.
    #[arg(long)]
    sequence: Option<String>,

    /// Index of the first file of the sequence.
    #[arg(long, default_value = "0")]
    first_index: usize,

    /// Number of sequence files to read (probed when omitted).
    #[arg(long)]
    count: Option<usize>,

    /// Output frame rate.
    #[arg(long, default_value = "30")]
    fps: u32,
}

#[derive(Args)]
struct TimelapseArgs {
    /// Input video file.
    input: PathBuf,

    /// Output video file.
    output: PathBuf,

    /// Output frame rate.
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Speed-up factor.
    #[arg(long, default_value = "2.0")]
    speed: f64,

    #[command(flatten)]
    buffer: BufferArgs,
}

#[derive(Args)]
struct GenerateArgs {
    /// JSON request file: {"inputs": [...], "output": "...", "fps": 30, "speed": 2.0}.
    #[arg(long)]
    request: PathBuf,

    #[command(flatten)]
    buffer: BufferArgs,
}

#[derive(Args)]
struct BufferArgs {
    /// Refill the decode buffer when fewer frames than this are queued.
    #[arg(long, default_value_t = DEFAULT_LOW_WATERMARK)]
    low_watermark: usize,

    /// Stop refilling once more frames than this are queued.
    #[arg(long, default_value_t = DEFAULT_HIGH_WATERMARK)]
    high_watermark: usize,

    /// Trim decode buffers when available system memory drops under this
    /// fraction (0 disables the monitor).
    #[arg(long, default_value_t = DEFAULT_PRESSURE_THRESHOLD)]
    memory_threshold: f64,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Images(args) => run_images(args),
        Command::Timelapse(args) => run_timelapse(args),
        Command::Generate(args) => run_generate(args),
    };
    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_images(args: ImagesArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate_images(&args)?;
    let input = match args.sequence {
        Some(template) => ImageInput::Sequence {
            template,
            options: FileSequenceOptions {
                first_index: args.first_index,
                total_frames: args.count,
                probe_limit: DEFAULT_PROBE_LIMIT,
            },
        },
        None => ImageInput::Files(args.inputs),
    };

    let mut use_case = ImagesToVideoUseCase::new(
        Box::new(ImageCrateDecoder::new()),
        Box::new(FfmpegEncoder::new()),
        Some(session_logger()),
        Some(progress("Encoding")),
        None,
    );
    let output = use_case.execute(input, SessionConfig::new(args.output, args.fps))?;
    eprintln!();
    log::info!("Output written to {}", output.display());
    Ok(())
}

fn run_timelapse(args: TimelapseArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate_input(&args.input)?;
    let settings = TimelapseSettings::new(args.fps, args.speed)?;
    let buffer_config = buffer_config(&args.buffer)?;
    let (pressure, _monitor) = memory_monitor(args.buffer.memory_threshold);

    let mut use_case = TimelapseUseCase::new(
        Box::new(FfmpegClipOpener),
        Box::new(FfmpegEncoder::new()),
        settings,
        buffer_config,
        pressure,
        Some(session_logger()),
        Some(progress("Sampling")),
        None,
    );
    let output = use_case.execute(&args.input, &args.output)?;
    eprintln!();
    log::info!("Output written to {}", output.display());
    Ok(())
}

/// Always prints a JSON response; the exit status reflects success.
fn run_generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let result = load_request(&args.request).and_then(|request| {
        let buffer_config = buffer_config(&args.buffer)?;
        let (pressure, _monitor) = memory_monitor(args.buffer.memory_threshold);
        let mut use_case = GenerateVideoUseCase::new(
            Box::new(ImageCrateDecoder::new()),
            Box::new(FfmpegClipOpener),
            Box::new(OverlayCompositor::new()),
            Box::new(FfmpegEncoder::new()),
            buffer_config,
            pressure,
            Some(session_logger()),
            None,
            None,
        );
        use_case.execute(&request)
    });

    println!("{}", GenerateVideoResponse::from_result(&result).to_json());
    result.map(|_| ()).map_err(Into::into)
}

fn load_request(path: &Path) -> Result<GenerateVideoRequest, PipelineError> {
    let json = std::fs::read_to_string(path)?;
    GenerateVideoRequest::from_json(&json)
}

fn validate_images(args: &ImagesArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.sequence.is_none() && args.inputs.is_empty() {
        return Err("Either --inputs or --sequence is required".into());
    }
    for input in &args.inputs {
        validate_input(input)?;
    }
    if args.fps == 0 {
        return Err("Frame rate must be positive".into());
    }
    if args.count == Some(0) {
        return Err("--count must be positive".into());
    }
    Ok(())
}

fn validate_input(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }
    Ok(())
}

fn buffer_config(args: &BufferArgs) -> Result<BufferConfig, PipelineError> {
    if !(0.0..1.0).contains(&args.memory_threshold) {
        return Err(PipelineError::InvalidRequest(format!(
            "Memory threshold must be in [0, 1), got {}",
            args.memory_threshold
        )));
    }
    BufferConfig::new(args.low_watermark, args.high_watermark)
}

/// Starts the system memory monitor unless `threshold` is zero. The
/// monitor stops when the returned handle is dropped.
fn memory_monitor(threshold: f64) -> (Option<MemoryPressureSignal>, Option<SystemMemoryMonitor>) {
    if threshold <= 0.0 {
        return (None, None);
    }
    let signal = MemoryPressureSignal::new();
    let monitor = SystemMemoryMonitor::with_settings(
        signal.clone(),
        PressureTracker::new(threshold),
        std::time::Duration::from_secs(1),
    );
    (Some(signal), Some(monitor))
}

fn session_logger() -> Box<dyn SessionLogger> {
    Box::new(StdoutSessionLogger::default())
}

fn progress(label: &'static str) -> ProgressCallback {
    Box::new(move |written, total| {
        eprint!("\r{label} frame {written}/{total}");
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("framereel").chain(args.iter().copied()))
    }

    fn images(args: &[&str]) -> ImagesArgs {
        match parse(args).unwrap().command {
            Command::Images(args) => args,
            _ => panic!("expected images command"),
        }
    }

    #[test]
    fn test_images_defaults() {
        let args = images(&["images", "out.mp4", "--sequence", "img_%04d.png"]);
        assert_eq!(args.fps, 30);
        assert_eq!(args.first_index, 0);
        assert_eq!(args.count, None);
        assert_eq!(args.sequence.as_deref(), Some("img_%04d.png"));
    }

    #[test]
    fn test_images_requires_some_input() {
        let args = images(&["images", "out.mp4"]);
        assert!(validate_images(&args).is_err());
    }

    #[test]
    fn test_images_rejects_missing_file() {
        let args = images(&["images", "out.mp4", "--inputs", "/nonexistent/a.png"]);
        let err = validate_images(&args).unwrap_err();
        assert!(err.to_string().contains("Input file not found"));
    }

    #[test]
    fn test_images_accepts_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"").unwrap();
        let path = path.to_string_lossy().into_owned();

        let args = images(&["images", "out.mp4", "--inputs", &path, "--fps", "12"]);
        assert!(validate_images(&args).is_ok());
        assert_eq!(args.fps, 12);
    }

    #[test]
    fn test_images_rejects_zero_fps_and_count() {
        let zero_fps = images(&["images", "out.mp4", "--sequence", "x_%d.png", "--fps", "0"]);
        assert!(validate_images(&zero_fps).is_err());

        let zero_count = images(&["images", "out.mp4", "--sequence", "x_%d.png", "--count", "0"]);
        assert!(validate_images(&zero_count).is_err());
    }

    #[test]
    fn test_inputs_conflict_with_sequence() {
        assert!(parse(&[
            "images",
            "out.mp4",
            "--inputs",
            "a.png",
            "--sequence",
            "x_%d.png"
        ])
        .is_err());
    }

    #[test]
    fn test_timelapse_buffer_flags() {
        let cli = parse(&[
            "timelapse",
            "in.mp4",
            "out.mp4",
            "--speed",
            "4",
            "--low-watermark",
            "2",
            "--high-watermark",
            "8",
        ])
        .unwrap();
        let Command::Timelapse(args) = cli.command else {
            panic!("expected timelapse command");
        };
        assert_eq!(args.speed, 4.0);
        let config = buffer_config(&args.buffer).unwrap();
        assert_eq!(config.low_watermark, 2);
        assert_eq!(config.high_watermark, 8);
    }

    #[test]
    fn test_buffer_config_rejects_inverted_watermarks() {
        let args = BufferArgs {
            low_watermark: 10,
            high_watermark: 5,
            memory_threshold: DEFAULT_PRESSURE_THRESHOLD,
        };
        assert!(buffer_config(&args).is_err());
    }

    #[test]
    fn test_buffer_config_rejects_bad_threshold() {
        let args = BufferArgs {
            low_watermark: DEFAULT_LOW_WATERMARK,
            high_watermark: DEFAULT_HIGH_WATERMARK,
            memory_threshold: 1.5,
        };
        assert!(buffer_config(&args).is_err());
    }

    #[test]
    fn test_memory_monitor_disabled_at_zero() {
        let (signal, monitor) = memory_monitor(0.0);
        assert!(signal.is_none());
        assert!(monitor.is_none());
    }

    #[test]
    fn test_load_request_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(
            &path,
            r#"{"inputs": ["a.mp4", "b.png"], "output": "out", "fps": 24, "speed": 1.5}"#,
        )
        .unwrap();

        let request = load_request(&path).unwrap();
        assert_eq!(request.inputs.len(), 2);
        assert_eq!(request.fps, 24);
        assert_eq!(request.speed, 1.5);
    }

    #[test]
    fn test_load_request_missing_file_fails() {
        assert!(load_request(Path::new("/nonexistent/request.json")).is_err());
    }
}
