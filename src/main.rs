use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;
use tracing_subscriber::filter::LevelFilter;

use aimvision::camera::{ExposureSettings, FrameSource, ImageSequenceSource, V4l2ExposureLock};
use aimvision::display::DebugImageSink;
use aimvision::frame_loop::{stop_after, stop_on_ctrl_c};
use aimvision::telemetry::{LogTelemetry, UdpTelemetry, DEFAULT_TABLE};
use aimvision::{
    ColorRange, DistanceModel, FilterConfig, FrameLoop, Hsv, StaticConfig, StopSignal,
    TrackerConfig,
};

fn parse_channel(c: &str) -> Result<u8, String> {
    c.parse::<u8>().map_err(|e| format!("bad channel '{}': {}", c, e))
}

fn parse_hsv(input: &str) -> Result<Hsv, String> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    let [h, s, v] = parts[..] else {
        return Err(format!("expected H,S,V but got '{}'", input));
    };
    Ok(Hsv::new(parse_channel(h)?, parse_channel(s)?, parse_channel(v)?))
}

fn parse_positive(input: &str) -> Result<f64, String> {
    let value: f64 = input
        .parse()
        .map_err(|e| format!("bad number '{}': {}", input, e))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("expected a positive number but got '{}'", input));
    }
    Ok(value)
}

fn parse_seconds(input: &str) -> Result<Duration, String> {
    let secs = parse_positive(input)?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("bad duration '{}': {}", input, e))
}

fn parse_frame_rate(input: &str) -> Result<f64, String> {
    let fps = parse_positive(input)?;
    Duration::try_from_secs_f64(1.0 / fps)
        .map_err(|_| format!("frame rate '{}' is too low", input))?;
    Ok(fps)
}

#[derive(Parser)]
#[command(name = "aimvision")]
#[command(about = "Locate a color target in a frame stream and report its offset and distance")]
struct Cli {
    /// Directory of frames to process, in file-name order
    #[arg(value_name = "FRAMES_DIR")]
    frames: PathBuf,

    /// Lower HSV bound as H,S,V (hue 0-179)
    #[arg(long, value_parser = parse_hsv, default_value = "40,58,94")]
    lower: Hsv,

    /// Upper HSV bound as H,S,V
    #[arg(long, value_parser = parse_hsv, default_value = "255,255,255")]
    upper: Hsv,

    /// Median filter radius (2 = 5x5 window)
    #[arg(long, default_value_t = 2)]
    median_radius: u32,

    /// Gaussian blur sigma applied after the median pass
    #[arg(long)]
    blur_sigma: Option<f32>,

    /// Focal length in pixels from offline calibration
    #[arg(long, default_value_t = 1431.0)]
    focal_length: f64,

    /// Physical width of the target
    #[arg(long, default_value_t = 3.25)]
    target_width: f64,

    /// Distance of the calibration shot (informational)
    #[arg(long, default_value_t = 15.0)]
    known_distance: f64,

    /// Publish telemetry over UDP to this address
    #[arg(long, value_name = "ADDR")]
    telemetry: Option<SocketAddr>,

    /// Telemetry table name
    #[arg(long, default_value = DEFAULT_TABLE)]
    table: String,

    /// Log each frame's offset and distance
    #[arg(long)]
    log_results: bool,

    /// Save debug images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Save debug images every N frames
    #[arg(long, default_value_t = 1)]
    debug_every: u64,

    /// Lock exposure on this V4L2 device before starting
    #[arg(long, value_name = "DEVICE")]
    v4l2_device: Option<PathBuf>,

    /// Absolute exposure for the V4L2 device
    #[arg(long, default_value_t = 10)]
    exposure: u32,

    /// Deliver frames at this rate
    #[arg(long, value_parser = parse_frame_rate)]
    fps: Option<f64>,

    /// Stop after this many seconds
    #[arg(long, value_parser = parse_seconds, value_name = "SECONDS")]
    run_for: Option<Duration>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = TrackerConfig {
        color: ColorRange::new(args.lower, args.upper),
        filter: FilterConfig {
            median_radius: args.median_radius,
            blur_sigma: args.blur_sigma,
            ..FilterConfig::default()
        },
        distance: DistanceModel {
            focal_length_px: args.focal_length,
            target_width: args.target_width,
            known_distance: Some(args.known_distance),
        },
    };
    info!("Using {:?}", config);

    let mut sequence = ImageSequenceSource::new(&args.frames)
        .with_context(|| format!("Failed to open frames in {}", args.frames.display()))?;
    if let Some(fps) = args.fps {
        sequence = sequence.with_frame_rate(fps);
    }

    let source: Box<dyn FrameSource> = match &args.v4l2_device {
        Some(device) => Box::new(V4l2ExposureLock::new(sequence, device)),
        None => Box::new(sequence),
    };

    let stop = StopSignal::new();
    let mut frame_loop = FrameLoop::new(source, Box::new(StaticConfig(config)))
        .with_stop_signal(stop.clone());

    if args.v4l2_device.is_some() {
        frame_loop = frame_loop.with_exposure(ExposureSettings {
            auto: false,
            absolute: args.exposure,
        });
    }

    if let Some(max) = args.max_frames {
        frame_loop = frame_loop.with_max_frames(max);
    }
    if let Some(addr) = args.telemetry {
        let sink = UdpTelemetry::new(addr, args.table.clone())?;
        frame_loop = frame_loop.add_telemetry(Box::new(sink));
        info!("Publishing telemetry to {} under '{}'", addr, args.table);
    }
    if args.log_results {
        frame_loop = frame_loop.add_telemetry(Box::new(LogTelemetry));
    }
    if let Some(debug_dir) = args.debug_out {
        let sink = DebugImageSink::new(debug_dir)?.with_interval(args.debug_every);
        frame_loop = frame_loop.add_display(Box::new(sink));
    }

    tokio::spawn(stop_on_ctrl_c(stop.clone()));
    if let Some(run_for) = args.run_for {
        tokio::spawn(stop_after(stop.clone(), run_for));
    }

    let report = tokio::task::spawn_blocking(move || frame_loop.run())
        .await
        .context("Frame loop task panicked")??;

    println!("\n=== Target Tracking Results ===");
    println!("Frames processed: {}", report.frames_processed);
    println!("Detections: {}", report.detections);
    println!("Frames without target: {}", report.no_detections);
    if report.telemetry_failures > 0 {
        println!("Telemetry failures: {}", report.telemetry_failures);
    }
    println!("Stopped: {:?}", report.stop_reason);
    println!(
        "Ran for {:.2}s",
        (report.stopped_at - report.started_at).as_seconds_f64()
    );

    Ok(())
}
