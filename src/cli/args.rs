// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::KeypointPolicy;
use crate::device::Device;
use crate::postprocessing::{CoordinateSpace, PresenceScale};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Analyze Options:
    --model, -m <MODEL>      Path to ONNX pose landmark model
    --source, -s <SOURCE>    Image, video, or directory of frames
    --skip-frames <N>        Analyze every Nth frame [default: 1]
    --conf <CONF>            Minimum pose presence score [default: 0.5]
    --imgsz <IMGSZ>          Model input size
    --device <DEVICE>        Device (cpu, cuda:0, mps, coreml)
    --keypoints <POLICY>     When to attach keypoints (on-violation, always)
    --presence-scale <S>     Presence output scale (logit, probability) [default: from model]
    --coordinates <SPACE>    Landmark coordinates (normalized, pixels) [default: from model]
    --output, -o <FILE>      Write the JSON report to a file instead of stdout
    --save                   Save annotated violation frames to runs/posture/analyze
    --verbose                Show verbose output

Examples:
    posture-inference analyze --model pose_landmark.onnx --source desk.jpg
    posture-inference analyze -m pose_landmark.onnx -s squat.mp4 --skip-frames 5
    posture-inference analyze -m pose_landmark.onnx -s frames/ --save -o report.json"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check posture in an image, a video, or a directory of frames
    Analyze(AnalyzeArgs),
}

/// Arguments for the analyze command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct AnalyzeArgs {
    /// Path to ONNX pose landmark model
    #[arg(short, long)]
    pub model: PathBuf,

    /// Image, video, or directory of frames
    #[arg(short, long)]
    pub source: String,

    /// Analyze every Nth frame of a video
    #[arg(long, default_value_t = 1)]
    pub skip_frames: usize,

    /// Minimum pose presence score
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// Model input size
    #[arg(long)]
    pub imgsz: Option<usize>,

    /// Number of ONNX Runtime threads (0 = automatic)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Device to use (cpu, cuda:0, mps, coreml)
    #[arg(long)]
    pub device: Option<Device>,

    /// When to attach keypoints to frame results (on-violation, always)
    #[arg(long, default_value = "on-violation")]
    pub keypoints: KeypointPolicy,

    /// Scale of the model's presence output (logit, probability)
    #[arg(long)]
    pub presence_scale: Option<PresenceScale>,

    /// Coordinate space of the model's landmarks (normalized, pixels)
    #[arg(long)]
    pub coordinates: Option<CoordinateSpace>,

    /// Write the JSON report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Indent the JSON report
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Save annotated violation frames to runs/posture/analyze
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Show verbose output
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}
