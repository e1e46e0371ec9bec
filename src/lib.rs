// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Posture Inference Library
//!
//! Automated ergonomic and exercise-form feedback from images and videos.
//! Body landmarks are estimated per frame by an ONNX pose landmark model
//! running on [ONNX Runtime](https://onnxruntime.ai), then checked against a
//! small set of geometric posture rules.
//!
//! ## Features
//!
//! - **Rule Engine** - Back angle, knee-over-ankle and neck angle checks with stable messages
//! - **Video Analysis** - Frame sampling stride, per-frame error isolation, JSON reports
//! - **ONNX Runtime** - Any single-person 33-landmark model, CPU, CUDA or `CoreML`
//! - **Pluggable Providers** - The rule pipeline only depends on the [`LandmarkProvider`] trait
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use posture_inference::{AnalyzerConfig, PoseModel, PostureAnalyzer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalyzerConfig::new().with_skip_frames(3);
//!     let model = PoseModel::load_with_config("pose_landmark.onnx", &config)?;
//!     let mut analyzer = PostureAnalyzer::with_config(model, config);
//!
//!     // Still image
//!     let feedback = analyzer.analyze_image_file("desk.jpg")?;
//!     for violation in &feedback.violations {
//!         println!("{violation}");
//!     }
//!
//!     // A directory of frames works in every build. Video files need the
//!     // `video` feature; without it this returns `PostureError::FeatureNotEnabled`.
//!     let report = analyzer.analyze_video("squat.mp4")?;
//!     println!("{}", report.to_json()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Landmark Providers
//!
//! Anything that maps an image to landmarks can drive the analyzer:
//!
//! ```rust
//! use image::DynamicImage;
//! use posture_inference::{Landmark, LandmarkProvider, LandmarkSet, Point2D, PostureAnalyzer};
//!
//! struct Upright;
//!
//! impl LandmarkProvider for Upright {
//!     fn detect(&mut self, _image: &DynamicImage) -> posture_inference::Result<Option<LandmarkSet>> {
//!         Ok(Some(
//!             [
//!                 (Landmark::LeftEar, Point2D::new(0.52, 0.5)),
//!                 (Landmark::LeftShoulder, Point2D::new(0.5, 0.3)),
//!                 (Landmark::LeftHip, Point2D::new(0.5, 0.6)),
//!                 (Landmark::LeftKnee, Point2D::new(0.5, 0.8)),
//!                 (Landmark::LeftAnkle, Point2D::new(0.55, 0.95)),
//!             ]
//!             .into_iter()
//!             .collect(),
//!         ))
//!     }
//! }
//!
//! let mut analyzer = PostureAnalyzer::new(Upright);
//! let feedback = analyzer.analyze_image(&DynamicImage::new_rgb8(64, 64)).unwrap();
//! assert!(feedback.violations.is_empty());
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Single image, feedback JSON on stdout
//! posture-inference analyze --model pose_landmark.onnx --source desk.jpg
//!
//! # Every 5th frame of a video, report to a file
//! posture-inference analyze -m pose_landmark.onnx -s squat.mp4 --skip-frames 5 -o report.json
//!
//! # Directory of frames, saving annotated violation frames
//! posture-inference analyze -m pose_landmark.onnx -s frames/ --save
//! ```
//!
//! **CLI Options:**
//!
//! | Option | Short | Description | Default |
//! |--------|-------|-------------|---------|
//! | `--model` | `-m` | Path to ONNX pose landmark model | |
//! | `--source` | `-s` | Image, video, or frame directory | |
//! | `--skip-frames` | | Analyze every Nth frame | `1` |
//! | `--conf` | | Minimum pose presence score | `0.5` |
//! | `--imgsz` | | Model input size | from model |
//! | `--device` | | `cpu`, `cuda:N`, `coreml` | `cpu` |
//! | `--keypoints` | | `on-violation` or `always` | `on-violation` |
//! | `--presence-scale` | | `logit` or `probability` | from model |
//! | `--coordinates` | | `normalized` or `pixels` | from model |
//! | `--output` | `-o` | Report file | stdout |
//! | `--pretty` | | Indent the JSON report | `false` |
//! | `--save` | | Save annotated violation frames | `false` |
//!
//! Status and log lines go to stderr, so stdout can be redirected or piped
//! straight into a JSON parser.
//!
//! ## Report Format
//!
//! ```json
//! {"total_frames": 3, "frames_with_violations": 1,
//!  "violations": [{"frame": 2,
//!                  "violations": ["Back angle 140° < 150°", "Knee is ahead of ankle"],
//!                  "keypoints": {"NOSE": [0.5123, 0.1432], "...": [0.0, 0.0]}}]}
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`analyzer`] | [`PostureAnalyzer`] for videos, frame sequences and still images |
//! | [`frame`] | [`FrameProcessor`]: detection plus rule evaluation for one frame |
//! | [`rules`] | The posture rules and their evaluation order |
//! | [`geometry`] | [`angle_at`] |
//! | [`landmarks`] | Landmark vocabulary, [`Point2D`] and [`LandmarkSet`] |
//! | [`model`] | ONNX Runtime backed [`PoseModel`] |
//! | [`results`] | [`FrameResult`], [`FrameFeedback`], [`AnalysisReport`] |
//! | [`source`] | Input source handling ([`Source`], [`SourceIterator`]) |
//! | [`config`] | [`AnalyzerConfig`] for customizing analysis |
//! | [`error`] | Error types ([`PostureError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Draw and save annotated violation frames (default) |
//! | `video` | Video file decoding through `FFmpeg` (off by default; needs the `FFmpeg` libraries) |
//! | `cuda` | NVIDIA CUDA acceleration |
//! | `coreml` | Apple `CoreML` (macOS/iOS) |

// Modules
pub mod analyzer;
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod landmarks;
pub mod logging;
pub mod model;
pub mod postprocessing;
pub mod preprocessing;
pub mod provider;
pub mod results;
pub mod rules;
pub mod source;

// Re-export main types for convenience
pub use analyzer::PostureAnalyzer;
pub use config::{AnalyzerConfig, KeypointPolicy};
pub use device::Device;
pub use error::{PostureError, Result};
pub use frame::FrameProcessor;
pub use geometry::angle_at;
pub use landmarks::{Landmark, LandmarkSet, Point2D};
pub use model::PoseModel;
pub use postprocessing::{CoordinateSpace, PresenceScale};
pub use provider::LandmarkProvider;
pub use results::{AnalysisReport, FrameFeedback, FrameResult, Speed};
pub use source::{Source, SourceIterator};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
