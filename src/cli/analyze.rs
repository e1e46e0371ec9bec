// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

#[cfg(feature = "annotate")]
use crate::annotate::{AnnotationSaver, find_next_run_dir};
use crate::cli::args::AnalyzeArgs;
use crate::error::Result;
use crate::source::{self, Source, SourceIterator};
use crate::{AnalyzerConfig, PoseModel, PostureAnalyzer, VERSION};
use crate::{section, success, verbose, warn};

/// Parent directory for saved runs.
#[cfg(feature = "annotate")]
const RUNS_DIR: &str = "runs/posture";

/// Build the analyzer configuration from CLI arguments.
fn build_config(args: &AnalyzeArgs) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::new()
        .with_skip_frames(args.skip_frames)
        .with_min_confidence(args.conf)
        .with_threads(args.threads)
        .with_keypoint_policy(args.keypoints);

    if let Some(sz) = args.imgsz {
        config = config.with_imgsz(sz, sz);
    }
    if let Some(device) = args.device {
        config = config.with_device(device);
    }
    if let Some(scale) = args.presence_scale {
        config = config.with_presence_scale(scale);
    }
    if let Some(space) = args.coordinates {
        config = config.with_coordinate_space(space);
    }
    config
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

/// Run posture analysis for the `analyze` command.
///
/// Images produce a frame feedback document, videos and frame directories
/// an analysis report. The JSON goes to `--output` or stdout; status lines
/// always go to stderr.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the model or source
/// cannot be opened, or the report cannot be written.
pub fn run_analysis(args: &AnalyzeArgs) -> Result<()> {
    let config = build_config(args);
    config.validate()?;

    let source = Source::from(args.source.as_str());

    section!("posture-inference {VERSION} 🚀 {}", config.device);
    let model = PoseModel::load_with_config(&args.model, &config)?;
    verbose!(
        "Model: {} imgsz=({}, {})",
        args.model.display(),
        model.imgsz().0,
        model.imgsz().1
    );

    #[cfg(feature = "annotate")]
    let mut saver = args
        .save
        .then(|| AnnotationSaver::new(find_next_run_dir(Path::new(RUNS_DIR), "analyze")));
    #[cfg(not(feature = "annotate"))]
    if args.save {
        warn!("--save requires the 'annotate' feature. Compile with --features annotate to enable saving.");
    }

    let mut analyzer = PostureAnalyzer::with_config(model, config);

    let json = if source.is_image() {
        let image = source::load_image(source.path())?;
        let result = analyzer.analyze_image(&image)?;

        let speed = analyzer.provider().last_speed();
        verbose!(
            "Speed: {:.1}ms total ({:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess)",
            speed.total(),
            speed.preprocess.unwrap_or(0.0),
            speed.inference.unwrap_or(0.0),
            speed.postprocess.unwrap_or(0.0)
        );

        #[cfg(feature = "annotate")]
        if let Some(saver) = saver.as_mut()
            && !result.violations.is_empty()
        {
            let frame = crate::FrameResult {
                frame_index: 0,
                violations: result.violations.clone(),
                keypoints: result.keypoints.clone(),
            };
            saver.save(source.path(), &image, &frame)?;
        }

        if result.violations.is_empty() {
            success!("No posture violations");
        } else {
            warn!("{}", result.violations.join(", "));
        }
        to_json(&result, args.pretty)?
    } else {
        let frames = SourceIterator::open(&source)?;
        let report = analyzer.analyze_frames_with(frames, |image, result| {
            #[cfg(feature = "annotate")]
            if let Some(saver) = saver.as_mut()
                && let Err(e) = saver.save(source.path(), image, result)
            {
                warn!("Failed to save frame {}: {e}", result.frame_index);
            }
            #[cfg(not(feature = "annotate"))]
            let _ = (image, result);
        })?;

        success!(
            "{} of {} frames with violations ({:.1}%)",
            report.frames_with_violations,
            report.total_frames,
            report.violation_ratio() * 100.0
        );
        to_json(&report, args.pretty)?
    };

    #[cfg(feature = "annotate")]
    if let Some(saver) = &saver
        && saver.saved() > 0
    {
        success!("Annotated frames saved to {}", saver.save_dir().display());
    }

    write_report(args.output.as_deref(), &json, &mut io::stdout().lock())
}

/// Write the JSON document to a file, or to `stdout` when no path is given.
///
/// Nothing but the document is written to `stdout`.
fn write_report<W: Write>(output: Option<&Path>, json: &str, stdout: &mut W) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)?;
            success!("Report saved to {}", path.display());
        }
        None => {
            writeln!(stdout, "{json}")?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use crate::config::KeypointPolicy;
    use crate::device::Device;
    use crate::error::PostureError;
    use crate::postprocessing::CoordinateSpace;
    use clap::Parser;

    fn parse(extra: &[&str]) -> AnalyzeArgs {
        let mut argv = vec!["app", "analyze", "-m", "missing.onnx", "-s", "clip.mp4"];
        argv.extend_from_slice(extra);
        let Commands::Analyze(args) = Cli::parse_from(argv).command;
        args
    }

    #[test]
    fn test_build_config() {
        let config = build_config(&parse(&[
            "--skip-frames",
            "4",
            "--conf",
            "0.3",
            "--imgsz",
            "192",
            "--device",
            "cpu",
            "--keypoints",
            "always",
            "--coordinates",
            "normalized",
        ]));
        assert_eq!(config.skip_frames, 4);
        assert!((config.min_confidence - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.imgsz, Some((192, 192)));
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.keypoint_policy, KeypointPolicy::Always);
        assert_eq!(config.coordinate_space, Some(CoordinateSpace::Normalized));
        assert_eq!(config.presence_scale, None);
    }

    #[test]
    fn test_zero_stride_fails_before_model_load() {
        let err = run_analysis(&parse(&["--skip-frames", "0"]));
        assert!(matches!(err, Err(PostureError::Config(_))));
    }

    #[test]
    fn test_missing_model() {
        let err = run_analysis(&parse(&[]));
        assert!(matches!(err, Err(PostureError::ModelLoad(_))));
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = std::env::temp_dir().join(format!("posture-report-{}", std::process::id()));
        let path = dir.join("nested").join("report.json");
        let mut stdout = Vec::new();
        write_report(Some(&path), "{\"total_frames\":0}", &mut stdout).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"total_frames\":0}");
        assert!(stdout.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stdout_carries_only_the_report() {
        let mut report = crate::AnalysisReport::new();
        report.record(None);
        report.record(None);

        for pretty in [false, true] {
            let json = to_json(&report, pretty).unwrap();
            let mut stdout = Vec::new();
            // status lines around the report must not reach stdout
            success!("summary before the report");
            write_report(None, &json, &mut stdout).unwrap();
            success!("summary after the report");

            let printed = String::from_utf8(stdout).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&printed).unwrap();
            assert_eq!(parsed["total_frames"], 2);
            assert_eq!(crate::AnalysisReport::from_json(&printed).unwrap(), report);
        }
    }

    #[test]
    fn test_to_json_pretty() {
        let report = crate::AnalysisReport::new();
        assert!(to_json(&report, true).unwrap().contains('\n'));
        assert!(!to_json(&report, false).unwrap().contains('\n'));
    }
}
