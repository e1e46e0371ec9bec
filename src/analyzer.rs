// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Video and single-image posture analysis.
//!
//! [`PostureAnalyzer`] drives a [`FrameProcessor`] over a frame sequence,
//! applying the frame sampling stride and folding the per-frame results into
//! an [`AnalysisReport`]. Still images bypass aggregation and produce a
//! [`FrameFeedback`] directly.

use std::path::Path;
use std::time::Instant;

use image::DynamicImage;

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::frame::FrameProcessor;
use crate::provider::LandmarkProvider;
use crate::results::{AnalysisReport, FrameFeedback, FrameResult};
use crate::source::{self, Source, SourceIterator};

/// Posture analyzer over a landmark provider.
///
/// # Example
///
/// ```no_run
/// use posture_inference::{AnalyzerConfig, PoseModel, PostureAnalyzer};
///
/// let config = AnalyzerConfig::new().with_skip_frames(2);
/// let model = PoseModel::load_with_config("pose_landmark.onnx", &config)?;
/// let mut analyzer = PostureAnalyzer::with_config(model, config);
/// let report = analyzer.analyze_video("squat.mp4")?;
/// println!("{}", report.to_json()?);
/// # Ok::<(), posture_inference::PostureError>(())
/// ```
#[derive(Debug)]
pub struct PostureAnalyzer<P> {
    processor: FrameProcessor<P>,
    config: AnalyzerConfig,
}

impl<P: LandmarkProvider> PostureAnalyzer<P> {
    /// Create an analyzer with the default configuration.
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, AnalyzerConfig::default())
    }

    /// Create an analyzer with a custom configuration.
    pub fn with_config(provider: P, config: AnalyzerConfig) -> Self {
        let processor =
            FrameProcessor::new(provider).with_keypoint_policy(config.keypoint_policy);
        Self { processor, config }
    }

    /// Get the analyzer configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Access the landmark provider.
    pub const fn provider(&self) -> &P {
        self.processor.provider()
    }

    /// Analyze a video file, or a directory of frame images.
    ///
    /// Video files are decoded only when the crate is built with the `video`
    /// feature. Frame directories need no feature.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PostureError::VideoOpen`] if the source cannot be
    /// opened, [`crate::PostureError::FeatureNotEnabled`] for a video file
    /// without the `video` feature, [`crate::PostureError::Config`] for an
    /// invalid configuration,
    /// and [`crate::PostureError::MissingLandmark`] if the provider breaks
    /// its landmark vocabulary.
    pub fn analyze_video<Q: AsRef<Path>>(&mut self, path: Q) -> Result<AnalysisReport> {
        let path = path.as_ref();
        let source = if path.is_dir() {
            Source::Directory(path.to_path_buf())
        } else {
            Source::Video(path.to_path_buf())
        };
        self.analyze_frames(SourceIterator::open(&source)?)
    }

    /// Analyze a decoded frame sequence.
    ///
    /// Frames are numbered from 1. Frame `i` reaches the provider only when
    /// `i % skip_frames == 0`, but every frame counts toward `total_frames`.
    /// A frame that failed to decode is counted and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PostureError::Config`] for an invalid configuration and
    /// [`crate::PostureError::MissingLandmark`] if the provider breaks its
    /// landmark vocabulary.
    pub fn analyze_frames<I>(&mut self, frames: I) -> Result<AnalysisReport>
    where
        I: IntoIterator<Item = Result<DynamicImage>>,
    {
        self.analyze_frames_with(frames, |_, _| {})
    }

    /// Analyze a decoded frame sequence, calling `on_violation` with each
    /// frame that had at least one violation.
    ///
    /// # Errors
    ///
    /// See [`PostureAnalyzer::analyze_frames`].
    pub fn analyze_frames_with<I, F>(&mut self, frames: I, mut on_violation: F) -> Result<AnalysisReport>
    where
        I: IntoIterator<Item = Result<DynamicImage>>,
        F: FnMut(&DynamicImage, &FrameResult),
    {
        self.config.validate()?;
        let skip = self.config.skip_frames;
        let start = Instant::now();
        let mut report = AnalysisReport::new();
        let mut decode_errors = 0usize;

        for (i, frame) in frames.into_iter().enumerate() {
            let frame_index = i + 1;

            let image = match frame {
                Ok(image) => image,
                Err(e) => {
                    crate::warn!("Skipping frame {frame_index}: {e}");
                    decode_errors += 1;
                    report.record(None);
                    continue;
                }
            };

            if frame_index % skip != 0 {
                report.record(None);
                continue;
            }

            let result = self.processor.process(&image, frame_index)?;
            if result.has_violations() {
                crate::verbose!(
                    "frame {frame_index}: {}",
                    result.violations.join(", ")
                );
                on_violation(&image, &result);
            }
            report.record(Some(result));
        }

        crate::verbose!(
            "Analyzed {} frames ({} with violations) in {:.1}ms",
            report.total_frames,
            report.frames_with_violations,
            start.elapsed().as_secs_f64() * 1000.0
        );
        if decode_errors > 0 {
            crate::warn!("{decode_errors} frame(s) could not be decoded");
        }

        Ok(report)
    }

    /// Analyze one decoded still image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PostureError::MissingLandmark`] if the provider breaks
    /// its landmark vocabulary.
    pub fn analyze_image(&mut self, image: &DynamicImage) -> Result<FrameFeedback> {
        Ok(self.processor.process(image, 0)?.into_feedback())
    }

    /// Decode an encoded image (JPEG, PNG, ...) and analyze it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PostureError::ImageDecode`] if the bytes are not a
    /// valid image.
    pub fn analyze_image_bytes(&mut self, bytes: &[u8]) -> Result<FrameFeedback> {
        let image = source::decode_image(bytes)?;
        self.analyze_image(&image)
    }

    /// Load an image file and analyze it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PostureError::ImageDecode`] if the file cannot be read
    /// or decoded.
    pub fn analyze_image_file<Q: AsRef<Path>>(&mut self, path: Q) -> Result<FrameFeedback> {
        let image = source::load_image(path.as_ref())?;
        self.analyze_image(&image)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::PostureError;
    use crate::landmarks::{Landmark, LandmarkSet, Point2D};

    /// Hands out queued detections in call order, then reports no person.
    #[derive(Default)]
    struct Scripted {
        queue: VecDeque<Option<LandmarkSet>>,
        calls: usize,
    }

    impl Scripted {
        fn new(script: Vec<Option<LandmarkSet>>) -> Self {
            Self {
                queue: script.into(),
                calls: 0,
            }
        }
    }

    impl LandmarkProvider for Scripted {
        fn detect(&mut self, _image: &DynamicImage) -> Result<Option<LandmarkSet>> {
            self.calls += 1;
            Ok(self.queue.pop_front().flatten())
        }
    }

    fn frame() -> Result<DynamicImage> {
        Ok(DynamicImage::new_rgb8(4, 4))
    }

    fn frames(n: usize) -> Vec<Result<DynamicImage>> {
        (0..n).map(|_| frame()).collect()
    }

    /// Back 140.7 degrees, knee ahead of ankle, neck 35.5 degrees.
    fn slouched() -> LandmarkSet {
        let mut set: LandmarkSet = Landmark::ALL
            .iter()
            .map(|&lm| (lm, Point2D::new(0.5, 0.5)))
            .collect();
        set.insert(Landmark::LeftShoulder, Point2D::new(0.5, 0.3));
        set.insert(Landmark::LeftHip, Point2D::new(0.5, 0.6));
        set.insert(Landmark::LeftKnee, Point2D::new(0.6267, 0.7548));
        set.insert(Landmark::LeftAnkle, Point2D::new(0.55, 0.95));
        set.insert(Landmark::LeftEar, Point2D::new(0.5581, 0.3814));
        set
    }

    /// Only the knee rule fires.
    fn knee_only() -> LandmarkSet {
        let mut set = slouched();
        set.insert(Landmark::LeftKnee, Point2D::new(0.56, 0.8));
        set.insert(Landmark::LeftEar, Point2D::new(0.52, 0.5));
        set
    }

    #[test]
    fn test_three_frame_clip() {
        let provider = Scripted::new(vec![None, Some(slouched()), None]);
        let mut analyzer = PostureAnalyzer::new(provider);
        let report = analyzer.analyze_frames(frames(3)).unwrap();

        assert_eq!(report.total_frames, 3);
        assert_eq!(report.frames_with_violations, 1);
        let hit = &report.violations[0];
        assert_eq!(hit.frame_index, 2);
        assert_eq!(
            hit.violations,
            vec![
                "Back angle 140° < 150°",
                "Knee is ahead of ankle",
                "Neck bent 35° > 30°"
            ]
        );
        assert_eq!(hit.keypoints.len(), Landmark::ALL.len());
    }

    #[test]
    fn test_stride_limits_provider_calls() {
        for (n, k) in [(10, 1), (10, 3), (7, 7), (5, 6), (12, 4)] {
            let config = AnalyzerConfig::new().with_skip_frames(k);
            let mut analyzer = PostureAnalyzer::with_config(Scripted::default(), config);
            let report = analyzer.analyze_frames(frames(n)).unwrap();
            assert_eq!(report.total_frames, n);
            assert_eq!(analyzer.provider().calls, n / k, "n={n} k={k}");
        }
    }

    #[test]
    fn test_stride_uses_one_based_indices() {
        // with stride 2, frames 2 and 4 are analyzed
        let provider = Scripted::new(vec![Some(knee_only()), Some(slouched())]);
        let config = AnalyzerConfig::new().with_skip_frames(2);
        let mut analyzer = PostureAnalyzer::with_config(provider, config);
        let report = analyzer.analyze_frames(frames(5)).unwrap();

        let indices: Vec<usize> = report.violations.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices, vec![2, 4]);
        assert_eq!(report.violations[0].violations, vec!["Knee is ahead of ankle"]);
        assert_eq!(report.violations[1].violations.len(), 3);
    }

    #[test]
    fn test_empty_source() {
        let mut analyzer = PostureAnalyzer::new(Scripted::default());
        let report = analyzer.analyze_frames(Vec::new()).unwrap();
        assert_eq!(report, AnalysisReport::new());
    }

    #[test]
    fn test_decode_errors_are_counted_and_skipped() {
        let provider = Scripted::new(vec![Some(slouched())]);
        let mut analyzer = PostureAnalyzer::new(provider);
        let input = vec![
            Err(PostureError::ImageDecode("truncated".to_string())),
            frame(),
        ];
        let report = analyzer.analyze_frames(input).unwrap();

        assert_eq!(report.total_frames, 2);
        assert_eq!(analyzer.provider().calls, 1);
        assert_eq!(report.violations[0].frame_index, 2);
    }

    #[test]
    fn test_zero_stride_rejected() {
        let config = AnalyzerConfig::new().with_skip_frames(0);
        let mut analyzer = PostureAnalyzer::with_config(Scripted::default(), config);
        assert!(matches!(
            analyzer.analyze_frames(frames(2)),
            Err(PostureError::Config(_))
        ));
    }

    #[test]
    fn test_observer_sees_violation_frames() {
        let provider = Scripted::new(vec![Some(slouched()), None, Some(knee_only())]);
        let mut analyzer = PostureAnalyzer::new(provider);
        let mut seen = Vec::new();
        analyzer
            .analyze_frames_with(frames(3), |_, result| seen.push(result.frame_index))
            .unwrap();
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn test_analyze_image() {
        let mut analyzer = PostureAnalyzer::new(Scripted::new(vec![Some(slouched())]));
        let feedback = analyzer.analyze_image(&DynamicImage::new_rgb8(4, 4)).unwrap();
        assert_eq!(feedback.violations.len(), 3);
        assert_eq!(feedback.keypoints.len(), Landmark::ALL.len());
    }

    #[test]
    fn test_analyze_image_without_person() {
        let mut analyzer = PostureAnalyzer::new(Scripted::default());
        let feedback = analyzer.analyze_image(&DynamicImage::new_rgb8(4, 4)).unwrap();
        assert!(feedback.violations.is_empty());
        assert!(feedback.keypoints.is_empty());
    }

    #[test]
    fn test_analyze_image_bytes_rejects_garbage() {
        let mut analyzer = PostureAnalyzer::new(Scripted::default());
        assert!(matches!(
            analyzer.analyze_image_bytes(&[0xde, 0xad, 0xbe, 0xef]),
            Err(PostureError::ImageDecode(_))
        ));
        assert_eq!(analyzer.provider().calls, 0);
    }

    #[test]
    fn test_analyze_image_bytes_png() {
        let mut bytes = Vec::new();
        DynamicImage::new_rgb8(6, 6)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let mut analyzer = PostureAnalyzer::new(Scripted::new(vec![Some(knee_only())]));
        let feedback = analyzer.analyze_image_bytes(&bytes).unwrap();
        assert_eq!(feedback.violations, vec!["Knee is ahead of ankle"]);
    }
}
