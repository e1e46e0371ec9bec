// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Result types for posture analysis output.
//!
//! [`FrameResult`] is the per-frame outcome of the frame processor,
//! [`AnalysisReport`] aggregates a video and [`FrameFeedback`] is the
//! single-image answer. All of them serialize to the JSON shape served to
//! clients:
//!
//! ```json
//! {"total_frames": 3, "frames_with_violations": 1,
//!  "violations": [{"frame": 2, "violations": ["Knee is ahead of ankle"],
//!                  "keypoints": {"NOSE": [0.5, 0.1]}}]}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::landmarks::LandmarkSet;

/// Timing information for one landmark inference (in milliseconds).
#[derive(Debug, Clone, Default)]
pub struct Speed {
    /// Time spent on preprocessing.
    pub preprocess: Option<f64>,
    /// Time spent on model inference.
    pub inference: Option<f64>,
    /// Time spent on postprocessing.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Sum of preprocess, inference, and postprocess times in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// Outcome of analyzing one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameResult {
    /// 1-based index of the frame in the video, 0 for still images.
    #[serde(rename = "frame")]
    pub frame_index: usize,
    /// Violation messages in rule order.
    pub violations: Vec<String>,
    /// Rounded snapshot of all detected landmarks, empty unless the keypoint
    /// policy asked for it.
    pub keypoints: LandmarkSet,
}

impl FrameResult {
    /// Result for a frame where nothing was detected or nothing fired.
    #[must_use]
    pub const fn empty(frame_index: usize) -> Self {
        Self {
            frame_index,
            violations: Vec::new(),
            keypoints: LandmarkSet::new(),
        }
    }

    /// Whether any rule fired on this frame.
    #[must_use]
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Drop the frame index, producing the single-image answer.
    #[must_use]
    pub fn into_feedback(self) -> FrameFeedback {
        FrameFeedback {
            violations: self.violations,
            keypoints: self.keypoints,
        }
    }
}

/// Posture feedback for a single still image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameFeedback {
    pub violations: Vec<String>,
    pub keypoints: LandmarkSet,
}

impl FrameFeedback {
    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid feedback document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Aggregated posture report for a video.
///
/// `frames_with_violations` always equals `violations.len()`; use
/// [`AnalysisReport::record`] to add frames so the two stay in step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Every decoded frame, analyzed or not.
    pub total_frames: usize,
    pub frames_with_violations: usize,
    /// Frames with at least one violation, in ascending frame order.
    pub violations: Vec<FrameResult>,
}

impl AnalysisReport {
    /// Create an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total_frames: 0,
            frames_with_violations: 0,
            violations: Vec::new(),
        }
    }

    /// Count one decoded frame and keep its result if any rule fired.
    pub fn record(&mut self, result: Option<FrameResult>) {
        self.total_frames += 1;
        if let Some(result) = result.filter(FrameResult::has_violations) {
            self.violations.push(result);
            self.frames_with_violations = self.violations.len();
        }
    }

    /// Share of decoded frames that had violations, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn violation_ratio(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.frames_with_violations as f64 / self.total_frames as f64
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to an indented JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid report document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, Point2D};

    fn violation_frame(frame_index: usize) -> FrameResult {
        FrameResult {
            frame_index,
            violations: vec!["Knee is ahead of ankle".to_string()],
            keypoints: [(Landmark::LeftKnee, Point2D::new(0.6123, 0.7))]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_speed() {
        let speed = Speed::new(10.0, 20.0, 5.0);
        assert!((speed.total() - 35.0).abs() < 1e-6);
        assert!(Speed::default().total().abs() < 1e-12);
    }

    #[test]
    fn test_record_counts_every_frame() {
        let mut report = AnalysisReport::new();
        report.record(None);
        report.record(Some(FrameResult::empty(2)));
        report.record(Some(violation_frame(3)));

        assert_eq!(report.total_frames, 3);
        assert_eq!(report.frames_with_violations, 1);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].frame_index, 3);
        assert!((report.violation_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = AnalysisReport::new();
        report.record(Some(violation_frame(1)));

        let json = report.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"total_frames":1,"frames_with_violations":1,"violations":[{"frame":1,"violations":["Knee is ahead of ankle"],"keypoints":{"LEFT_KNEE":[0.6123,0.7]}}]}"#
        );
        assert_eq!(AnalysisReport::from_json(&json).unwrap(), report);
    }

    #[test]
    fn test_feedback_json_shape() {
        let feedback = FrameResult::empty(0).into_feedback();
        assert_eq!(feedback.to_json().unwrap(), r#"{"violations":[],"keypoints":{}}"#);

        let feedback = violation_frame(0).into_feedback();
        let back = FrameFeedback::from_json(&feedback.to_json().unwrap()).unwrap();
        assert_eq!(back, feedback);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(AnalysisReport::from_json("{\"total_frames\": \"many\"}").is_err());
    }

    #[test]
    fn test_empty_report_ratio() {
        assert!(AnalysisReport::new().violation_ratio().abs() < 1e-12);
    }
}
