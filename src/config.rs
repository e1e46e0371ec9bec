// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Analysis configuration.
//!
//! This module defines [`AnalyzerConfig`], which controls frame sampling,
//! keypoint snapshot policy and the landmark model's runtime options.

use crate::device::Device;
use crate::error::{PostureError, Result};
use crate::postprocessing::{CoordinateSpace, PresenceScale};

/// When a frame's keypoint snapshot is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeypointPolicy {
    /// Only frames where at least one rule fired carry keypoints.
    #[default]
    OnViolation,
    /// Every frame with detected landmarks carries keypoints.
    Always,
}

impl std::str::FromStr for KeypointPolicy {
    type Err = PostureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "on-violation" | "on_violation" => Ok(Self::OnViolation),
            "always" => Ok(Self::Always),
            _ => Err(PostureError::Config(format!("Unknown keypoint policy: {s}"))),
        }
    }
}

/// Configuration for posture analysis.
///
/// Uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use posture_inference::{AnalyzerConfig, KeypointPolicy};
///
/// let config = AnalyzerConfig::new()
///     .with_skip_frames(5)
///     .with_min_confidence(0.6)
///     .with_keypoint_policy(KeypointPolicy::Always);
/// assert_eq!(config.skip_frames, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Frame sampling stride. Frame `i` (1-based) is analyzed when `i % skip_frames == 0`.
    pub skip_frames: usize,
    /// Minimum pose presence score for the landmark model to report a detection (0.0 to 1.0).
    pub min_confidence: f32,
    /// Explicit model input size (height, width).
    /// If `None`, the size is read from the model's input shape.
    pub imgsz: Option<(usize, usize)>,
    /// Number of intra-op threads for ONNX Runtime.
    /// Setting this to `0` allows ONNX Runtime to choose.
    pub num_threads: usize,
    /// Execution device for the landmark model.
    pub device: Device,
    /// When keypoint snapshots are attached to frame results.
    pub keypoint_policy: KeypointPolicy,
    /// Scale of the model's presence output.
    /// If `None`, it is guessed from the output name on the first frame.
    pub presence_scale: Option<PresenceScale>,
    /// Coordinate space of the model's landmark output.
    /// If `None`, it is inferred from the first detection.
    pub coordinate_space: Option<CoordinateSpace>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            skip_frames: 1,
            min_confidence: 0.5,
            imgsz: None,
            num_threads: 0,
            device: Device::Cpu,
            keypoint_policy: KeypointPolicy::OnViolation,
            presence_scale: None,
            coordinate_space: None,
        }
    }
}

impl AnalyzerConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame sampling stride (1 = every frame).
    #[must_use]
    pub const fn with_skip_frames(mut self, skip_frames: usize) -> Self {
        self.skip_frames = skip_frames;
        self
    }

    /// Set the minimum pose presence score.
    #[must_use]
    pub const fn with_min_confidence(mut self, threshold: f32) -> Self {
        self.min_confidence = threshold;
        self
    }

    /// Set the model input size.
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the number of ONNX Runtime intra-op threads. `0` lets the runtime decide.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Set the execution device.
    #[must_use]
    pub const fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Set the keypoint snapshot policy.
    #[must_use]
    pub const fn with_keypoint_policy(mut self, policy: KeypointPolicy) -> Self {
        self.keypoint_policy = policy;
        self
    }

    /// Fix the scale of the model's presence output.
    #[must_use]
    pub const fn with_presence_scale(mut self, scale: PresenceScale) -> Self {
        self.presence_scale = Some(scale);
        self
    }

    /// Fix the coordinate space of the model's landmark output.
    #[must_use]
    pub const fn with_coordinate_space(mut self, space: CoordinateSpace) -> Self {
        self.coordinate_space = Some(space);
        self
    }

    /// Check the configuration before an analysis run.
    ///
    /// # Errors
    ///
    /// Returns [`PostureError::Config`] if `skip_frames` is zero or
    /// `min_confidence` is outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.skip_frames == 0 {
            return Err(PostureError::Config(
                "skip_frames must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(PostureError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.skip_frames, 1);
        assert!((config.min_confidence - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.keypoint_policy, KeypointPolicy::OnViolation);
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.presence_scale, None);
        assert_eq!(config.coordinate_space, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = AnalyzerConfig::new()
            .with_skip_frames(3)
            .with_min_confidence(0.7)
            .with_imgsz(256, 256)
            .with_threads(4)
            .with_device(Device::Cuda(1))
            .with_keypoint_policy(KeypointPolicy::Always)
            .with_presence_scale(PresenceScale::Probability)
            .with_coordinate_space(CoordinateSpace::Pixels);

        assert_eq!(config.skip_frames, 3);
        assert!((config.min_confidence - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.imgsz, Some((256, 256)));
        assert_eq!(config.num_threads, 4);
        assert_eq!(config.device, Device::Cuda(1));
        assert_eq!(config.keypoint_policy, KeypointPolicy::Always);
        assert_eq!(config.presence_scale, Some(PresenceScale::Probability));
        assert_eq!(config.coordinate_space, Some(CoordinateSpace::Pixels));
    }

    #[test]
    fn test_validate_rejects_zero_stride() {
        let err = AnalyzerConfig::new().with_skip_frames(0).validate();
        assert!(matches!(err, Err(PostureError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        assert!(AnalyzerConfig::new().with_min_confidence(1.5).validate().is_err());
    }

    #[test]
    fn test_keypoint_policy_parse() {
        assert_eq!(
            "always".parse::<KeypointPolicy>().unwrap(),
            KeypointPolicy::Always
        );
        assert_eq!(
            "on-violation".parse::<KeypointPolicy>().unwrap(),
            KeypointPolicy::OnViolation
        );
        assert!("sometimes".parse::<KeypointPolicy>().is_err());
    }
}
