// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Single-frame processing: landmark detection followed by rule evaluation.

use image::DynamicImage;

use crate::config::KeypointPolicy;
use crate::error::Result;
use crate::landmarks::{LandmarkSet, SNAPSHOT_DECIMALS};
use crate::provider::LandmarkProvider;
use crate::results::FrameResult;
use crate::rules;

/// Runs the landmark provider and the rule engine on one frame at a time.
///
/// The processor keeps no state between frames; the only thing it owns is
/// the provider.
#[derive(Debug)]
pub struct FrameProcessor<P> {
    provider: P,
    keypoint_policy: KeypointPolicy,
}

impl<P: LandmarkProvider> FrameProcessor<P> {
    /// Create a processor with the default keypoint policy.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            keypoint_policy: KeypointPolicy::default(),
        }
    }

    /// Set when keypoint snapshots are attached.
    #[must_use]
    pub fn with_keypoint_policy(mut self, policy: KeypointPolicy) -> Self {
        self.keypoint_policy = policy;
        self
    }

    /// Analyze one image.
    ///
    /// A provider failure is logged and handled like a frame without
    /// detection, so one bad frame never aborts a video.
    ///
    /// # Arguments
    ///
    /// * `image` - Decoded frame.
    /// * `frame_index` - 1-based video frame index, 0 for still images.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PostureError::MissingLandmark`] if the provider
    /// reported a detection without one of the landmarks the rules need.
    pub fn process(&mut self, image: &DynamicImage, frame_index: usize) -> Result<FrameResult> {
        let landmarks = match self.provider.detect(image) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => return Ok(FrameResult::empty(frame_index)),
            Err(e) => {
                crate::warn!("Landmark detection failed on frame {frame_index}: {e}");
                return Ok(FrameResult::empty(frame_index));
            }
        };

        let violations = rules::evaluate(&landmarks)?;

        let keypoints = if !violations.is_empty() || self.keypoint_policy == KeypointPolicy::Always
        {
            landmarks.rounded(SNAPSHOT_DECIMALS)
        } else {
            LandmarkSet::new()
        };

        Ok(FrameResult {
            frame_index,
            violations,
            keypoints,
        })
    }

    /// Access the provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PostureError;
    use crate::landmarks::{Landmark, Point2D};

    struct Fixed(Result<Option<LandmarkSet>>);

    impl LandmarkProvider for Fixed {
        fn detect(&mut self, _image: &DynamicImage) -> Result<Option<LandmarkSet>> {
            match &self.0 {
                Ok(set) => Ok(set.clone()),
                Err(e) => Err(PostureError::Inference(e.to_string())),
            }
        }
    }

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(8, 8)
    }

    fn full_body(ear: (f64, f64)) -> LandmarkSet {
        let mut set: LandmarkSet = Landmark::ALL
            .iter()
            .map(|&lm| (lm, Point2D::new(0.123_456_78, 0.876_543_21)))
            .collect();
        set.insert(Landmark::LeftEar, Point2D::new(ear.0, ear.1));
        set.insert(Landmark::LeftShoulder, Point2D::new(0.5, 0.3));
        set.insert(Landmark::LeftHip, Point2D::new(0.5, 0.6));
        set.insert(Landmark::LeftKnee, Point2D::new(0.5, 0.8));
        set.insert(Landmark::LeftAnkle, Point2D::new(0.55, 0.95));
        set
    }

    #[test]
    fn test_no_detection() {
        let mut processor = FrameProcessor::new(Fixed(Ok(None)));
        let result = processor.process(&blank(), 7).unwrap();
        assert_eq!(result, FrameResult::empty(7));
    }

    #[test]
    fn test_provider_error_is_absorbed() {
        let mut processor =
            FrameProcessor::new(Fixed(Err(PostureError::Inference("boom".to_string()))));
        let result = processor.process(&blank(), 3).unwrap();
        assert!(!result.has_violations());
        assert!(result.keypoints.is_empty());
    }

    #[test]
    fn test_violation_snapshots_all_landmarks_rounded() {
        // ear straight above the shoulder fires the neck rule
        let mut processor = FrameProcessor::new(Fixed(Ok(Some(full_body((0.5, 0.15))))));
        let result = processor.process(&blank(), 1).unwrap();

        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.keypoints.len(), Landmark::ALL.len());
        let nose = result.keypoints.get(Landmark::Nose).unwrap();
        assert!((nose.x - 0.1235).abs() < 1e-12);
        assert!((nose.y - 0.8765).abs() < 1e-12);
    }

    #[test]
    fn test_clean_frame_has_no_keypoints() {
        let mut processor = FrameProcessor::new(Fixed(Ok(Some(full_body((0.52, 0.5))))));
        let result = processor.process(&blank(), 1).unwrap();
        assert!(!result.has_violations());
        assert!(result.keypoints.is_empty());
    }

    #[test]
    fn test_always_policy_keeps_keypoints() {
        let mut processor = FrameProcessor::new(Fixed(Ok(Some(full_body((0.52, 0.5))))))
            .with_keypoint_policy(KeypointPolicy::Always);
        let result = processor.process(&blank(), 1).unwrap();
        assert!(!result.has_violations());
        assert_eq!(result.keypoints.len(), Landmark::ALL.len());
    }

    #[test]
    fn test_missing_landmark_propagates() {
        let partial: LandmarkSet = [(Landmark::Nose, Point2D::new(0.5, 0.5))]
            .into_iter()
            .collect();
        let mut processor = FrameProcessor::new(Fixed(Ok(Some(partial))));
        assert!(matches!(
            processor.process(&blank(), 1),
            Err(PostureError::MissingLandmark(_))
        ));
    }
}
