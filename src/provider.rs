// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The landmark provider seam.
//!
//! Everything downstream of pose estimation only depends on this trait, so the
//! ONNX-backed [`crate::PoseModel`] can be swapped for a test double or for a
//! different estimator without touching the rule pipeline.

use image::DynamicImage;

use crate::error::Result;
use crate::landmarks::LandmarkSet;

/// A capability mapping an image to body landmarks.
pub trait LandmarkProvider {
    /// Estimate landmarks for a single image, independently of previous calls.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no person is detected.
    ///
    /// # Errors
    ///
    /// Returns an error if estimation itself failed. Callers processing video
    /// treat this like a frame without detection.
    fn detect(&mut self, image: &DynamicImage) -> Result<Option<LandmarkSet>>;
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for &mut P {
    fn detect(&mut self, image: &DynamicImage) -> Result<Option<LandmarkSet>> {
        (**self).detect(image)
    }
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect(&mut self, image: &DynamicImage) -> Result<Option<LandmarkSet>> {
        (**self).detect(image)
    }
}
