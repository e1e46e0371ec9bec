// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Post-processing for landmark model outputs.
//!
//! A single-person landmark model emits a flat landmark tensor, usually
//! alongside a one-element pose presence score and auxiliary outputs such as
//! segmentation masks or world coordinates. This module picks the relevant
//! outputs, undoes the letterbox transform and builds a [`LandmarkSet`] in
//! normalized image coordinates.

#![allow(clippy::cast_precision_loss)]

use crate::error::{PostureError, Result};
use crate::landmarks::{Landmark, LandmarkSet, NUM_LANDMARKS, Point2D};
use crate::preprocessing::PreprocessResult;

/// Landmark counts a model may emit. The extra 6 are auxiliary ROI points.
const LANDMARK_COUNTS: [usize; 2] = [39, NUM_LANDMARKS];

/// Values per landmark: x, y and optionally z, visibility and presence.
const VALUES_PER_LANDMARK: std::ops::RangeInclusive<usize> = 2..=5;

/// Median landmark magnitude above which coordinates are input pixels.
const PIXEL_COORDINATE_THRESHOLD: f32 = 1.5;

/// Output name fragments of presence scores that are already probabilities.
const PROBABILITY_NAME_HINTS: [&str; 3] = ["prob", "sigmoid", "confidence"];

/// One raw model output.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    /// Output tensor name.
    pub name: String,
    /// Flattened data.
    pub data: Vec<f32>,
    /// Tensor shape.
    pub shape: Vec<usize>,
}

impl RawOutput {
    /// Create a raw output from its name, data and shape.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Vec<f32>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            data,
            shape,
        }
    }
}

/// How a model reports its pose presence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceScale {
    /// Raw logit, passed through a sigmoid.
    #[default]
    Logit,
    /// Already a probability in `[0, 1]`.
    Probability,
}

impl PresenceScale {
    /// Guess the scale from the presence output's name.
    ///
    /// Landmark models usually export the presence flag as a logit, so only
    /// names that say otherwise select [`PresenceScale::Probability`].
    #[must_use]
    pub fn from_output_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if PROBABILITY_NAME_HINTS.iter().any(|hint| name.contains(hint)) {
            Self::Probability
        } else {
            Self::Logit
        }
    }

    /// Convert a raw presence value to a probability.
    #[must_use]
    pub fn probability(self, raw: f32) -> f32 {
        match self {
            Self::Logit => sigmoid(raw),
            Self::Probability => raw,
        }
    }
}

impl std::str::FromStr for PresenceScale {
    type Err = PostureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "logit" => Ok(Self::Logit),
            "probability" | "prob" => Ok(Self::Probability),
            _ => Err(PostureError::Config(format!("Unknown presence scale: {s}"))),
        }
    }
}

/// Coordinate convention of a model's landmark tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSpace {
    /// Fractions of the model input size.
    Normalized,
    /// Pixels of the model input.
    Pixels,
}

impl CoordinateSpace {
    /// Infer the convention from one detection.
    ///
    /// Uses the median landmark magnitude so off-frame joints of a
    /// normalized model cannot flip the decision.
    #[must_use]
    pub fn infer(coords: &[(f32, f32)]) -> Self {
        let mut magnitudes: Vec<f32> = coords
            .iter()
            .map(|&(x, y)| x.abs().max(y.abs()))
            .collect();
        magnitudes.sort_by(f32::total_cmp);
        match magnitudes.get(magnitudes.len() / 2) {
            Some(&median) if median > PIXEL_COORDINATE_THRESHOLD => Self::Pixels,
            _ => Self::Normalized,
        }
    }
}

impl std::str::FromStr for CoordinateSpace {
    type Err = PostureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "normalized" => Ok(Self::Normalized),
            "pixels" | "pixel" => Ok(Self::Pixels),
            _ => Err(PostureError::Config(format!("Unknown coordinate space: {s}"))),
        }
    }
}

/// The model outputs posture analysis needs.
#[derive(Debug, Clone, Copy)]
pub struct LandmarkOutputs<'a> {
    /// Flattened landmark values.
    pub landmarks: &'a [f32],
    /// Number of landmarks and values per landmark.
    pub layout: (usize, usize),
    /// Raw pose presence score, if the model has one.
    pub presence: Option<f32>,
    /// Name of the presence output.
    pub presence_name: Option<&'a str>,
}

/// Work out `(landmarks, values_per_landmark)` for a landmark tensor.
///
/// Accepts `[1, N, k]` as well as flat `[1, N * k]` outputs.
fn landmark_layout(shape: &[usize], len: usize) -> Option<(usize, usize)> {
    if let [_, n, k] = shape
        && LANDMARK_COUNTS.contains(n)
        && VALUES_PER_LANDMARK.contains(k)
    {
        return Some((*n, *k));
    }

    LANDMARK_COUNTS.iter().find_map(|&n| {
        (len % n == 0 && VALUES_PER_LANDMARK.contains(&(len / n))).then_some((n, len / n))
    })
}

/// Pick the landmark tensor and presence score from a model's outputs.
///
/// The first output shaped like a landmark tensor wins; the first
/// one-element output is the presence score.
///
/// # Errors
///
/// Returns [`PostureError::Inference`] if no output looks like landmarks.
pub fn select_outputs(outputs: &[RawOutput]) -> Result<LandmarkOutputs<'_>> {
    let (landmarks, layout) = outputs
        .iter()
        .find_map(|o| landmark_layout(&o.shape, o.data.len()).map(|l| (o.data.as_slice(), l)))
        .ok_or_else(|| {
            let shapes: Vec<_> = outputs.iter().map(|o| &o.shape).collect();
            PostureError::Inference(format!("No landmark output among shapes {shapes:?}"))
        })?;

    let presence = outputs.iter().find(|o| o.data.len() == 1);

    Ok(LandmarkOutputs {
        landmarks,
        layout,
        presence: presence.map(|o| o.data[0]),
        presence_name: presence.map(|o| o.name.as_str()),
    })
}

/// Logistic function.
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Turns the outputs of one landmark model into [`LandmarkSet`]s.
///
/// The presence scale and coordinate space are properties of the model, not
/// of a frame. Whatever is not configured up front is resolved on the first
/// frame that needs it and kept for the decoder's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkDecoder {
    presence: Option<PresenceScale>,
    coordinates: Option<CoordinateSpace>,
    min_confidence: f32,
}

impl LandmarkDecoder {
    /// Create a decoder. `None` conventions are resolved from the model's outputs.
    #[must_use]
    pub const fn new(
        presence: Option<PresenceScale>,
        coordinates: Option<CoordinateSpace>,
        min_confidence: f32,
    ) -> Self {
        Self {
            presence,
            coordinates,
            min_confidence,
        }
    }

    /// Presence scale in use, once known.
    #[must_use]
    pub const fn presence_scale(&self) -> Option<PresenceScale> {
        self.presence
    }

    /// Coordinate space in use, once known.
    #[must_use]
    pub const fn coordinate_space(&self) -> Option<CoordinateSpace> {
        self.coordinates
    }

    /// Build a landmark set from selected model outputs.
    ///
    /// # Arguments
    ///
    /// * `outputs` - Landmark tensor and presence score.
    /// * `preprocess` - Letterbox transform applied to the frame.
    ///
    /// # Returns
    ///
    /// `None` when the presence probability is below the minimum confidence
    /// or the coordinates are not finite.
    pub fn decode(
        &mut self,
        outputs: &LandmarkOutputs<'_>,
        preprocess: &PreprocessResult,
    ) -> Option<LandmarkSet> {
        if let Some(raw) = outputs.presence {
            let scale = *self.presence.get_or_insert_with(|| {
                let scale = outputs
                    .presence_name
                    .map(PresenceScale::from_output_name)
                    .unwrap_or_default();
                crate::verbose!("Presence output read as {scale:?}");
                scale
            });
            let score = scale.probability(raw);
            if score.is_nan() || score < self.min_confidence {
                return None;
            }
        }

        let (count, stride) = outputs.layout;
        let coords: Vec<(f32, f32)> = outputs
            .landmarks
            .chunks_exact(stride)
            .take(count.min(NUM_LANDMARKS))
            .map(|v| (v[0], v[1]))
            .collect();

        if coords.len() < NUM_LANDMARKS
            || coords.iter().any(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return None;
        }

        let space = *self.coordinates.get_or_insert_with(|| {
            let space = CoordinateSpace::infer(&coords);
            crate::verbose!("Landmark coordinates read as {space:?}");
            space
        });

        // normalized model outputs are relative to the letterboxed input
        let (input_h, input_w) = preprocess.input_shape;
        let (sx, sy) = match space {
            CoordinateSpace::Pixels => (1.0, 1.0),
            CoordinateSpace::Normalized => (input_w as f32, input_h as f32),
        };

        Some(
            Landmark::ALL
                .iter()
                .zip(coords)
                .map(|(&lm, (x, y))| {
                    let (nx, ny) = preprocess.to_normalized(x * sx, y * sy);
                    (lm, Point2D::new(nx, ny))
                })
                .collect(),
        )
    }
}
