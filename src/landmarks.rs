// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Landmark vocabulary and per-frame landmark sets.
//!
//! The vocabulary is the 33-point full-body topology emitted by BlazePose-style
//! landmark models. Variants are declared in model output order, so
//! [`Landmark::from_index`] maps a tensor row straight to a name.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PostureError, Result};

/// Number of landmarks in the provider vocabulary.
pub const NUM_LANDMARKS: usize = 33;

/// Decimal places kept in keypoint snapshots.
pub const SNAPSHOT_DECIMALS: i32 = 4;

/// A named anatomical keypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Landmark {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl Landmark {
    /// All landmarks in model output order.
    pub const ALL: [Self; NUM_LANDMARKS] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    /// Landmark at a model output index, if the index is in the vocabulary.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Model output index of this landmark.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Upper snake case name, e.g. `LEFT_SHOULDER`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nose => "NOSE",
            Self::LeftEyeInner => "LEFT_EYE_INNER",
            Self::LeftEye => "LEFT_EYE",
            Self::LeftEyeOuter => "LEFT_EYE_OUTER",
            Self::RightEyeInner => "RIGHT_EYE_INNER",
            Self::RightEye => "RIGHT_EYE",
            Self::RightEyeOuter => "RIGHT_EYE_OUTER",
            Self::LeftEar => "LEFT_EAR",
            Self::RightEar => "RIGHT_EAR",
            Self::MouthLeft => "MOUTH_LEFT",
            Self::MouthRight => "MOUTH_RIGHT",
            Self::LeftShoulder => "LEFT_SHOULDER",
            Self::RightShoulder => "RIGHT_SHOULDER",
            Self::LeftElbow => "LEFT_ELBOW",
            Self::RightElbow => "RIGHT_ELBOW",
            Self::LeftWrist => "LEFT_WRIST",
            Self::RightWrist => "RIGHT_WRIST",
            Self::LeftPinky => "LEFT_PINKY",
            Self::RightPinky => "RIGHT_PINKY",
            Self::LeftIndex => "LEFT_INDEX",
            Self::RightIndex => "RIGHT_INDEX",
            Self::LeftThumb => "LEFT_THUMB",
            Self::RightThumb => "RIGHT_THUMB",
            Self::LeftHip => "LEFT_HIP",
            Self::RightHip => "RIGHT_HIP",
            Self::LeftKnee => "LEFT_KNEE",
            Self::RightKnee => "RIGHT_KNEE",
            Self::LeftAnkle => "LEFT_ANKLE",
            Self::RightAnkle => "RIGHT_ANKLE",
            Self::LeftHeel => "LEFT_HEEL",
            Self::RightHeel => "RIGHT_HEEL",
            Self::LeftFootIndex => "LEFT_FOOT_INDEX",
            Self::RightFootIndex => "RIGHT_FOOT_INDEX",
        }
    }
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Landmark {
    type Err = PostureError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|lm| lm.name() == upper)
            .ok_or_else(|| PostureError::Config(format!("Unknown landmark name: {s}")))
    }
}

/// Skeleton connections drawn over violation frames.
pub const POSE_CONNECTIONS: [(Landmark, Landmark); 12] = [
    (Landmark::LeftShoulder, Landmark::RightShoulder),
    (Landmark::LeftShoulder, Landmark::LeftElbow),
    (Landmark::LeftElbow, Landmark::LeftWrist),
    (Landmark::RightShoulder, Landmark::RightElbow),
    (Landmark::RightElbow, Landmark::RightWrist),
    (Landmark::LeftShoulder, Landmark::LeftHip),
    (Landmark::RightShoulder, Landmark::RightHip),
    (Landmark::LeftHip, Landmark::RightHip),
    (Landmark::LeftHip, Landmark::LeftKnee),
    (Landmark::LeftKnee, Landmark::LeftAnkle),
    (Landmark::RightHip, Landmark::RightKnee),
    (Landmark::RightKnee, Landmark::RightAnkle),
];

/// Normalized image coordinate, origin top-left, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round both coordinates to `decimals` places.
    #[must_use]
    pub fn rounded(self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        Self {
            x: (self.x * factor).round() / factor,
            y: (self.y * factor).round() / factor,
        }
    }
}

impl From<[f64; 2]> for Point2D {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point2D> for [f64; 2] {
    fn from(p: Point2D) -> Self {
        [p.x, p.y]
    }
}

/// Landmarks detected in one frame, ordered by model output index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(BTreeMap<Landmark, Point2D>);

impl LandmarkSet {
    /// Create an empty landmark set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or replace a landmark.
    pub fn insert(&mut self, landmark: Landmark, point: Point2D) {
        self.0.insert(landmark, point);
    }

    /// Coordinates of a landmark, if present.
    #[must_use]
    pub fn get(&self, landmark: Landmark) -> Option<Point2D> {
        self.0.get(&landmark).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate landmarks in model output order.
    pub fn iter(&self) -> impl Iterator<Item = (Landmark, Point2D)> + '_ {
        self.0.iter().map(|(lm, p)| (*lm, *p))
    }

    /// Copy of this set with every coordinate rounded to `decimals` places.
    #[must_use]
    pub fn rounded(&self, decimals: i32) -> Self {
        self.iter().map(|(lm, p)| (lm, p.rounded(decimals))).collect()
    }
}

impl FromIterator<(Landmark, Point2D)> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = (Landmark, Point2D)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Look up a landmark the rules depend on.
///
/// # Errors
///
/// Returns [`PostureError::MissingLandmark`] if the set does not contain `landmark`.
pub fn point(landmarks: &LandmarkSet, landmark: Landmark) -> Result<Point2D> {
    landmarks
        .get(landmark)
        .ok_or(PostureError::MissingLandmark(landmark))
}
