// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Fixed posture rules and their evaluation.
//!
//! Rules are evaluated in declaration order, which is also the order of the
//! messages they produce: back angle, knee position, neck angle.

use std::fmt;

use crate::error::Result;
use crate::geometry::angle_at;
use crate::landmarks::{Landmark, LandmarkSet, point};

/// Geometric quantity a rule measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// Angle in degrees at `vertex` between rays to `a` and `c`.
    Angle {
        a: Landmark,
        vertex: Landmark,
        c: Landmark,
    },
    /// Horizontal offset `lead.x - reference.x`; positive when `lead` is further right.
    AheadOf { lead: Landmark, reference: Landmark },
}

impl Measure {
    /// Evaluate the measure on a landmark set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PostureError::MissingLandmark`] if a referenced landmark is absent.
    pub fn evaluate(&self, landmarks: &LandmarkSet) -> Result<f64> {
        match *self {
            Self::Angle { a, vertex, c } => Ok(angle_at(
                point(landmarks, a)?,
                point(landmarks, vertex)?,
                point(landmarks, c)?,
            )),
            Self::AheadOf { lead, reference } => {
                Ok(point(landmarks, lead)?.x - point(landmarks, reference)?.x)
            }
        }
    }
}

/// Strict comparison between a measured value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LessThan,
    GreaterThan,
}

impl Comparison {
    /// `true` when `value` breaches `threshold`. Equality never breaches.
    #[must_use]
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::LessThan => value < threshold,
            Self::GreaterThan => value > threshold,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::GreaterThan => ">",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A hand-authored posture rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub measure: Measure,
    pub comparison: Comparison,
    pub threshold: f64,
    /// Message prefix. Angle rules append the measured angle and threshold.
    pub label: &'static str,
}

impl Rule {
    /// Evaluate the rule, returning a violation message if it fires.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PostureError::MissingLandmark`] if a referenced landmark is absent.
    pub fn check(&self, landmarks: &LandmarkSet) -> Result<Option<String>> {
        let value = self.measure.evaluate(landmarks)?;
        if !self.comparison.holds(value, self.threshold) {
            return Ok(None);
        }
        Ok(Some(self.message(value)))
    }

    fn message(&self, value: f64) -> String {
        match self.measure {
            Measure::Angle { .. } => {
                // whole degrees, truncated toward zero
                #[allow(clippy::cast_possible_truncation)]
                let degrees = value.trunc() as i64;
                format!(
                    "{} {degrees}° {} {}°",
                    self.label, self.comparison, self.threshold
                )
            }
            Measure::AheadOf { .. } => self.label.to_string(),
        }
    }
}

/// Back angle (shoulder-hip-knee) below 150 degrees.
pub const BACK_ANGLE: Rule = Rule {
    measure: Measure::Angle {
        a: Landmark::LeftShoulder,
        vertex: Landmark::LeftHip,
        c: Landmark::LeftKnee,
    },
    comparison: Comparison::LessThan,
    threshold: 150.0,
    label: "Back angle",
};

/// Knee horizontally ahead of the ankle.
pub const KNEE_AHEAD: Rule = Rule {
    measure: Measure::AheadOf {
        lead: Landmark::LeftKnee,
        reference: Landmark::LeftAnkle,
    },
    comparison: Comparison::GreaterThan,
    threshold: 0.0,
    label: "Knee is ahead of ankle",
};

/// Neck angle (ear-shoulder-hip) above 30 degrees.
pub const NECK_ANGLE: Rule = Rule {
    measure: Measure::Angle {
        a: Landmark::LeftEar,
        vertex: Landmark::LeftShoulder,
        c: Landmark::LeftHip,
    },
    comparison: Comparison::GreaterThan,
    threshold: 30.0,
    label: "Neck bent",
};

/// The rule set, in evaluation order.
pub const RULES: [Rule; 3] = [BACK_ANGLE, KNEE_AHEAD, NECK_ANGLE];

/// Landmarks every rule evaluation needs.
pub const REQUIRED_LANDMARKS: [Landmark; 5] = [
    Landmark::LeftShoulder,
    Landmark::LeftHip,
    Landmark::LeftKnee,
    Landmark::LeftAnkle,
    Landmark::LeftEar,
];

/// Evaluate every rule against one frame's landmarks.
///
/// # Returns
///
/// Violation messages of the rules that fired, in rule order.
///
/// # Errors
///
/// Returns [`crate::PostureError::MissingLandmark`] if any of
/// [`REQUIRED_LANDMARKS`] is absent, before any rule is evaluated.
pub fn evaluate(landmarks: &LandmarkSet) -> Result<Vec<String>> {
    for landmark in REQUIRED_LANDMARKS {
        point(landmarks, landmark)?;
    }

    let mut violations = Vec::with_capacity(RULES.len());
    for rule in &RULES {
        if let Some(message) = rule.check(landmarks)? {
            violations.push(message);
        }
    }
    Ok(violations)
}
