// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Joint angle geometry.

use crate::landmarks::Point2D;

/// Guards the cosine division when a segment has near-zero length.
const EPS: f64 = 1e-6;

/// Angle in degrees at vertex `b` between rays `b→a` and `b→c`.
///
/// Coincident points do not fail: a zero-length ray gives a zero dot product
/// and the result settles at 90°.
///
/// # Arguments
///
/// * `a` - End point of the first ray.
/// * `b` - Vertex.
/// * `c` - End point of the second ray.
///
/// # Returns
///
/// Angle in `[0, 180]` degrees.
#[must_use]
pub fn angle_at(a: Point2D, b: Point2D, c: Point2D) -> f64 {
    let (bax, bay) = (a.x - b.x, a.y - b.y);
    let (bcx, bcy) = (c.x - b.x, c.y - b.y);

    let dot = bax.mul_add(bcx, bay * bcy);
    let norms = bax.hypot(bay) * bcx.hypot(bcy);

    // acos is undefined outside [-1, 1]; rounding can push the ratio just past it
    let cosine = (dot / (norms + EPS)).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}
