// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Drawing keypoint snapshots onto frames and saving them.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::error::{PostureError, Result};
use crate::landmarks::{Landmark, LandmarkSet, POSE_CONNECTIONS, Point2D};
use crate::results::FrameResult;

/// Skeleton limb colors, cycled over the connections.
pub const POSE_COLORS: [[u8; 3]; 6] = [
    [255, 128, 0],   // #ff8000
    [255, 153, 51],  // #ff9933
    [153, 204, 255], // #99ccff
    [102, 178, 255], // #66b2ff
    [153, 255, 153], // #99ff99
    [51, 255, 51],   // #33ff33
];

/// Color of the ear-to-ankle chain the posture rules measure.
pub const RULE_COLOR: Rgb<u8> = Rgb([255, 51, 51]);

/// Joint dot color.
pub const JOINT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Landmarks the rules measure, head to foot.
const RULE_CHAIN: [Landmark; 5] = [
    Landmark::LeftEar,
    Landmark::LeftShoulder,
    Landmark::LeftHip,
    Landmark::LeftKnee,
    Landmark::LeftAnkle,
];

/// Find the next available run directory (analyze, analyze2, analyze3, etc.)
#[must_use]
pub fn find_next_run_dir(base: &Path, prefix: &str) -> PathBuf {
    let first = base.join(prefix);
    if !first.exists() {
        return first;
    }

    (2..)
        .map(|i| base.join(format!("{prefix}{i}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

fn to_pixels(p: Point2D, width: u32, height: u32) -> (f32, f32) {
    ((p.x * f64::from(width)) as f32, (p.y * f64::from(height)) as f32)
}

/// Draw a keypoint snapshot onto an image.
///
/// Limbs come first, then the rule chain on top of them, then a dot per
/// landmark. Landmarks outside the frame are clipped by the drawing routines.
#[must_use]
pub fn annotate_image(image: &DynamicImage, keypoints: &LandmarkSet) -> DynamicImage {
    let mut img: RgbImage = image.to_rgb8();
    let (width, height) = img.dimensions();
    let radius = (width.min(height) / 150).max(2) as i32;

    let px = |lm: Landmark| keypoints.get(lm).map(|p| to_pixels(p, width, height));

    for (i, &(a, b)) in POSE_CONNECTIONS.iter().enumerate() {
        if let (Some(start), Some(end)) = (px(a), px(b)) {
            let color = Rgb(POSE_COLORS[i % POSE_COLORS.len()]);
            draw_line_segment_mut(&mut img, start, end, color);
        }
    }

    for pair in RULE_CHAIN.windows(2) {
        if let (Some(start), Some(end)) = (px(pair[0]), px(pair[1])) {
            // two passes one pixel apart for a thicker stroke
            draw_line_segment_mut(&mut img, start, end, RULE_COLOR);
            let shifted = ((start.0 + 1.0, start.1), (end.0 + 1.0, end.1));
            draw_line_segment_mut(&mut img, shifted.0, shifted.1, RULE_COLOR);
        }
    }

    for (_, point) in keypoints.iter() {
        let (x, y) = to_pixels(point, width, height);
        let center = (x.round() as i32, y.round() as i32);
        draw_filled_circle_mut(&mut img, center, radius, JOINT_COLOR);
    }

    DynamicImage::ImageRgb8(img)
}

/// Saves annotated violation frames into a run directory.
#[derive(Debug)]
pub struct AnnotationSaver {
    save_dir: PathBuf,
    saved: usize,
}

impl AnnotationSaver {
    /// Create a saver writing into `save_dir`. The directory is created on
    /// the first save.
    #[must_use]
    pub const fn new(save_dir: PathBuf) -> Self {
        Self { save_dir, saved: 0 }
    }

    /// Directory frames are written to.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Number of frames saved so far.
    #[must_use]
    pub const fn saved(&self) -> usize {
        self.saved
    }

    /// Annotate and save one analyzed frame.
    ///
    /// Video frames are named `{stem}_{frame}.jpg`; a still image keeps the
    /// source file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the image
    /// cannot be encoded.
    pub fn save(
        &mut self,
        source: &Path,
        image: &DynamicImage,
        result: &FrameResult,
    ) -> Result<PathBuf> {
        let filename = if result.frame_index > 0 {
            format!(
                "{}_{}.jpg",
                source.file_stem().unwrap_or_default().to_string_lossy(),
                result.frame_index
            )
        } else {
            source
                .file_name()
                .map_or_else(|| "image.jpg".to_string(), |n| n.to_string_lossy().to_string())
        };

        if !self.save_dir.exists() {
            std::fs::create_dir_all(&self.save_dir)?;
        }

        let save_path = self.save_dir.join(filename);
        annotate_image(image, &result.keypoints)
            .save(&save_path)
            .map_err(|e| {
                PostureError::Io(std::io::Error::other(format!("{}: {e}", save_path.display())))
            })?;

        self.saved += 1;
        Ok(save_path)
    }
}
