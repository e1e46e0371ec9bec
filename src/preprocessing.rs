// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for the landmark model.
//!
//! Frames are letterboxed into the model's square input: resized with
//! bilinear filtering so the whole body stays visible, centered, padded,
//! normalized to `[0, 1]` and laid out as the model's input tensor expects.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use rayon::prelude::*;

/// Normalized value written into letterbox padding.
pub const LETTERBOX_VALUE: f32 = 0.0;

/// Reciprocal of 255 for normalization.
const INV_255: f32 = 1.0 / 255.0;

/// Memory layout of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[batch, channels, height, width]`.
    #[default]
    Nchw,
    /// `[batch, height, width, channels]`, common for models converted from `TFLite`.
    Nhwc,
}

impl TensorLayout {
    /// Infer the layout from a 4D input shape. Dynamic dimensions are negative.
    #[must_use]
    pub fn from_shape(shape: &[i64]) -> Self {
        match shape {
            [_, c, _, _] if *c == 3 => Self::Nchw,
            [_, _, _, c] if *c == 3 => Self::Nhwc,
            _ => Self::Nchw,
        }
    }
}

/// Result of preprocessing an image, containing the tensor and transform info.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Input tensor normalized to `[0, 1]`.
    pub tensor: Array4<f32>,
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Model input dimensions (height, width).
    pub input_shape: (usize, usize),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
}

impl PreprocessResult {
    /// Map a point in model-input pixels back to normalized coordinates of
    /// the original image.
    #[must_use]
    pub fn to_normalized(&self, x: f32, y: f32) -> (f64, f64) {
        let (orig_h, orig_w) = self.orig_shape;
        let (ox, oy) = scale_point(x, y, self.scale, self.padding);
        (
            f64::from(ox) / f64::from(orig_w.max(1)),
            f64::from(oy) / f64::from(orig_h.max(1)),
        )
    }
}

/// Preprocess an image for the landmark model.
///
/// # Arguments
///
/// * `image` - Input image.
/// * `target_size` - Model input size as (height, width).
/// * `layout` - Tensor layout the model expects.
#[must_use]
pub fn preprocess_image(
    image: &DynamicImage,
    target_size: (usize, usize),
    layout: TensorLayout,
) -> PreprocessResult {
    let (orig_width, orig_height) = image.dimensions();
    let (new_width, new_height, pad_left, pad_top, scale) =
        calculate_letterbox_params(orig_width, orig_height, target_size);

    let resized = imageops::resize(
        &image.to_rgb8(),
        new_width.max(1),
        new_height.max(1),
        FilterType::Triangle,
    );

    let (dst_h, dst_w) = target_size;
    let (pad_top_px, pad_left_px) = (pad_top as usize, pad_left as usize);
    let (new_h_px, new_w_px) = (resized.height() as usize, resized.width() as usize);
    let raw: &[u8] = resized.as_raw();
    let src_stride = new_w_px * 3;
    let content = pad_top_px..pad_top_px + new_h_px;

    let mut data = vec![LETTERBOX_VALUE; 3 * dst_h * dst_w];
    match layout {
        TensorLayout::Nchw => {
            // one chunk per (channel, row)
            data.par_chunks_mut(dst_w).enumerate().for_each(|(i, out)| {
                let (c, dy) = (i / dst_h, i % dst_h);
                if !content.contains(&dy) {
                    return;
                }
                let row = &raw[(dy - pad_top_px) * src_stride..][..src_stride];
                for (dx, px) in row.chunks_exact(3).enumerate() {
                    out[pad_left_px + dx] = f32::from(px[c]) * INV_255;
                }
            });
        }
        TensorLayout::Nhwc => {
            data.par_chunks_mut(dst_w * 3).enumerate().for_each(|(dy, out)| {
                if !content.contains(&dy) {
                    return;
                }
                let row = &raw[(dy - pad_top_px) * src_stride..][..src_stride];
                let start = pad_left_px * 3;
                for (o, &v) in out[start..start + row.len()].iter_mut().zip(row) {
                    *o = f32::from(v) * INV_255;
                }
            });
        }
    }

    let shape = match layout {
        TensorLayout::Nchw => (1, 3, dst_h, dst_w),
        TensorLayout::Nhwc => (1, dst_h, dst_w, 3),
    };
    // data length always matches the shape
    let tensor = Array4::from_shape_vec(shape, data).unwrap_or_else(|_| Array4::zeros(shape));

    PreprocessResult {
        tensor,
        orig_shape: (orig_height, orig_width),
        input_shape: target_size,
        scale,
        padding: (pad_top as f32, pad_left as f32),
    }
}

/// Calculate letterbox resize and padding for fitting an image into `target_size`.
///
/// # Returns
///
/// `(new_width, new_height, pad_left, pad_top, (scale_y, scale_x))`.
fn calculate_letterbox_params(
    orig_width: u32,
    orig_height: u32,
    target_size: (usize, usize),
) -> (u32, u32, u32, u32, (f32, f32)) {
    let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
    let (orig_h, orig_w) = (orig_height.max(1) as f32, orig_width.max(1) as f32);

    // Scale to fit within target while maintaining aspect ratio
    let scale = (target_h / orig_h).min(target_w / orig_w);

    let new_w = ((orig_w * scale).round() as u32).min(target_size.1 as u32);
    let new_h = ((orig_h * scale).round() as u32).min(target_size.0 as u32);

    let pad_left = (target_size.1 as u32).saturating_sub(new_w) / 2;
    let pad_top = (target_size.0 as u32).saturating_sub(new_h) / 2;

    let scale_x = new_w as f32 / orig_w;
    let scale_y = new_h as f32 / orig_h;

    (new_w, new_h, pad_left, pad_top, (scale_y, scale_x))
}

/// Map a point from letterboxed input space back to original image pixels.
#[must_use]
pub fn scale_point(x: f32, y: f32, scale: (f32, f32), padding: (f32, f32)) -> (f32, f32) {
    let (scale_y, scale_x) = scale;
    let (pad_top, pad_left) = padding;
    ((x - pad_left) / scale_x, (y - pad_top) / scale_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_letterbox_params_square() {
        let (new_w, new_h, pad_left, pad_top, scale) =
            calculate_letterbox_params(512, 512, (256, 256));
        assert_eq!((new_w, new_h), (256, 256));
        assert_eq!((pad_left, pad_top), (0, 0));
        assert!((scale.0 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_params_portrait() {
        // 640x1280 portrait into 256x256 => 128x256, padded 64 on each side
        let (new_w, new_h, pad_left, pad_top, _) =
            calculate_letterbox_params(640, 1280, (256, 256));
        assert_eq!((new_w, new_h), (128, 256));
        assert_eq!((pad_left, pad_top), (64, 0));
    }

    #[test]
    fn test_scale_point() {
        let (x, y) = scale_point(164.0, 128.0, (0.2, 0.2), (0.0, 64.0));
        assert!((x - 500.0).abs() < 1e-3);
        assert!((y - 640.0).abs() < 1e-3);
    }

    #[test]
    fn test_preprocess_nchw() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 50, Rgb([255, 0, 51])));
        let result = preprocess_image(&img, (64, 64), TensorLayout::Nchw);

        assert_eq!(result.tensor.shape(), &[1, 3, 64, 64]);
        assert_eq!(result.orig_shape, (50, 100));
        assert!((result.padding.0 - 16.0).abs() < f32::EPSILON);

        // padding rows stay at the letterbox value
        assert!((result.tensor[[0, 0, 0, 10]] - LETTERBOX_VALUE).abs() < f32::EPSILON);
        // image rows carry the normalized color
        assert!((result.tensor[[0, 0, 32, 32]] - 1.0).abs() < 1e-6);
        assert!(result.tensor[[0, 1, 32, 32]].abs() < 1e-6);
        assert!((result.tensor[[0, 2, 32, 32]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_nhwc() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 100, Rgb([255, 0, 51])));
        let result = preprocess_image(&img, (64, 64), TensorLayout::Nhwc);

        assert_eq!(result.tensor.shape(), &[1, 64, 64, 3]);
        assert!((result.padding.1 - 16.0).abs() < f32::EPSILON);
        assert!((result.tensor[[0, 32, 5, 0]] - LETTERBOX_VALUE).abs() < f32::EPSILON);
        assert!((result.tensor[[0, 32, 32, 0]] - 1.0).abs() < 1e-6);
        assert!((result.tensor[[0, 32, 32, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_to_normalized_inverts_letterbox() {
        let img = DynamicImage::new_rgb8(200, 100);
        let result = preprocess_image(&img, (64, 64), TensorLayout::Nchw);
        // center of the input is the center of the original
        let (x, y) = result.to_normalized(32.0, 32.0);
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 0.5).abs() < 1e-6);
        // top-left corner of the image content
        let (x, y) = result.to_normalized(0.0, 16.0);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_layout_from_shape() {
        assert_eq!(TensorLayout::from_shape(&[1, 3, 256, 256]), TensorLayout::Nchw);
        assert_eq!(TensorLayout::from_shape(&[1, 256, 256, 3]), TensorLayout::Nhwc);
        assert_eq!(TensorLayout::from_shape(&[-1, 3, -1, -1]), TensorLayout::Nchw);
    }
}
