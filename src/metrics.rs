//! Visual signals extracted from a pair of frames of the same camera.
//!
//! All metrics are computed on 8-bit luma after both frames have been
//! scaled to a common width, so they do not depend on the camera's native
//! resolution.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TARGET_WIDTH: u32 = 640;
const EDGE_LOW_THRESHOLD: f32 = 50.0;
const EDGE_HIGH_THRESHOLD: f32 = 150.0;
/// Sigma of a 5x5 gaussian kernel
const BLUR_SIGMA: f32 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawMetrics {
    /// Mean luma of the newer frame, 0-255
    pub brightness: f64,
    /// Fraction of edge pixels in the newer frame, 0-1
    pub edge_density: f64,
    /// Mean absolute luma difference between the frames, 0-255
    pub motion_score: f64,
    /// Fraction of dark foreground pixels under an Otsu threshold, 0-1
    pub occupancy_score: f64,
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("frame has no pixels")]
    EmptyFrame,
    #[error("frames differ in shape after scaling: {first:?} vs {second:?}")]
    ShapeMismatch {
        first: (u32, u32),
        second: (u32, u32),
    },
}

#[derive(Debug, Clone)]
pub struct MetricExtractor {
    target_width: u32,
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_WIDTH)
    }
}

impl MetricExtractor {
    pub fn new(target_width: u32) -> Self {
        Self {
            target_width: target_width.max(1),
        }
    }

    /// `first` is the older capture, `second` the newer one.
    pub fn extract(
        &self,
        first: &DynamicImage,
        second: &DynamicImage,
    ) -> Result<RawMetrics, MetricsError> {
        let older = self.normalize(first)?;
        let newer = self.normalize(second)?;
        if older.dimensions() != newer.dimensions() {
            return Err(MetricsError::ShapeMismatch {
                first: older.dimensions(),
                second: newer.dimensions(),
            });
        }

        Ok(RawMetrics {
            brightness: mean_luma(&newer),
            edge_density: edge_density(&newer),
            motion_score: mean_abs_diff(&older, &newer),
            occupancy_score: occupancy(&newer),
        })
    }

    fn normalize(&self, frame: &DynamicImage) -> Result<GrayImage, MetricsError> {
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return Err(MetricsError::EmptyFrame);
        }
        let gray = bt601_luma(frame);
        if width == self.target_width {
            return Ok(gray);
        }
        let scaled_height =
            ((u64::from(height) * u64::from(self.target_width)) / u64::from(width)).max(1) as u32;
        Ok(imageops::resize(
            &gray,
            self.target_width,
            scaled_height,
            FilterType::Triangle,
        ))
    }
}

/// Integer BT.601 luma (0.299, 0.587, 0.114), rounded to nearest.
fn bt601_luma(frame: &DynamicImage) -> GrayImage {
    let rgb = frame.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
        Luma([((weighted + 500) / 1000) as u8])
    })
}

fn pixel_count(image: &GrayImage) -> f64 {
    f64::from(image.width()) * f64::from(image.height())
}

fn mean_luma(image: &GrayImage) -> f64 {
    let sum: u64 = image.pixels().map(|p| u64::from(p.0[0])).sum();
    sum as f64 / pixel_count(image)
}

fn edge_density(image: &GrayImage) -> f64 {
    let blurred = imageproc::filter::gaussian_blur_f32(image, BLUR_SIGMA);
    let edges = imageproc::edges::canny(&blurred, EDGE_LOW_THRESHOLD, EDGE_HIGH_THRESHOLD);
    let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count();
    edge_pixels as f64 / pixel_count(&edges)
}

fn mean_abs_diff(older: &GrayImage, newer: &GrayImage) -> f64 {
    let sum: u64 = older
        .pixels()
        .zip(newer.pixels())
        .map(|(a, b)| u64::from(a.0[0].abs_diff(b.0[0])))
        .sum();
    sum as f64 / pixel_count(newer)
}

/// Pixels at or below the Otsu level count as foreground (inverted binarisation).
fn occupancy(image: &GrayImage) -> f64 {
    let level = imageproc::contrast::otsu_level(image);
    let foreground = image.pixels().filter(|p| p.0[0] <= level).count();
    foreground as f64 / pixel_count(image)
}
