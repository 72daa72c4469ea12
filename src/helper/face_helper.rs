use std::io::Cursor;

use anyhow::{Context, Error};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use nalgebra::{Matrix3, Point2, Rotation2, Similarity2, Vector2};
use ndarray::{Array1, Axis};
use serde::Serialize;

use crate::utils::coordinate::{LandmarkName, LandmarkSet, Point2D};
use crate::utils::image::{convert_bytes_to_image, convert_common_landmarks_to_ndarray};

const DEFAULT_MIN_COMMON_POINTS: usize = 3;

/// Similarity transform taking the before face onto the after face.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentTransform {
    /// Shift between the two landmark centroids in pixels.
    pub offset: Point2D,
    pub rotation_deg: f64,
    pub scale: f64,
    pub points_used: usize,
    #[serde(skip)]
    pub similarity: Similarity2<f64>,
}

impl AlignmentTransform {
    /// Homogeneous 3x3 matrix of the transform.
    pub fn matrix(&self) -> Matrix3<f64> {
        self.similarity.to_homogeneous()
    }

    pub fn apply(&self, point: Point2D) -> Point2D {
        let mapped = self.similarity.transform_point(&Point2::new(point.x, point.y));
        Point2D::new(mapped.x, mapped.y)
    }
}

#[derive(Debug, Clone)]
pub struct FaceHelper {
    min_common_points: usize,
}

impl FaceHelper {
    /// new initializes new instance of face helper module.
    pub fn new(min_common_points: Option<usize>) -> Self {
        FaceHelper {
            min_common_points: min_common_points.unwrap_or(DEFAULT_MIN_COMMON_POINTS).max(DEFAULT_MIN_COMMON_POINTS),
        }
    }

    /// estimate_alignment fits the least-squares similarity transform mapping
    /// `before` onto `after` over the landmarks both sets share.
    ///
    /// # Returns
    ///
    /// `None` when an eye is missing on either side, fewer than the minimum
    /// number of landmarks are shared, or the fit is degenerate.
    pub fn estimate_alignment(&self, before: &LandmarkSet, after: &LandmarkSet) -> Option<AlignmentTransform> {
        for eye in [LandmarkName::LeftEye, LandmarkName::RightEye] {
            if !before.contains(eye) || !after.contains(eye) {
                tracing::debug!("alignment needs {eye} on both faces");
                return None;
            }
        }

        let (names, src, dst) = convert_common_landmarks_to_ndarray(before, after).ok()?;
        if names.len() < self.min_common_points {
            tracing::debug!("alignment needs {} common landmarks, got {}", self.min_common_points, names.len());
            return None;
        }

        let src_center: Array1<f64> = src.mean_axis(Axis(0))?;
        let dst_center: Array1<f64> = dst.mean_axis(Axis(0))?;
        let a = &src - &src_center;
        let b = &dst - &dst_center;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut norm = 0.0;
        for (pa, pb) in a.outer_iter().zip(b.outer_iter()) {
            sxx += pa[0] * pb[0] + pa[1] * pb[1];
            sxy += pa[0] * pb[1] - pa[1] * pb[0];
            norm += pa[0] * pa[0] + pa[1] * pa[1];
        }
        if norm <= f64::EPSILON {
            return None;
        }

        let angle = sxy.atan2(sxx);
        let scale = sxx.hypot(sxy) / norm;
        if !scale.is_finite() || scale <= f64::EPSILON {
            return None;
        }

        let src_center = Vector2::new(src_center[0], src_center[1]);
        let dst_center = Vector2::new(dst_center[0], dst_center[1]);
        let rotated = Rotation2::new(angle) * src_center * scale;
        let similarity = Similarity2::new(dst_center - rotated, angle, scale);

        Some(AlignmentTransform {
            offset: Point2D::from(dst_center - src_center),
            rotation_deg: angle.to_degrees(),
            scale,
            points_used: names.len(),
            similarity,
        })
    }
}

/// Re-renders the before image in the pose of the after image.
pub trait ImageWarper: Send + Sync {
    fn warp(&self, before: &[u8], after: &[u8], transform: &AlignmentTransform) -> Result<Vec<u8>, Error>;
}

/// Bilinear warp onto a canvas the size of the after image, encoded as PNG.
#[derive(Debug, Clone, Default)]
pub struct AffineImageWarper;

impl ImageWarper for AffineImageWarper {
    fn warp(&self, before: &[u8], after: &[u8], transform: &AlignmentTransform) -> Result<Vec<u8>, Error> {
        let source = convert_bytes_to_image(before)?.to_rgba8();
        let target = convert_bytes_to_image(after)?;

        let m = transform.matrix();
        let mut values = [0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                values[row * 3 + col] = m[(row, col)] as f32;
            }
        }
        let projection = Projection::from_matrix(values)
            .ok_or_else(|| Error::msg("face_helper - alignment matrix is not invertible"))?;

        let mut canvas = RgbaImage::new(target.width(), target.height());
        warp_into(&source, &projection, Interpolation::Bilinear, Rgba([0, 0, 0, 0]), &mut canvas);

        let mut encoded = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .context("face_helper - cannot encode aligned image")?;
        Ok(encoded)
    }
}
