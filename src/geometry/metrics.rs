//! Named geometric and skin-tone metrics derived from one face.
//!
//! Every metric has exactly one definition. A metric whose landmarks are
//! missing, or whose geometry is degenerate, is left out of the vector
//! instead of being reported as zero.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::config::ScoringConfig;
use crate::error::NormalizationError;
use crate::geometry::normalizer::{normalize, NormalizedLandmarkSet};
use crate::utils::coordinate::{DominantColor, LandmarkName, LandmarkSet, Point2D};
use crate::utils::utils::{bearing_deg, bearing_difference_deg, checked_ratio, included_angle_deg, polygon_area};

use LandmarkName::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "deg")]
    Degree,
    #[serde(rename = "ratio")]
    Ratio,
    #[serde(rename = "level")]
    Level,
    #[serde(rename = "percent")]
    Percent,
}

impl MetricUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            MetricUnit::Millimeter => "mm",
            MetricUnit::Degree => "°",
            MetricUnit::Ratio => "",
            MetricUnit::Level => "",
            MetricUnit::Percent => "%",
        }
    }
}

/// Which landmark frame (or input) a metric is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    /// Raw pixel landmarks, distances scaled to approximate millimetres.
    Measurement,
    /// Eye-normalized landmarks.
    Sagging,
    /// Raw landmarks divided by the inner eye-corner distance.
    Slimming,
    /// Dominant colour samples of the image.
    Skin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricName {
    FaceWidth,
    FaceHeight,
    EyeDistance,
    EyebrowToEyeDistance,
    FaceLiftAngle,
    LowerFaceRatio,
    JawLineAngle,
    MouthCornerDroop,
    CheekDroopIndex,
    JawWidthRatio,
    CheekWidthRatio,
    JawToEyeWidthRatio,
    FaceAreaRatio,
    SkinBrightness,
    SkinSaturation,
}

const NO_LANDMARKS: &[LandmarkName] = &[];

impl MetricName {
    pub const ALL: [MetricName; 15] = [
        MetricName::FaceWidth,
        MetricName::FaceHeight,
        MetricName::EyeDistance,
        MetricName::EyebrowToEyeDistance,
        MetricName::FaceLiftAngle,
        MetricName::LowerFaceRatio,
        MetricName::JawLineAngle,
        MetricName::MouthCornerDroop,
        MetricName::CheekDroopIndex,
        MetricName::JawWidthRatio,
        MetricName::CheekWidthRatio,
        MetricName::JawToEyeWidthRatio,
        MetricName::FaceAreaRatio,
        MetricName::SkinBrightness,
        MetricName::SkinSaturation,
    ];

    pub fn family(&self) -> MetricFamily {
        match self {
            MetricName::FaceWidth
            | MetricName::FaceHeight
            | MetricName::EyeDistance
            | MetricName::EyebrowToEyeDistance
            | MetricName::FaceLiftAngle
            | MetricName::LowerFaceRatio => MetricFamily::Measurement,
            MetricName::JawLineAngle
            | MetricName::MouthCornerDroop
            | MetricName::CheekDroopIndex
            | MetricName::JawWidthRatio => MetricFamily::Sagging,
            MetricName::CheekWidthRatio | MetricName::JawToEyeWidthRatio | MetricName::FaceAreaRatio => {
                MetricFamily::Slimming
            }
            MetricName::SkinBrightness | MetricName::SkinSaturation => MetricFamily::Skin,
        }
    }

    pub fn unit(&self) -> MetricUnit {
        match self {
            MetricName::FaceWidth
            | MetricName::FaceHeight
            | MetricName::EyeDistance
            | MetricName::EyebrowToEyeDistance => MetricUnit::Millimeter,
            MetricName::FaceLiftAngle | MetricName::JawLineAngle | MetricName::MouthCornerDroop => MetricUnit::Degree,
            MetricName::SkinBrightness => MetricUnit::Level,
            MetricName::SkinSaturation => MetricUnit::Percent,
            _ => MetricUnit::Ratio,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricName::FaceWidth => "Face width",
            MetricName::FaceHeight => "Face height",
            MetricName::EyeDistance => "Eye distance",
            MetricName::EyebrowToEyeDistance => "Eyebrow-to-eye distance",
            MetricName::FaceLiftAngle => "Face-lift angle",
            MetricName::LowerFaceRatio => "Lower-face ratio",
            MetricName::JawLineAngle => "Jaw-line angle",
            MetricName::MouthCornerDroop => "Mouth-corner droop",
            MetricName::CheekDroopIndex => "Cheek-droop index",
            MetricName::JawWidthRatio => "Jaw-width ratio",
            MetricName::CheekWidthRatio => "Cheek width ratio",
            MetricName::JawToEyeWidthRatio => "Jaw width ratio (eye-normalized)",
            MetricName::FaceAreaRatio => "Face area ratio",
            MetricName::SkinBrightness => "Skin brightness",
            MetricName::SkinSaturation => "Skin saturation",
        }
    }

    /// Decimals a change is shown with; a change rounding to zero counts as unchanged.
    pub fn display_decimals(&self) -> i32 {
        match self.unit() {
            MetricUnit::Millimeter | MetricUnit::Degree | MetricUnit::Level | MetricUnit::Percent => 1,
            MetricUnit::Ratio => 3,
        }
    }

    /// Landmarks this metric reads, including the eye references of the normalized family.
    pub fn required_landmarks(&self) -> &'static [LandmarkName] {
        match self {
            MetricName::FaceWidth => &[LeftEarTragion, RightEarTragion],
            MetricName::FaceHeight => &[ForeheadGlabella, ChinGnathion],
            MetricName::EyeDistance => &[LeftEye, RightEye],
            MetricName::EyebrowToEyeDistance => &[LeftOfLeftEyebrow, LeftEye],
            MetricName::FaceLiftAngle => &[RightEyeRightCorner, MouthRight, ChinGnathion],
            MetricName::LowerFaceRatio => &[NoseBottomCenter, MouthCenter, ChinGnathion],
            MetricName::JawLineAngle => &[
                LeftEye,
                RightEye,
                ChinLeftGonion,
                ChinRightGonion,
                LeftEarTragion,
                RightEarTragion,
                ChinGnathion,
            ],
            MetricName::MouthCornerDroop => &[LeftEye, RightEye, MouthLeft, MouthRight],
            MetricName::CheekDroopIndex => &[
                LeftEye,
                RightEye,
                LeftEyeLeftCorner,
                RightEyeRightCorner,
                MouthLeft,
                MouthRight,
                LeftCheekCenter,
                RightCheekCenter,
            ],
            MetricName::JawWidthRatio => &[
                LeftEye,
                RightEye,
                ChinLeftGonion,
                ChinRightGonion,
                LeftEarTragion,
                RightEarTragion,
            ],
            MetricName::CheekWidthRatio => &[LeftEyeRightCorner, RightEyeLeftCorner, LeftCheekCenter, RightCheekCenter],
            MetricName::JawToEyeWidthRatio => &[LeftEyeRightCorner, RightEyeLeftCorner, ChinLeftGonion, ChinRightGonion],
            MetricName::FaceAreaRatio => &[
                LeftEyeRightCorner,
                RightEyeLeftCorner,
                LeftEarTragion,
                RightEarTragion,
                ChinGnathion,
                MidpointBetweenEyes,
            ],
            MetricName::SkinBrightness | MetricName::SkinSaturation => NO_LANDMARKS,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Metric values of one face; an absent key means the metric is undefined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricVector {
    values: BTreeMap<MetricName, f64>,
}

impl MetricVector {
    pub fn get(&self, name: MetricName) -> Option<f64> {
        self.values.get(&name).copied()
    }

    pub fn contains(&self, name: MetricName) -> bool {
        self.values.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricName, f64)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }

    fn record(&mut self, name: MetricName, value: Option<f64>) {
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                self.values.insert(name, v);
            }
            None => tracing::debug!("metric {name} is undefined for this face"),
        }
    }
}

impl FromIterator<(MetricName, f64)> for MetricVector {
    fn from_iter<T: IntoIterator<Item = (MetricName, f64)>>(iter: T) -> Self {
        MetricVector {
            values: iter.into_iter().collect(),
        }
    }
}

/// Metrics of one face plus the normalization outcome that shaped them.
#[derive(Debug, Clone)]
pub struct FaceMetrics {
    pub metrics: MetricVector,
    pub normalized: Option<NormalizedLandmarkSet>,
    pub normalization_error: Option<NormalizationError>,
}

#[derive(Debug, Clone)]
pub struct MetricExtractor {
    pixel_to_mm: f64,
    color_samples: usize,
}

impl MetricExtractor {
    pub fn new(config: &ScoringConfig) -> Self {
        MetricExtractor {
            pixel_to_mm: config.pixel_to_mm,
            color_samples: config.color_samples,
        }
    }

    /// Runs every metric family for one face.
    ///
    /// Normalization failure only removes the sagging family; the other
    /// families do not depend on the canonical frame.
    pub fn extract_face(&self, landmarks: &LandmarkSet, colors: &[DominantColor]) -> FaceMetrics {
        let mut metrics = MetricVector::default();
        self.measurement_metrics(landmarks, &mut metrics);
        self.slimming_metrics(landmarks, &mut metrics);
        self.skin_metrics(colors, &mut metrics);

        match normalize(landmarks) {
            Ok(normalized) => {
                self.sagging_metrics(&normalized, &mut metrics);
                FaceMetrics {
                    metrics,
                    normalized: Some(normalized),
                    normalization_error: None,
                }
            }
            Err(err) => {
                tracing::debug!("sagging metrics skipped: {err}");
                FaceMetrics {
                    metrics,
                    normalized: None,
                    normalization_error: Some(err),
                }
            }
        }
    }

    pub fn measurement_metrics(&self, lm: &LandmarkSet, out: &mut MetricVector) {
        let mm = |a: LandmarkName, b: LandmarkName| distance(lm, a, b).map(|d| d * self.pixel_to_mm);

        out.record(MetricName::FaceWidth, mm(LeftEarTragion, RightEarTragion));
        out.record(MetricName::FaceHeight, mm(ForeheadGlabella, ChinGnathion));
        out.record(MetricName::EyeDistance, mm(LeftEye, RightEye));
        out.record(MetricName::EyebrowToEyeDistance, mm(LeftOfLeftEyebrow, LeftEye));
        out.record(MetricName::FaceLiftAngle, face_lift_angle(lm));
        out.record(MetricName::LowerFaceRatio, lower_face_ratio(lm));
    }

    pub fn sagging_metrics(&self, normalized: &NormalizedLandmarkSet, out: &mut MetricVector) {
        let lm = normalized.landmarks();
        out.record(MetricName::JawLineAngle, jaw_line_angle(lm));
        out.record(MetricName::MouthCornerDroop, mouth_corner_droop(lm));
        out.record(MetricName::CheekDroopIndex, cheek_droop_index(lm));
        out.record(MetricName::JawWidthRatio, jaw_width_ratio(lm));
    }

    pub fn slimming_metrics(&self, lm: &LandmarkSet, out: &mut MetricVector) {
        let eye_width = distance(lm, LeftEyeRightCorner, RightEyeLeftCorner).filter(|d| *d > f64::EPSILON);

        let per_eye = |a: LandmarkName, b: LandmarkName| {
            let eye_width = eye_width?;
            distance(lm, a, b).map(|d| d / eye_width)
        };
        out.record(MetricName::CheekWidthRatio, per_eye(LeftCheekCenter, RightCheekCenter));
        out.record(MetricName::JawToEyeWidthRatio, per_eye(ChinLeftGonion, ChinRightGonion));

        let area = eye_width.and_then(|eye_width| {
            let polygon = [
                lm.get(LeftEarTragion)?,
                lm.get(RightEarTragion)?,
                lm.get(ChinGnathion)?,
                lm.get(MidpointBetweenEyes)?,
            ];
            Some(polygon_area(&polygon) / eye_width.powi(2))
        });
        out.record(MetricName::FaceAreaRatio, area);
    }

    pub fn skin_metrics(&self, colors: &[DominantColor], out: &mut MetricVector) {
        let mut samples: Vec<&DominantColor> = colors.iter().filter(|c| c.score > 0.0).collect();
        samples.sort_by(|a, b| b.score.total_cmp(&a.score));
        samples.truncate(self.color_samples);

        let total: f64 = samples.iter().map(|c| c.score).sum();
        if samples.is_empty() || total <= f64::EPSILON {
            out.record(MetricName::SkinBrightness, None);
            out.record(MetricName::SkinSaturation, None);
            return;
        }

        let brightness = samples.iter().map(|c| c.score * luma(c)).sum::<f64>() / total;
        let saturation = samples.iter().map(|c| c.score * hsv_saturation(c)).sum::<f64>() / total;
        out.record(MetricName::SkinBrightness, Some(brightness));
        out.record(MetricName::SkinSaturation, Some(saturation * 100.0));
    }
}

fn distance(lm: &LandmarkSet, a: LandmarkName, b: LandmarkName) -> Option<f64> {
    Some(lm.get(a)?.distance(&lm.get(b)?))
}

/// Included angle at the mouth corner of {outer eye corner, mouth corner, chin}.
fn face_lift_angle(lm: &LandmarkSet) -> Option<f64> {
    included_angle_deg(&lm.get(RightEyeRightCorner)?, &lm.get(MouthRight)?, &lm.get(ChinGnathion)?)
}

fn lower_face_ratio(lm: &LandmarkSet) -> Option<f64> {
    let nose = lm.get(NoseBottomCenter)?;
    let mouth = lm.get(MouthCenter)?;
    let chin = lm.get(ChinGnathion)?;
    checked_ratio(nose.distance(&mouth), nose.distance(&chin))
}

fn jaw_side_angle(gonion: Point2D, tragion: Point2D, chin: Point2D) -> f64 {
    bearing_difference_deg(bearing_deg(&gonion, &tragion), bearing_deg(&gonion, &chin))
}

fn jaw_line_angle(lm: &LandmarkSet) -> Option<f64> {
    let chin = lm.get(ChinGnathion)?;
    let left = jaw_side_angle(lm.get(ChinLeftGonion)?, lm.get(LeftEarTragion)?, chin);
    let right = jaw_side_angle(lm.get(ChinRightGonion)?, lm.get(RightEarTragion)?, chin);
    Some((left + right) / 2.0)
}

fn mouth_corner_droop(lm: &LandmarkSet) -> Option<f64> {
    let left = lm.get(MouthLeft)?;
    let right = lm.get(MouthRight)?;
    let (dx, dy) = (right.x - left.x, right.y - left.y);
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(dy.abs().atan2(dx.abs()).to_degrees())
}

/// y grows downward, so a positive droop means the cheek sits below the eye/mouth line.
fn cheek_droop_index(lm: &LandmarkSet) -> Option<f64> {
    let left_base = (lm.get(LeftEyeLeftCorner)?.y + lm.get(MouthLeft)?.y) / 2.0;
    let right_base = (lm.get(RightEyeRightCorner)?.y + lm.get(MouthRight)?.y) / 2.0;
    let left = lm.get(LeftCheekCenter)?.y - left_base;
    let right = lm.get(RightCheekCenter)?.y - right_base;
    Some((left + right) / 2.0)
}

fn jaw_width_ratio(lm: &LandmarkSet) -> Option<f64> {
    let jaw = distance(lm, ChinLeftGonion, ChinRightGonion)?;
    let ears = distance(lm, LeftEarTragion, RightEarTragion)?;
    checked_ratio(jaw, ears)
}

fn luma(c: &DominantColor) -> f64 {
    0.299 * c.red + 0.587 * c.green + 0.114 * c.blue
}

fn hsv_saturation(c: &DominantColor) -> f64 {
    let max = c.red.max(c.green).max(c.blue);
    let min = c.red.min(c.green).min(c.blue);
    if max <= 0.0 {
        0.0
    } else {
        (max - min) / max
    }
}
