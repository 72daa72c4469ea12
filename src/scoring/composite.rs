use std::fmt;

use serde::Serialize;

use crate::config::config::ScoringConfig;
use crate::geometry::metrics::MetricName;
use crate::scoring::delta::{find, DeltaRecord};

/// Slim index magnitude below which the face is considered unchanged.
const SLIM_TREND_BAND: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompositeKind {
    FaceLiftIndex,
    OverallScore,
    FaceSlimIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlimTrend {
    Slimmer,
    Stable,
    Fuller,
}

impl SlimTrend {
    pub fn from_index(value: f64) -> Self {
        if value < -SLIM_TREND_BAND {
            SlimTrend::Slimmer
        } else if value > SLIM_TREND_BAND {
            SlimTrend::Fuller
        } else {
            SlimTrend::Stable
        }
    }
}

impl fmt::Display for SlimTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlimTrend::Slimmer => f.write_str("slimmer"),
            SlimTrend::Stable => f.write_str("stable"),
            SlimTrend::Fuller => f.write_str("fuller"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeIndex {
    pub kind: CompositeKind,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<SlimTrend>,
}

/// Combines deltas into the composite indices. A composite whose inputs are
/// not all present is left out.
pub fn compute_composites(deltas: &[DeltaRecord], config: &ScoringConfig) -> Vec<CompositeIndex> {
    let mut composites = Vec::new();

    if let Some(value) = face_lift_index(deltas, config) {
        composites.push(CompositeIndex {
            kind: CompositeKind::FaceLiftIndex,
            value,
            trend: None,
        });
    }
    if let Some(value) = overall_score(deltas, config) {
        composites.push(CompositeIndex {
            kind: CompositeKind::OverallScore,
            value,
            trend: None,
        });
    }
    if let Some(value) = face_slim_index(deltas, config) {
        composites.push(CompositeIndex {
            kind: CompositeKind::FaceSlimIndex,
            value,
            trend: Some(SlimTrend::from_index(value)),
        });
    }
    composites
}

/// `w_angle * Δangle + w_ratio * (-100 * Δratio)`.
pub fn face_lift_index(deltas: &[DeltaRecord], config: &ScoringConfig) -> Option<f64> {
    let angle = find(deltas, MetricName::FaceLiftAngle)?.change;
    let ratio = find(deltas, MetricName::LowerFaceRatio)?.change;
    Some(config.lift_angle_weight * angle + config.lower_face_ratio_weight * (-100.0 * ratio))
}

/// Baseline plus weighted improvement percentages, clamped to 0..=100.
pub fn overall_score(deltas: &[DeltaRecord], config: &ScoringConfig) -> Option<f64> {
    let cdi = improvement_percent(deltas, MetricName::CheekDroopIndex)?;
    let jla = improvement_percent(deltas, MetricName::JawLineAngle)?;
    let raw = config.overall_baseline + config.overall_cdi_weight * cdi + config.overall_jla_weight * jla;
    Some(raw.clamp(0.0, 100.0).round())
}

pub fn face_slim_index(deltas: &[DeltaRecord], config: &ScoringConfig) -> Option<f64> {
    let cheek = find(deltas, MetricName::CheekWidthRatio)?.change_percent?;
    let jaw = find(deltas, MetricName::JawToEyeWidthRatio)?.change_percent?;
    let area = find(deltas, MetricName::FaceAreaRatio)?.change_percent?;
    Some(config.slim_cheek_weight * cheek + config.slim_jaw_weight * jaw + config.slim_area_weight * area)
}

/// Relative size of the change, positive exactly when the record is an improvement.
/// Taken from `improved` so a negative `before` cannot flip the sign.
fn improvement_percent(deltas: &[DeltaRecord], metric: MetricName) -> Option<f64> {
    let delta = find(deltas, metric)?;
    let magnitude = delta.change_percent?.abs();
    Some(if delta.improved { magnitude } else { -magnitude })
}
