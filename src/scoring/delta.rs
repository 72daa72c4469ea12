use serde::Serialize;

use crate::config::config::ScoringConfig;
use crate::geometry::metrics::{MetricName, MetricUnit, MetricVector};
use crate::utils::utils::round_to;

/// What counts as an improvement for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Decrease,
    Increase,
    /// Reported for reference only, never improved.
    Neutral,
    /// Improved when the value moves closer to the target.
    TowardTarget(f64),
}

impl Direction {
    /// The directionality table. Every verdict in the crate goes through here.
    pub fn of(metric: MetricName, config: &ScoringConfig) -> Direction {
        match metric {
            MetricName::FaceWidth
            | MetricName::FaceHeight
            | MetricName::EyebrowToEyeDistance
            | MetricName::LowerFaceRatio
            | MetricName::JawLineAngle
            | MetricName::MouthCornerDroop
            | MetricName::CheekDroopIndex
            | MetricName::JawWidthRatio
            | MetricName::CheekWidthRatio
            | MetricName::JawToEyeWidthRatio
            | MetricName::FaceAreaRatio => Direction::Decrease,
            MetricName::FaceLiftAngle | MetricName::SkinBrightness => Direction::Increase,
            MetricName::EyeDistance => Direction::Neutral,
            MetricName::SkinSaturation => Direction::TowardTarget(config.saturation_target),
        }
    }

    pub fn is_improvement(&self, before: f64, after: f64) -> bool {
        let change = after - before;
        if change == 0.0 {
            return false;
        }
        match self {
            Direction::Decrease => change < 0.0,
            Direction::Increase => change > 0.0,
            Direction::Neutral => false,
            Direction::TowardTarget(target) => (after - target).abs() < (before - target).abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaRecord {
    pub metric: MetricName,
    pub unit: MetricUnit,
    pub before: f64,
    pub after: f64,
    pub change: f64,
    pub change_percent: Option<f64>,
    pub improved: bool,
}

impl DeltaRecord {
    pub fn new(metric: MetricName, before: f64, after: f64, direction: Direction) -> Self {
        let change = after - before;
        let change_percent = if before == 0.0 {
            None
        } else {
            Some(change / before * 100.0)
        };
        DeltaRecord {
            metric,
            unit: metric.unit(),
            before,
            after,
            change,
            change_percent,
            improved: direction.is_improvement(before, after),
        }
    }

    /// True when the change survives rounding to the metric's display precision.
    pub fn is_significant(&self) -> bool {
        round_to(self.change, self.metric.display_decimals()) != 0.0
    }
}

/// Pairs up metrics defined in both vectors; one-sided metrics are skipped.
pub fn score_deltas(before: &MetricVector, after: &MetricVector, config: &ScoringConfig) -> Vec<DeltaRecord> {
    before
        .iter()
        .filter_map(|(metric, before_value)| {
            let after_value = after.get(metric)?;
            Some(DeltaRecord::new(metric, before_value, after_value, Direction::of(metric, config)))
        })
        .collect()
}

pub fn find(deltas: &[DeltaRecord], metric: MetricName) -> Option<&DeltaRecord> {
    deltas.iter().find(|d| d.metric == metric)
}
