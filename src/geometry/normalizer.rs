//! Pose canonicalisation of landmark sets.
//!
//! The left eye becomes the origin, the inter-ocular axis becomes the positive
//! x axis and the inter-ocular distance becomes the unit length. Two photos
//! normalized this way can be compared regardless of head roll, camera
//! distance or framing.

use nalgebra::Rotation2;
use serde::Serialize;

use crate::error::NormalizationError;
use crate::utils::coordinate::{LandmarkName, LandmarkSet, Point2D};

/// Reference distances below this are treated as coincident eyes.
pub const MIN_REFERENCE_DISTANCE: f64 = 1e-9;

pub const REFERENCE_LANDMARKS: [LandmarkName; 2] = [LandmarkName::LeftEye, LandmarkName::RightEye];

/// Parameters of the transform that produced a normalized set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizationFrame {
    pub origin: Point2D,
    /// Roll of the eye axis in radians.
    pub rotation: f64,
    /// Inter-ocular distance in input units.
    pub scale: f64,
}

/// A landmark set expressed in the unitless pose-canonical frame.
///
/// Only [`normalize`] creates these, so a value of this type always went
/// through the same procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedLandmarkSet {
    landmarks: LandmarkSet,
    frame: NormalizationFrame,
}

impl NormalizedLandmarkSet {
    pub fn landmarks(&self) -> &LandmarkSet {
        &self.landmarks
    }

    pub fn frame(&self) -> NormalizationFrame {
        self.frame
    }

    pub fn get(&self, name: LandmarkName) -> Option<Point2D> {
        self.landmarks.get(name)
    }
}

pub fn normalize(landmarks: &LandmarkSet) -> Result<NormalizedLandmarkSet, NormalizationError> {
    let (left, right) = match (landmarks.get(LandmarkName::LeftEye), landmarks.get(LandmarkName::RightEye)) {
        (Some(left), Some(right)) => (left, right),
        _ => {
            return Err(NormalizationError::MissingReferenceLandmarks {
                missing: landmarks.missing(&REFERENCE_LANDMARKS),
            })
        }
    };

    let distance = left.distance(&right);
    if !distance.is_finite() || distance < MIN_REFERENCE_DISTANCE {
        return Err(NormalizationError::DegenerateReference { distance });
    }

    let theta = (right.y - left.y).atan2(right.x - left.x);
    let unrotate = Rotation2::new(-theta);
    let origin = left.to_vector();

    let normalized = landmarks.map_points(|p| Point2D::from(unrotate * (p.to_vector() - origin) / distance));

    Ok(NormalizedLandmarkSet {
        landmarks: normalized,
        frame: NormalizationFrame {
            origin: left,
            rotation: theta,
            scale: distance,
        },
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{Rotation2, Vector2};
    use proptest::prelude::*;

    use crate::error::NormalizationError;
    use crate::geometry::normalizer::normalize;
    use crate::utils::coordinate::{LandmarkName, LandmarkSet, Point2D};

    fn sample_face() -> LandmarkSet {
        [
            (LandmarkName::LeftEye, Point2D::new(100.0, 200.0)),
            (LandmarkName::RightEye, Point2D::new(140.0, 200.0)),
            (LandmarkName::NoseTip, Point2D::new(120.0, 225.0)),
            (LandmarkName::MouthLeft, Point2D::new(105.0, 245.0)),
            (LandmarkName::MouthRight, Point2D::new(136.0, 247.0)),
            (LandmarkName::ChinGnathion, Point2D::new(121.0, 280.0)),
            (LandmarkName::LeftEarTragion, Point2D::new(72.0, 215.0)),
            (LandmarkName::RightEarTragion, Point2D::new(170.0, 214.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_eyes_land_on_unit_axis() {
        let normalized = normalize(&sample_face()).unwrap();
        let left = normalized.get(LandmarkName::LeftEye).unwrap();
        let right = normalized.get(LandmarkName::RightEye).unwrap();
        assert_relative_eq!(left.x, 0.0);
        assert_relative_eq!(left.y, 0.0);
        assert_relative_eq!(right.x, 1.0);
        assert_relative_eq!(right.y, 0.0);
        assert_relative_eq!(normalized.frame().scale, 40.0);
        assert_relative_eq!(normalized.frame().rotation, 0.0);
    }

    #[test]
    fn test_key_set_is_preserved() {
        let face = sample_face().without(LandmarkName::NoseTip);
        let normalized = normalize(&face).unwrap();
        assert_eq!(normalized.landmarks().len(), face.len());
        assert!(normalized.get(LandmarkName::NoseTip).is_none());
    }

    #[test]
    fn test_missing_right_eye_is_reported() {
        let err = normalize(&sample_face().without(LandmarkName::RightEye)).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::MissingReferenceLandmarks {
                missing: vec![LandmarkName::RightEye]
            }
        );
    }

    #[test]
    fn test_coincident_eyes_are_degenerate() {
        let face: LandmarkSet = [
            (LandmarkName::LeftEye, Point2D::new(50.0, 50.0)),
            (LandmarkName::RightEye, Point2D::new(50.0, 50.0)),
        ]
        .into_iter()
        .collect();
        assert!(matches!(normalize(&face), Err(NormalizationError::DegenerateReference { .. })));
    }

    #[test]
    fn test_rolled_head_is_levelled() {
        let face: LandmarkSet = [
            (LandmarkName::LeftEye, Point2D::new(0.0, 0.0)),
            (LandmarkName::RightEye, Point2D::new(30.0, 40.0)),
            (LandmarkName::ChinGnathion, Point2D::new(-40.0, 30.0)),
        ]
        .into_iter()
        .collect();
        let normalized = normalize(&face).unwrap();
        let chin = normalized.get(LandmarkName::ChinGnathion).unwrap();
        // chin sits perpendicular to the eye axis, one eye-distance away
        assert_relative_eq!(chin.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(chin.y, 1.0, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn normalization_ignores_similarity_transforms(
            tx in -500.0f64..500.0,
            ty in -500.0f64..500.0,
            angle in -3.1f64..3.1,
            scale in 0.1f64..10.0,
        ) {
            let face = sample_face();
            let rotation = Rotation2::new(angle);
            let moved = face.map_points(|p| {
                Point2D::from(rotation * p.to_vector() * scale + Vector2::new(tx, ty))
            });

            let expected = normalize(&face).unwrap();
            let actual = normalize(&moved).unwrap();
            for (name, point) in expected.landmarks().iter() {
                let other = actual.get(name).unwrap();
                prop_assert!((point.x - other.x).abs() < 1e-9);
                prop_assert!((point.y - other.y).abs() < 1e-9);
            }
        }
    }
}
