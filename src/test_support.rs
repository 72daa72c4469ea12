//! Shared fixtures for unit tests.

use crate::utils::coordinate::{DetectedFace, DominantColor, HeadPose, LandmarkName, LandmarkSet, Point2D};

/// A frontal, level, left/right symmetric face with eyes 60px apart.
pub(crate) fn full_face() -> LandmarkSet {
    use LandmarkName::*;
    [
        (LeftEye, Point2D::new(100.0, 200.0)),
        (RightEye, Point2D::new(160.0, 200.0)),
        (LeftEyeLeftCorner, Point2D::new(88.0, 201.0)),
        (LeftEyeRightCorner, Point2D::new(112.0, 201.0)),
        (RightEyeLeftCorner, Point2D::new(148.0, 201.0)),
        (RightEyeRightCorner, Point2D::new(172.0, 201.0)),
        (LeftEyeTopBoundary, Point2D::new(100.0, 195.0)),
        (LeftEyeBottomBoundary, Point2D::new(100.0, 205.0)),
        (RightEyeTopBoundary, Point2D::new(160.0, 195.0)),
        (RightEyeBottomBoundary, Point2D::new(160.0, 205.0)),
        (LeftEyePupil, Point2D::new(100.0, 200.0)),
        (RightEyePupil, Point2D::new(160.0, 200.0)),
        (LeftOfLeftEyebrow, Point2D::new(82.0, 182.0)),
        (RightOfLeftEyebrow, Point2D::new(118.0, 180.0)),
        (LeftOfRightEyebrow, Point2D::new(142.0, 180.0)),
        (RightOfRightEyebrow, Point2D::new(178.0, 182.0)),
        (LeftEyebrowUpperMidpoint, Point2D::new(100.0, 176.0)),
        (RightEyebrowUpperMidpoint, Point2D::new(160.0, 176.0)),
        (MidpointBetweenEyes, Point2D::new(130.0, 199.0)),
        (ForeheadGlabella, Point2D::new(130.0, 185.0)),
        (NoseTip, Point2D::new(130.0, 240.0)),
        (NoseBottomCenter, Point2D::new(130.0, 250.0)),
        (NoseBottomLeft, Point2D::new(118.0, 246.0)),
        (NoseBottomRight, Point2D::new(142.0, 246.0)),
        (UpperLip, Point2D::new(130.0, 265.0)),
        (LowerLip, Point2D::new(130.0, 280.0)),
        (MouthLeft, Point2D::new(108.0, 272.0)),
        (MouthRight, Point2D::new(152.0, 272.0)),
        (MouthCenter, Point2D::new(130.0, 272.0)),
        (ChinGnathion, Point2D::new(130.0, 320.0)),
        (ChinLeftGonion, Point2D::new(70.0, 285.0)),
        (ChinRightGonion, Point2D::new(190.0, 285.0)),
        (LeftEarTragion, Point2D::new(58.0, 225.0)),
        (RightEarTragion, Point2D::new(202.0, 225.0)),
        (LeftCheekCenter, Point2D::new(92.0, 245.0)),
        (RightCheekCenter, Point2D::new(168.0, 245.0)),
    ]
    .into_iter()
    .collect()
}

pub(crate) fn skin_colors() -> Vec<DominantColor> {
    vec![
        DominantColor { red: 214.0, green: 170.0, blue: 140.0, score: 0.42, pixel_fraction: 0.31 },
        DominantColor { red: 188.0, green: 140.0, blue: 112.0, score: 0.27, pixel_fraction: 0.22 },
        DominantColor { red: 96.0, green: 70.0, blue: 58.0, score: 0.11, pixel_fraction: 0.08 },
        DominantColor { red: 240.0, green: 236.0, blue: 230.0, score: 0.05, pixel_fraction: 0.12 },
    ]
}

pub(crate) fn detected(landmarks: LandmarkSet) -> DetectedFace {
    DetectedFace {
        landmarks,
        pose: HeadPose::default(),
        confidence: 0.98,
        dominant_colors: skin_colors(),
    }
}
