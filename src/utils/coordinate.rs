use std::collections::BTreeMap;
use std::fmt;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Named facial landmarks reported by the detector.
///
/// The vocabulary is closed: wire names outside this list are dropped when a
/// detector response is converted, they never become a default point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandmarkName {
    LeftEye,
    RightEye,
    LeftOfLeftEyebrow,
    RightOfLeftEyebrow,
    LeftOfRightEyebrow,
    RightOfRightEyebrow,
    MidpointBetweenEyes,
    NoseTip,
    UpperLip,
    LowerLip,
    MouthLeft,
    MouthRight,
    MouthCenter,
    NoseBottomRight,
    NoseBottomLeft,
    NoseBottomCenter,
    LeftEyeTopBoundary,
    LeftEyeRightCorner,
    LeftEyeBottomBoundary,
    LeftEyeLeftCorner,
    RightEyeTopBoundary,
    RightEyeRightCorner,
    RightEyeBottomBoundary,
    RightEyeLeftCorner,
    LeftEyebrowUpperMidpoint,
    RightEyebrowUpperMidpoint,
    LeftEarTragion,
    RightEarTragion,
    LeftEyePupil,
    RightEyePupil,
    ForeheadGlabella,
    ChinGnathion,
    ChinLeftGonion,
    ChinRightGonion,
    LeftCheekCenter,
    RightCheekCenter,
}

impl LandmarkName {
    pub const ALL: [LandmarkName; 36] = [
        LandmarkName::LeftEye,
        LandmarkName::RightEye,
        LandmarkName::LeftOfLeftEyebrow,
        LandmarkName::RightOfLeftEyebrow,
        LandmarkName::LeftOfRightEyebrow,
        LandmarkName::RightOfRightEyebrow,
        LandmarkName::MidpointBetweenEyes,
        LandmarkName::NoseTip,
        LandmarkName::UpperLip,
        LandmarkName::LowerLip,
        LandmarkName::MouthLeft,
        LandmarkName::MouthRight,
        LandmarkName::MouthCenter,
        LandmarkName::NoseBottomRight,
        LandmarkName::NoseBottomLeft,
        LandmarkName::NoseBottomCenter,
        LandmarkName::LeftEyeTopBoundary,
        LandmarkName::LeftEyeRightCorner,
        LandmarkName::LeftEyeBottomBoundary,
        LandmarkName::LeftEyeLeftCorner,
        LandmarkName::RightEyeTopBoundary,
        LandmarkName::RightEyeRightCorner,
        LandmarkName::RightEyeBottomBoundary,
        LandmarkName::RightEyeLeftCorner,
        LandmarkName::LeftEyebrowUpperMidpoint,
        LandmarkName::RightEyebrowUpperMidpoint,
        LandmarkName::LeftEarTragion,
        LandmarkName::RightEarTragion,
        LandmarkName::LeftEyePupil,
        LandmarkName::RightEyePupil,
        LandmarkName::ForeheadGlabella,
        LandmarkName::ChinGnathion,
        LandmarkName::ChinLeftGonion,
        LandmarkName::ChinRightGonion,
        LandmarkName::LeftCheekCenter,
        LandmarkName::RightCheekCenter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LandmarkName::LeftEye => "LEFT_EYE",
            LandmarkName::RightEye => "RIGHT_EYE",
            LandmarkName::LeftOfLeftEyebrow => "LEFT_OF_LEFT_EYEBROW",
            LandmarkName::RightOfLeftEyebrow => "RIGHT_OF_LEFT_EYEBROW",
            LandmarkName::LeftOfRightEyebrow => "LEFT_OF_RIGHT_EYEBROW",
            LandmarkName::RightOfRightEyebrow => "RIGHT_OF_RIGHT_EYEBROW",
            LandmarkName::MidpointBetweenEyes => "MIDPOINT_BETWEEN_EYES",
            LandmarkName::NoseTip => "NOSE_TIP",
            LandmarkName::UpperLip => "UPPER_LIP",
            LandmarkName::LowerLip => "LOWER_LIP",
            LandmarkName::MouthLeft => "MOUTH_LEFT",
            LandmarkName::MouthRight => "MOUTH_RIGHT",
            LandmarkName::MouthCenter => "MOUTH_CENTER",
            LandmarkName::NoseBottomRight => "NOSE_BOTTOM_RIGHT",
            LandmarkName::NoseBottomLeft => "NOSE_BOTTOM_LEFT",
            LandmarkName::NoseBottomCenter => "NOSE_BOTTOM_CENTER",
            LandmarkName::LeftEyeTopBoundary => "LEFT_EYE_TOP_BOUNDARY",
            LandmarkName::LeftEyeRightCorner => "LEFT_EYE_RIGHT_CORNER",
            LandmarkName::LeftEyeBottomBoundary => "LEFT_EYE_BOTTOM_BOUNDARY",
            LandmarkName::LeftEyeLeftCorner => "LEFT_EYE_LEFT_CORNER",
            LandmarkName::RightEyeTopBoundary => "RIGHT_EYE_TOP_BOUNDARY",
            LandmarkName::RightEyeRightCorner => "RIGHT_EYE_RIGHT_CORNER",
            LandmarkName::RightEyeBottomBoundary => "RIGHT_EYE_BOTTOM_BOUNDARY",
            LandmarkName::RightEyeLeftCorner => "RIGHT_EYE_LEFT_CORNER",
            LandmarkName::LeftEyebrowUpperMidpoint => "LEFT_EYEBROW_UPPER_MIDPOINT",
            LandmarkName::RightEyebrowUpperMidpoint => "RIGHT_EYEBROW_UPPER_MIDPOINT",
            LandmarkName::LeftEarTragion => "LEFT_EAR_TRAGION",
            LandmarkName::RightEarTragion => "RIGHT_EAR_TRAGION",
            LandmarkName::LeftEyePupil => "LEFT_EYE_PUPIL",
            LandmarkName::RightEyePupil => "RIGHT_EYE_PUPIL",
            LandmarkName::ForeheadGlabella => "FOREHEAD_GLABELLA",
            LandmarkName::ChinGnathion => "CHIN_GNATHION",
            LandmarkName::ChinLeftGonion => "CHIN_LEFT_GONION",
            LandmarkName::ChinRightGonion => "CHIN_RIGHT_GONION",
            LandmarkName::LeftCheekCenter => "LEFT_CHEEK_CENTER",
            LandmarkName::RightCheekCenter => "RIGHT_CHEEK_CENTER",
        }
    }

    /// Looks up a detector wire name, `None` for anything outside the vocabulary.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|candidate| candidate.as_str() == name)
    }
}

impl fmt::Display for LandmarkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Point2D::new(v.x, v.y)
    }
}

/// A snapshot of one face's detected landmarks in image pixel coordinates.
///
/// Absent names are simply not in the map. There is no mutating API; derived
/// sets are new values. JSON maps go through [`LandmarkSet::from_named_points`],
/// so unknown names are skipped rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<LandmarkName, Point2D>", from = "BTreeMap<String, Point2D>")]
pub struct LandmarkSet {
    points: BTreeMap<LandmarkName, Point2D>,
}

impl From<LandmarkSet> for BTreeMap<LandmarkName, Point2D> {
    fn from(set: LandmarkSet) -> Self {
        set.points
    }
}

impl From<BTreeMap<String, Point2D>> for LandmarkSet {
    fn from(named: BTreeMap<String, Point2D>) -> Self {
        LandmarkSet::from_named_points(named.iter().map(|(name, point)| (name.as_str(), *point)))
    }
}

impl LandmarkSet {
    pub fn new(points: BTreeMap<LandmarkName, Point2D>) -> Self {
        LandmarkSet { points }
    }

    /// Builds a set from loosely named points, skipping unknown names.
    pub fn from_named_points<'a, I>(named: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Point2D)>,
    {
        let mut points = BTreeMap::new();
        for (name, point) in named {
            match LandmarkName::from_wire(name) {
                Some(landmark) => {
                    points.insert(landmark, point);
                }
                None => tracing::debug!("skipping unknown landmark {name}"),
            }
        }
        LandmarkSet { points }
    }

    pub fn get(&self, name: LandmarkName) -> Option<Point2D> {
        self.points.get(&name).copied()
    }

    pub fn contains(&self, name: LandmarkName) -> bool {
        self.points.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LandmarkName, Point2D)> + '_ {
        self.points.iter().map(|(name, point)| (*name, *point))
    }

    pub fn names(&self) -> impl Iterator<Item = LandmarkName> + '_ {
        self.points.keys().copied()
    }

    /// Names from `required` that this set does not contain.
    pub fn missing(&self, required: &[LandmarkName]) -> Vec<LandmarkName> {
        required.iter().copied().filter(|name| !self.contains(*name)).collect()
    }

    /// A copy of this set with `name` removed.
    pub fn without(&self, name: LandmarkName) -> LandmarkSet {
        let mut points = self.points.clone();
        points.remove(&name);
        LandmarkSet { points }
    }

    /// Applies `f` to every point, keeping the key set intact.
    pub fn map_points<F>(&self, f: F) -> LandmarkSet
    where
        F: Fn(Point2D) -> Point2D,
    {
        LandmarkSet {
            points: self.points.iter().map(|(name, point)| (*name, f(*point))).collect(),
        }
    }
}

impl FromIterator<(LandmarkName, Point2D)> for LandmarkSet {
    fn from_iter<T: IntoIterator<Item = (LandmarkName, Point2D)>>(iter: T) -> Self {
        LandmarkSet {
            points: iter.into_iter().collect(),
        }
    }
}

/// Head pose angles in degrees as reported by the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub roll: f64,
    pub pan: f64,
    pub tilt: f64,
}

/// One dominant colour sample of an analysed image, channels in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DominantColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub score: f64,
    pub pixel_fraction: f64,
}

/// Which photo of the pair a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Before,
    After,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Before => f.write_str("before"),
            ImageRole::After => f.write_str("after"),
        }
    }
}

/// A face as returned by the landmark detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub landmarks: LandmarkSet,
    pub pose: HeadPose,
    pub confidence: f64,
    #[serde(default)]
    pub dominant_colors: Vec<DominantColor>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::utils::coordinate::{LandmarkName, LandmarkSet, Point2D};

    #[test]
    fn test_wire_names_round_trip_for_whole_vocabulary() {
        for name in LandmarkName::ALL {
            assert_eq!(LandmarkName::from_wire(name.as_str()), Some(name));
        }
        assert_eq!(LandmarkName::from_wire("LEFT_EAR_LOBE"), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&LandmarkName::ChinGnathion).unwrap();
        assert_eq!(json, "\"CHIN_GNATHION\"");
    }

    #[test]
    fn test_from_named_points_skips_unknown_names() {
        let named: HashMap<&str, Point2D> = HashMap::from([
            ("LEFT_EYE", Point2D::new(169.7128, 213.38426)),
            ("RIGHT_EYE", Point2D::new(455.29285, 223.66956)),
            ("THIRD_EYE", Point2D::new(310.0, 150.0)),
        ]);
        let set = LandmarkSet::from_named_points(named);
        assert_eq!(set.len(), 2);
        assert!(set.contains(LandmarkName::LeftEye));
        assert_eq!(set.missing(&[LandmarkName::RightEye, LandmarkName::NoseTip]), vec![LandmarkName::NoseTip]);
    }

    #[test]
    fn test_landmark_set_deserializes_from_map() {
        let json = r#"{"LEFT_EYE":{"x":100.0,"y":200.0},"RIGHT_EYE":{"x":140.0,"y":200.0}}"#;
        let set: LandmarkSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.get(LandmarkName::RightEye), Some(Point2D::new(140.0, 200.0)));
        assert_eq!(set.get(LandmarkName::NoseTip), None);
    }

    #[test]
    fn test_landmark_set_json_skips_unknown_names() {
        let json = r#"{
            "LEFT_EYE": {"x": 100.0, "y": 200.0},
            "RIGHT_EYE": {"x": 140.0, "y": 200.0},
            "LEFT_EAR_LOBE": {"x": 60.0, "y": 240.0}
        }"#;
        let set: LandmarkSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(LandmarkName::LeftEye), Some(Point2D::new(100.0, 200.0)));

        let written = serde_json::to_value(&set).unwrap();
        assert_eq!(written["RIGHT_EYE"]["x"], 140.0);
        assert!(written.get("LEFT_EAR_LOBE").is_none());
    }

    #[test]
    fn test_without_leaves_original_untouched() {
        let set: LandmarkSet = [
            (LandmarkName::LeftEye, Point2D::new(0.0, 0.0)),
            (LandmarkName::RightEye, Point2D::new(1.0, 0.0)),
        ]
        .into_iter()
        .collect();
        let reduced = set.without(LandmarkName::RightEye);
        assert_eq!(reduced.len(), 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_point_distance_is_symmetric() {
        let a = Point2D::new(195.21452, 379.8982);
        let b = Point2D::new(408.377, 384.25134);
        assert_eq!(a.distance(&b), b.distance(&a));
    }
}
