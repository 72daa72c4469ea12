use crate::utils::coordinate::Point2D;

/// Bearing of the vector `from -> to` in degrees, in (-180, 180].
pub fn bearing_deg(from: &Point2D, to: &Point2D) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Absolute difference between two bearings folded into [0, 180].
pub fn bearing_difference_deg(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Included angle at `vertex` of the triangle {a, vertex, b} from the law of cosines.
///
/// `None` when any two of the points coincide.
pub fn included_angle_deg(a: &Point2D, vertex: &Point2D, b: &Point2D) -> Option<f64> {
    let side_a = vertex.distance(a);
    let side_b = vertex.distance(b);
    let opposite = a.distance(b);
    if side_a <= f64::EPSILON || side_b <= f64::EPSILON || opposite <= f64::EPSILON {
        return None;
    }
    let cos = (side_a.powi(2) + side_b.powi(2) - opposite.powi(2)) / (2.0 * side_a * side_b);
    Some(cos.clamp(-1.0, 1.0).acos().to_degrees())
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point2D]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        area += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    (area / 2.0).abs()
}

/// `numerator / denominator`, `None` for a zero denominator.
pub fn checked_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator.abs() <= f64::EPSILON {
        None
    } else {
        Some(numerator / denominator)
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
