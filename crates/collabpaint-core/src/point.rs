//! Point model and canvas-bounds validation.

use serde::{Deserialize, Serialize};

/// A single drawn point, transmitted as JSON text (`{"x":5.0,"y":5.0}`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check that both coordinates are finite (not NaN, not infinite).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Dimensions of the drawing surface a point must fall within.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBounds {
    pub width: f64,
    pub height: f64,
}

impl CanvasBounds {
    /// Create bounds for a `width x height` surface.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True iff the point lies within `[0, width] x [0, height]`.
    pub fn contains(&self, point: &Point) -> bool {
        point.is_finite()
            && point.x >= 0.0
            && point.x <= self.width
            && point.y >= 0.0
            && point.y <= self.height
    }
}

/// Validate a point against the current canvas bounds.
///
/// A missing canvas fails closed: every point is rejected.
pub fn validate_point(point: &Point, bounds: Option<&CanvasBounds>) -> bool {
    match bounds {
        Some(bounds) => bounds.contains(point),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_within_bounds() {
        let bounds = CanvasBounds::new(500.0, 300.0);
        assert!(validate_point(&Point::new(0.0, 0.0), Some(&bounds)));
        assert!(validate_point(&Point::new(500.0, 300.0), Some(&bounds)));
        assert!(validate_point(&Point::new(250.0, 150.0), Some(&bounds)));
    }

    #[test]
    fn test_point_out_of_bounds() {
        let bounds = CanvasBounds::new(500.0, 300.0);
        assert!(!validate_point(&Point::new(-1.0, 10.0), Some(&bounds)));
        assert!(!validate_point(&Point::new(10.0, -1.0), Some(&bounds)));
        assert!(!validate_point(&Point::new(500.1, 10.0), Some(&bounds)));
        assert!(!validate_point(&Point::new(10.0, 300.1), Some(&bounds)));
    }

    #[test]
    fn test_point_non_finite() {
        let bounds = CanvasBounds::new(500.0, 300.0);
        assert!(!validate_point(&Point::new(f64::NAN, 10.0), Some(&bounds)));
        assert!(!validate_point(&Point::new(10.0, f64::NAN), Some(&bounds)));
        assert!(!validate_point(&Point::new(f64::INFINITY, 10.0), Some(&bounds)));
    }

    #[test]
    fn test_missing_canvas_fails_closed() {
        assert!(!validate_point(&Point::new(10.0, 10.0), None));
    }

    #[test]
    fn test_json_roundtrip() {
        let point = Point::new(10.0, 20.0);
        let json = serde_json::to_string(&point).unwrap();
        let parsed: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(point, parsed);
    }

    #[test]
    fn test_accepts_integer_coordinates() {
        // Brokers fed by other client variants send integer coordinates.
        let parsed: Point = serde_json::from_str(r#"{"x":10,"y":20}"#).unwrap();
        assert_eq!(parsed, Point::new(10.0, 20.0));
    }

    #[test]
    fn test_rejects_non_numeric_coordinates() {
        assert!(serde_json::from_str::<Point>(r#"{"x":"ten","y":20}"#).is_err());
        assert!(serde_json::from_str::<Point>(r#"{"x":10}"#).is_err());
    }
}
