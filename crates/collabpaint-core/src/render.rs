//! Canvas rendering abstraction.
//!
//! The client only ever issues one kind of draw call: a small filled circle
//! at a received or published point. Hosts implement [`CanvasSurface`] over
//! whatever actually paints (an HTML canvas, a GUI framebuffer, a terminal).

use crate::point::{CanvasBounds, Point};

/// Radius of a rendered point.
pub const POINT_RADIUS: f64 = 3.0;

/// An RGB color triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const BLACK: Rgb = Rgb(0, 0, 0);
}

/// Fill color for rendered points.
pub const POINT_FILL: Rgb = Rgb::RED;
/// Stroke color for rendered points.
pub const POINT_STROKE: Rgb = Rgb::BLACK;

/// A 2D surface points are drawn onto.
pub trait CanvasSurface {
    /// Surface width in canvas units.
    fn width(&self) -> f64;

    /// Surface height in canvas units.
    fn height(&self) -> f64;

    /// Draw a filled, stroked circle centered at `(cx, cy)`.
    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, fill: Rgb, stroke: Rgb);

    /// Bounds used for point validation.
    fn bounds(&self) -> CanvasBounds {
        CanvasBounds::new(self.width(), self.height())
    }
}

/// Render a point with the fixed style. Pixels are not tracked: points are
/// drawn once and cannot be reconstructed by a redraw.
pub fn draw_point<C: CanvasSurface>(canvas: &mut C, point: &Point) {
    canvas.fill_circle(point.x, point.y, POINT_RADIUS, POINT_FILL, POINT_STROKE);
}

/// In-memory surface recording every circle drawn.
///
/// Used by headless hosts and tests that need to observe draw calls.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: f64,
    height: f64,
    /// Circles drawn so far, in draw order.
    pub drawn: Vec<(f64, f64, f64, Rgb, Rgb)>,
}

impl RecordingCanvas {
    /// Create a recording surface with the given dimensions.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            drawn: Vec::new(),
        }
    }

    /// Centers of all circles drawn so far.
    pub fn points(&self) -> Vec<Point> {
        self.drawn
            .iter()
            .map(|&(x, y, _, _, _)| Point::new(x, y))
            .collect()
    }
}

impl CanvasSurface for RecordingCanvas {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, fill: Rgb, stroke: Rgb) {
        self.drawn.push((cx, cy, radius, fill, stroke));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_point_uses_fixed_style() {
        let mut canvas = RecordingCanvas::new(500.0, 300.0);
        draw_point(&mut canvas, &Point::new(10.0, 20.0));
        assert_eq!(
            canvas.drawn,
            vec![(10.0, 20.0, POINT_RADIUS, POINT_FILL, POINT_STROKE)]
        );
    }

    #[test]
    fn test_bounds_match_dimensions() {
        let canvas = RecordingCanvas::new(640.0, 480.0);
        assert_eq!(canvas.bounds(), CanvasBounds::new(640.0, 480.0));
    }
}
