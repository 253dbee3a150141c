//! Per-contour geometric descriptors and the shape classification rules.

use imageproc::contours::Contour;
use imageproc::geometry::{approximate_polygon_dp, convex_hull, min_area_rect};
use imageproc::point::Point;
use nalgebra::Matrix2;

/// Douglas-Peucker tolerance as a fraction of the contour perimeter.
const POLY_APPROX_TOLERANCE: f64 = 0.02;

/// Geometric kind assigned to one contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Circle,
    Rectangle,
    Triangle,
    Other,
}

/// Descriptors computed for one surviving contour.
#[derive(Debug, Clone)]
pub struct ContourStats {
    pub perimeter: f64,
    pub area: f64,
    /// `4*pi*area / perimeter^2`; 1.0 for a perfect circle.
    pub circularity: f64,
    /// Contour area over convex hull area; measures concavity.
    pub solidity: f64,
    /// Minor over major axis of the second-moment ellipse, when the
    /// contour has at least five points.
    pub axis_ratio: Option<f64>,
    /// Vertex count of the Douglas-Peucker approximation.
    pub vertex_count: usize,
    /// Short side over long side of the minimum-area bounding rectangle.
    pub rect_aspect: f64,
}

/// Shoelace area of a closed point loop.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        twice_area += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (twice_area.abs() as f64) / 2.0
}

fn polygon_perimeter(points: &[Point<i32>]) -> f64 {
    let mut length = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let dx = (a.x - b.x) as f64;
        let dy = (a.y - b.y) as f64;
        length += (dx * dx + dy * dy).sqrt();
    }
    length
}

/// Minor/major axis ratio of the ellipse of inertia of the boundary points.
fn moment_axis_ratio(points: &[Point<i32>]) -> Option<f64> {
    if points.len() < 5 {
        return None;
    }
    let n = points.len() as f64;
    let (mut mx, mut my) = (0.0, 0.0);
    for p in points {
        mx += p.x as f64;
        my += p.y as f64;
    }
    mx /= n;
    my /= n;

    let (mut cxx, mut cyy, mut cxy) = (0.0, 0.0, 0.0);
    for p in points {
        let dx = p.x as f64 - mx;
        let dy = p.y as f64 - my;
        cxx += dx * dx;
        cyy += dy * dy;
        cxy += dx * dy;
    }
    cxx /= n;
    cyy /= n;
    cxy /= n;

    let eigen = Matrix2::new(cxx, cxy, cxy, cyy).symmetric_eigen();
    let l1 = eigen.eigenvalues[0].max(0.0);
    let l2 = eigen.eigenvalues[1].max(0.0);
    let (minor, major) = if l1 < l2 { (l1, l2) } else { (l2, l1) };
    if major <= f64::EPSILON {
        return None;
    }
    Some((minor / major).sqrt())
}

fn min_rect_aspect(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let corners = min_area_rect(points);
    let side = |a: Point<i32>, b: Point<i32>| {
        let dx = (a.x - b.x) as f64;
        let dy = (a.y - b.y) as f64;
        (dx * dx + dy * dy).sqrt()
    };
    let w = side(corners[0], corners[1]);
    let h = side(corners[1], corners[2]);
    let (short, long) = if w < h { (w, h) } else { (h, w) };
    if long <= f64::EPSILON {
        0.0
    } else {
        short / long
    }
}

impl ContourStats {
    pub fn from_contour(contour: &Contour<i32>) -> Self {
        let points = &contour.points;
        let perimeter = polygon_perimeter(points);
        let area = polygon_area(points);
        let circularity = if perimeter > 0.0 {
            4.0 * std::f64::consts::PI * area / (perimeter * perimeter)
        } else {
            0.0
        };

        let hull = convex_hull(points.as_slice());
        let hull_area = polygon_area(&hull);
        let solidity = if hull_area > 0.0 { area / hull_area } else { 0.0 };

        let approx = approximate_polygon_dp(points, POLY_APPROX_TOLERANCE * perimeter, true);

        ContourStats {
            perimeter,
            area,
            circularity,
            solidity,
            axis_ratio: moment_axis_ratio(points),
            vertex_count: approx.len(),
            rect_aspect: min_rect_aspect(points),
        }
    }

    /// Classify by geometric descriptors. Circles are checked first (round
    /// and solid, or near-isotropic and very solid); everything else falls
    /// through to the polygon-approximation rules.
    pub fn classify(&self) -> ShapeKind {
        let round_and_solid = self.circularity > 0.75 && self.solidity > 0.85;
        let isotropic_and_solid =
            self.axis_ratio.is_some_and(|r| r > 0.85) && self.solidity > 0.9;
        if round_and_solid || isotropic_and_solid {
            return ShapeKind::Circle;
        }

        let v = self.vertex_count;
        let aspect = self.rect_aspect;
        if v == 3 || (v == 4 && aspect < 0.6) {
            ShapeKind::Triangle
        } else if (v == 4 && aspect > 0.7) || (v <= 6 && aspect > 0.8) {
            ShapeKind::Rectangle
        } else {
            ShapeKind::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::contours::BorderType;

    fn stats(
        circularity: f64,
        solidity: f64,
        axis_ratio: Option<f64>,
        vertex_count: usize,
        rect_aspect: f64,
    ) -> ContourStats {
        ContourStats {
            perimeter: 100.0,
            area: 500.0,
            circularity,
            solidity,
            axis_ratio,
            vertex_count,
            rect_aspect,
        }
    }

    #[test]
    fn classification_rule_table() {
        // Round and solid.
        assert_eq!(stats(0.9, 0.95, None, 12, 1.0).classify(), ShapeKind::Circle);
        // Isotropic and very solid, even with low circularity.
        assert_eq!(
            stats(0.5, 0.95, Some(0.9), 12, 1.0).classify(),
            ShapeKind::Circle
        );
        // Three vertices.
        assert_eq!(stats(0.5, 0.8, Some(0.5), 3, 0.5).classify(), ShapeKind::Triangle);
        // Thin four-vertex sliver counts as a triangle.
        assert_eq!(stats(0.5, 0.8, Some(0.3), 4, 0.4).classify(), ShapeKind::Triangle);
        // Square-ish quadrilateral.
        assert_eq!(stats(0.6, 0.8, Some(0.7), 4, 0.9).classify(), ShapeKind::Rectangle);
        // Hexagon with near-square bounding box.
        assert_eq!(stats(0.6, 0.8, Some(0.7), 6, 0.85).classify(), ShapeKind::Rectangle);
        // Concave many-vertex blob.
        assert_eq!(stats(0.3, 0.5, Some(0.4), 9, 0.5).classify(), ShapeKind::Other);
        // Four vertices in the aspect gap between triangle and rectangle.
        assert_eq!(stats(0.5, 0.8, Some(0.5), 4, 0.65).classify(), ShapeKind::Other);
    }

    #[test]
    fn shoelace_area_of_a_square() {
        let square = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(polygon_area(&square), 100.0);
        assert_eq!(polygon_area(&square[..2]), 0.0);
    }

    #[test]
    fn descriptor_pipeline_on_a_synthetic_square_contour() {
        // Boundary points of an axis-aligned 21x21 square.
        let mut points = Vec::new();
        for i in 0..=20 {
            points.push(Point::new(i, 0));
        }
        for i in 1..=20 {
            points.push(Point::new(20, i));
        }
        for i in (0..20).rev() {
            points.push(Point::new(i, 20));
        }
        for i in (1..20).rev() {
            points.push(Point::new(0, i));
        }
        let contour = Contour {
            points,
            border_type: BorderType::Outer,
            parent: None,
        };
        let stats = ContourStats::from_contour(&contour);

        assert!((stats.area - 400.0).abs() < 1.0);
        assert!((stats.perimeter - 80.0).abs() < 1.0);
        assert!(stats.solidity > 0.99);
        assert_eq!(stats.vertex_count, 4);
        assert!((stats.rect_aspect - 1.0).abs() < 0.05);
        // A square's circularity is pi/4.
        assert!((stats.circularity - std::f64::consts::FRAC_PI_4).abs() < 0.02);
    }

    #[test]
    fn moment_axis_ratio_is_isotropic_for_squares() {
        let points: Vec<Point<i32>> = (0..=20)
            .map(|i| Point::new(i, 0))
            .chain((1..=20).map(|i| Point::new(20, i)))
            .chain((0..20).rev().map(|i| Point::new(i, 20)))
            .chain((1..20).rev().map(|i| Point::new(0, i)))
            .collect();
        let ratio = moment_axis_ratio(&points).unwrap();
        assert!(ratio > 0.95, "got {ratio}");

        // Too few points yields no fit.
        assert_eq!(moment_axis_ratio(&points[..4]), None);
    }
}
