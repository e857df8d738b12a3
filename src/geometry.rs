//! Planar geometry: vectors, points, rectangles and coverage polygons.
//!
//! Coverage regions are simple polygons; containment uses the
//! odd-crossing rule against a horizontal ray. Points exactly on an edge
//! fall on whichever side the arithmetic puts them.

use serde::{Deserialize, Serialize};

use crate::error::{PuddleError, PuddleResult};

// ── Vector ────────────────────────────────────────────────────────────

/// A 2D displacement or velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Vector { x, y }
    }

    /// Build a vector from a length and a heading in radians.
    pub fn from_polar(magnitude: f64, angle: f64) -> Self {
        Vector {
            x: magnitude * angle.cos(),
            y: magnitude * angle.sin(),
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Heading in radians, measured counter-clockwise from +x.
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn scaled(&self, factor: f64) -> Vector {
        Vector::new(self.x * factor, self.y * factor)
    }
}

// ── Point ─────────────────────────────────────────────────────────────

/// A location in the simulation plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// The point reached after moving along `v` for `dt` time units.
    pub fn translated(&self, v: Vector, dt: f64) -> Point {
        Point::new(self.x + v.x * dt, self.y + v.y * dt)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Point::new(x, y)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

// ── Rectangle ─────────────────────────────────────────────────────────

/// Axis-aligned rectangle anchored at its lower-left corner.
///
/// Width and height are always strictly positive; non-positive inputs
/// are coerced to 1 on each axis independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        let width = if width > 0.0 { width } else { 1.0 };
        let height = if height > 0.0 { height } else { 1.0 };
        Rectangle { x, y, width, height }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

// ── Polygon ───────────────────────────────────────────────────────────

/// A simple polygon with at least three vertices.
///
/// Vertex `i` connects to vertex `(i + 1) % n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Build a polygon from its vertices in order.
    pub fn new(vertices: Vec<Point>) -> PuddleResult<Self> {
        if vertices.len() < 3 {
            return Err(PuddleError::InsufficientVertices {
                count: vertices.len(),
            });
        }
        Ok(Polygon { vertices })
    }

    /// Build a polygon from parallel x and y coordinate arrays.
    pub fn from_coordinates(xs: &[f64], ys: &[f64]) -> PuddleResult<Self> {
        if xs.len() != ys.len() {
            return Err(PuddleError::MismatchedCoordinates {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        Polygon::new(xs.iter().zip(ys).map(|(&x, &y)| Point::new(x, y)).collect())
    }

    /// Axis-aligned rectangle as a four-vertex polygon.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> PuddleResult<Self> {
        Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Always false: construction rejects polygons with fewer than 3 vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Point-in-polygon by ray-crossing parity.
    pub fn contains(&self, p: &Point) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (vi, vj) = (self.vertices[i], self.vertices[j]);
            if (vi.y > p.y) != (vj.y > p.y)
                && p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Smallest axis-aligned rectangle enclosing every vertex.
    pub fn bounding_box(&self) -> Rectangle {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in &self.vertices {
            min_x = min_x.min(v.x);
            min_y = min_y.min(v.y);
            max_x = max_x.max(v.x);
            max_y = max_y.max(v.y);
        }
        Rectangle::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

impl TryFrom<Vec<Point>> for Polygon {
    type Error = PuddleError;

    fn try_from(vertices: Vec<Point>) -> PuddleResult<Self> {
        Polygon::new(vertices)
    }
}

impl From<Polygon> for Vec<Point> {
    fn from(polygon: Polygon) -> Self {
        polygon.vertices
    }
}

impl std::fmt::Display for Polygon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.vertices.len() {
            3 => write!(f, "Triangle"),
            4 => write!(f, "Quadrilateral"),
            5 => write!(f, "Pentagon"),
            6 => write!(f, "Hexagon"),
            n => write!(f, "{}-gon", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strip() -> Polygon {
        Polygon::from_coordinates(&[0.0, 6.0, 6.0, 0.0], &[0.0, 0.0, 2.0, 2.0]).unwrap()
    }

    #[test]
    fn test_polygon_contains_interior_point() {
        let p = strip();
        assert!(p.contains(&Point::new(3.0, 1.0)));
        assert!(!p.contains(&Point::new(7.0, 1.0)));
        // Repeatable.
        assert!(p.contains(&Point::new(3.0, 1.0)));
    }

    #[test]
    fn test_polygon_rejects_too_few_vertices() {
        let err = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, PuddleError::InsufficientVertices { count: 2 }));
    }

    #[test]
    fn test_polygon_rejects_mismatched_arrays() {
        let err = Polygon::from_coordinates(&[0.0, 1.0, 2.0], &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, PuddleError::MismatchedCoordinates { xs: 3, ys: 2 }));
    }

    #[test]
    fn test_concave_polygon() {
        // L-shape: the notch at (3, 3) is outside.
        let l = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 2.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 4.0),
            Point::new(0.0, 4.0),
        ])
        .unwrap();
        assert!(l.contains(&Point::new(1.0, 3.0)));
        assert!(l.contains(&Point::new(3.0, 1.0)));
        assert!(!l.contains(&Point::new(3.0, 3.0)));
    }

    #[test]
    fn test_polygon_display_names_shape() {
        assert_eq!(strip().to_string(), "Quadrilateral");
        let tri = Polygon::from_coordinates(&[0.0, 1.0, 0.0], &[0.0, 0.0, 1.0]).unwrap();
        assert_eq!(tri.to_string(), "Triangle");
    }

    #[test]
    fn test_bounding_box() {
        let bb = strip().bounding_box();
        assert_eq!((bb.x(), bb.y(), bb.width(), bb.height()), (0.0, 0.0, 6.0, 2.0));
    }

    #[test]
    fn test_polygon_deserialize_validates() {
        let ok: Polygon =
            serde_json::from_str(r#"[{"x":0,"y":0},{"x":1,"y":0},{"x":0,"y":1}]"#).unwrap();
        assert_eq!(ok.len(), 3);
        assert!(serde_json::from_str::<Polygon>(r#"[{"x":0,"y":0}]"#).is_err());
    }

    #[test]
    fn test_rectangle_coerces_each_axis() {
        let r = Rectangle::new(0.0, 0.0, -3.0, 0.0);
        assert_eq!(r.width(), 1.0);
        assert_eq!(r.height(), 1.0);

        let r = Rectangle::new(0.0, 0.0, 5.0, -1.0);
        assert_eq!(r.width(), 5.0);
        assert_eq!(r.height(), 1.0);
    }

    #[test]
    fn test_vector_polar() {
        let v = Vector::from_polar(2.0, std::f64::consts::FRAC_PI_2);
        assert!(v.x.abs() < 1e-12);
        assert!((v.y - 2.0).abs() < 1e-12);
        assert!((v.magnitude() - 2.0).abs() < 1e-12);
        assert!((v.angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_rectangle_polygon_matches_rectangle(
            x in -50.0f64..50.0,
            y in -50.0f64..50.0,
            w in 0.5f64..20.0,
            h in 0.5f64..20.0,
            fx in 0.01f64..0.99,
            fy in 0.01f64..0.99,
        ) {
            let poly = Polygon::rectangle(x, y, w, h).unwrap();
            let inside = Point::new(x + fx * w, y + fy * h);
            prop_assert!(poly.contains(&inside));
            let outside = Point::new(x + w + 1.0 + fx, y + fy * h);
            prop_assert!(!poly.contains(&outside));
        }
    }
}
