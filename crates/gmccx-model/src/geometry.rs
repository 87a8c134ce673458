//! Geometric primitives used by components, loads and supports.
//!
//! The model only needs a handful of proximity queries (closest point on a
//! curve or surface, point containment in a closed volume) and coordinate
//! frames, so everything here is plain polyline/triangle geometry on top of
//! nalgebra.

use nalgebra::{Matrix3, Point3, Rotation3, SymmetricEigen, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

pub type Point = Point3<f64>;
pub type Vector = Vector3<f64>;

/// Angle below which two directions count as parallel (radians).
pub const PARALLEL_ANGLE_TOLERANCE: f64 = 1e-3;

/// Distance under which a point counts as lying on a volume boundary.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Oriented coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: Point,
    pub x_axis: Vector,
    pub y_axis: Vector,
}

impl Plane {
    /// Build a frame from two directions; `y` is re-orthogonalised against `x`.
    pub fn new(origin: Point, x: Vector, y: Vector) -> Result<Self> {
        let x_axis = Unit::try_new(x, f64::EPSILON)
            .ok_or_else(|| ModelError::InvalidGeometry("zero length plane x axis".into()))?
            .into_inner();
        let y_perp = y - x_axis * x_axis.dot(&y);
        let y_axis = Unit::try_new(y_perp, f64::EPSILON)
            .ok_or_else(|| ModelError::InvalidGeometry("plane axes are parallel".into()))?
            .into_inner();
        Ok(Self {
            origin,
            x_axis,
            y_axis,
        })
    }

    pub fn world_xy() -> Self {
        Self {
            origin: Point::origin(),
            x_axis: Vector::x(),
            y_axis: Vector::y(),
        }
    }

    pub fn z_axis(&self) -> Vector {
        self.x_axis.cross(&self.y_axis)
    }

    /// Rotate the frame axes by `angle` radians about `axis` (through the origin).
    pub fn rotate(&mut self, angle: f64, axis: &Vector) {
        if let Some(axis) = Unit::try_new(*axis, f64::EPSILON) {
            let rotation = Rotation3::from_axis_angle(&axis, angle);
            self.x_axis = rotation * self.x_axis;
            self.y_axis = rotation * self.y_axis;
        }
    }

    /// Copy of the frame turned by `angle` about its own normal.
    pub fn rotated_about_normal(&self, angle: f64) -> Self {
        let mut rotated = *self;
        rotated.rotate(angle, &self.z_axis());
        rotated
    }

    /// Express a global vector in this frame's axes.
    pub fn to_local(&self, v: &Vector) -> Vector {
        Vector::new(v.dot(&self.x_axis), v.dot(&self.y_axis), v.dot(&self.z_axis()))
    }

    /// Least-squares plane through a point set, origin at the centroid.
    ///
    /// The normal follows the winding of the points when they form a polygon,
    /// the x axis is the direction of largest spread.
    pub fn fit(points: &[Point]) -> Result<Self> {
        if points.len() < 3 {
            return Err(ModelError::PlaneFit(format!(
                "need at least 3 points, got {}",
                points.len()
            )));
        }

        let centroid = centroid(points);
        let mut covariance = Matrix3::zeros();
        for p in points {
            let d = p - centroid;
            covariance += d * d.transpose();
        }
        if !covariance.iter().all(|v| v.is_finite()) {
            return Err(ModelError::PlaneFit("non-finite coordinates".into()));
        }

        let eigen = SymmetricEigen::new(covariance);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
        let (smallest, middle, largest) = (order[0], order[1], order[2]);

        let spread = eigen.eigenvalues[largest];
        if spread <= f64::EPSILON || eigen.eigenvalues[middle] <= spread * 1e-12 {
            return Err(ModelError::PlaneFit("points are coincident or collinear".into()));
        }

        let mut normal: Vector = eigen.eigenvectors.column(smallest).into_owned();
        let mut x_axis: Vector = eigen.eigenvectors.column(largest).into_owned();

        let winding = newell_normal(points);
        if winding.dot(&normal) < 0.0 {
            normal = -normal;
        }
        if let Some(first) = x_axis.iter().copied().find(|c| c.abs() > 1e-12) {
            if first < 0.0 {
                x_axis = -x_axis;
            }
        }

        Plane::new(centroid, x_axis, normal.cross(&x_axis))
    }
}

/// Arithmetic mean of a point set.
pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::origin();
    }
    let sum = points.iter().fold(Vector::zeros(), |acc, p| acc + p.coords);
    Point::from(sum / points.len() as f64)
}

fn newell_normal(points: &[Point]) -> Vector {
    let c = centroid(points);
    let mut n = Vector::zeros();
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        n += (p - c).cross(&(q - c));
    }
    n
}

/// Whether two directions are parallel or anti-parallel within `angle_tolerance`.
pub fn is_parallel(a: &Vector, b: &Vector, angle_tolerance: f64) -> bool {
    let (la, lb) = (a.norm(), b.norm());
    if la == 0.0 || lb == 0.0 {
        return false;
    }
    let cos = (a.dot(b) / (la * lb)).abs().min(1.0);
    cos.acos() < angle_tolerance
}

/// Straight segment, the axis of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
}

impl LineSegment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    pub fn midpoint(&self) -> Point {
        nalgebra::center(&self.start, &self.end)
    }

    pub fn unit_tangent(&self) -> Option<Vector> {
        Unit::try_new(self.end - self.start, f64::EPSILON).map(Unit::into_inner)
    }

    pub fn closest_point(&self, p: &Point) -> Point {
        let d = self.end - self.start;
        let len2 = d.norm_squared();
        if len2 == 0.0 {
            return self.start;
        }
        let t = ((p - self.start).dot(&d) / len2).clamp(0.0, 1.0);
        self.start + d * t
    }
}

/// Open or closed polyline curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.len() < 2 {
            return Err(ModelError::InvalidGeometry(
                "a polyline needs at least 2 points".into(),
            ));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn segments(&self) -> impl Iterator<Item = LineSegment> + '_ {
        self.points
            .windows(2)
            .map(|w| LineSegment::new(w[0], w[1]))
    }

    pub fn closest_point(&self, p: &Point) -> Point {
        closest_of(self.segments().map(|s| s.closest_point(p)), p).unwrap_or(self.points[0])
    }
}

impl From<LineSegment> for Polyline {
    fn from(line: LineSegment) -> Self {
        Self {
            points: vec![line.start, line.end],
        }
    }
}

/// Triangulated surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    vertices: Vec<Point>,
    triangles: Vec<[usize; 3]>,
}

impl Surface {
    pub fn from_triangles(vertices: Vec<Point>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        if triangles.is_empty() {
            return Err(ModelError::InvalidGeometry("surface has no triangles".into()));
        }
        if let Some(bad) = triangles.iter().flatten().find(|&&i| i >= vertices.len()) {
            return Err(ModelError::InvalidGeometry(format!(
                "triangle references vertex {bad} of {}",
                vertices.len()
            )));
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    /// Planar polygon, triangulated as a fan from its first vertex.
    pub fn polygon(outline: Vec<Point>) -> Result<Self> {
        if outline.len() < 3 {
            return Err(ModelError::InvalidGeometry(
                "a polygon needs at least 3 vertices".into(),
            ));
        }
        let triangles = (1..outline.len() - 1).map(|i| [0, i, i + 1]).collect();
        Self::from_triangles(outline, triangles)
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Point; 3]> + '_ {
        self.triangles
            .iter()
            .map(|t| [self.vertices[t[0]], self.vertices[t[1]], self.vertices[t[2]]])
    }

    pub fn closest_point(&self, p: &Point) -> Point {
        closest_of(
            self.triangles()
                .map(|[a, b, c]| closest_point_on_triangle(p, &a, &b, &c)),
            p,
        )
        .unwrap_or(self.vertices[0])
    }

    pub fn distance_to(&self, p: &Point) -> f64 {
        (self.closest_point(p) - p).norm()
    }

    /// Axis-aligned bounding box as (min, max).
    pub fn bounding_box(&self) -> (Point, Point) {
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for v in &self.vertices[1..] {
            for k in 0..3 {
                min[k] = min[k].min(v[k]);
                max[k] = max[k].max(v[k]);
            }
        }
        (min, max)
    }
}

/// Closed triangulated solid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    boundary: Surface,
}

impl Volume {
    /// The boundary must be closed; containment uses ray parity.
    pub fn new(boundary: Surface) -> Self {
        Self { boundary }
    }

    /// Axis-aligned box between two corners.
    pub fn cuboid(a: Point, b: Point) -> Result<Self> {
        let min = Point::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let max = Point::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        if (0..3).any(|k| max[k] - min[k] <= 0.0) {
            return Err(ModelError::InvalidGeometry("cuboid has no volume".into()));
        }

        let corner = |i: usize| {
            Point::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        };
        let vertices = (0..8).map(corner).collect();
        // Outward winding on all six faces.
        let triangles = vec![
            [0, 2, 1], [1, 2, 3], // z min
            [4, 5, 6], [5, 7, 6], // z max
            [0, 1, 4], [1, 5, 4], // y min
            [2, 6, 3], [3, 6, 7], // y max
            [0, 4, 2], [2, 4, 6], // x min
            [1, 3, 5], [3, 7, 5], // x max
        ];
        Ok(Self::new(Surface::from_triangles(vertices, triangles)?))
    }

    pub fn boundary(&self) -> &Surface {
        &self.boundary
    }

    pub fn closest_point(&self, p: &Point) -> Point {
        self.boundary.closest_point(p)
    }

    /// Strict containment: points on the boundary are outside.
    pub fn contains(&self, p: &Point) -> bool {
        if self.boundary.distance_to(p) <= BOUNDARY_EPSILON {
            return false;
        }
        // Skewed direction so the ray does not graze edges of axis-aligned meshes.
        let dir = Vector::new(0.5773, 0.5774, 0.5775);
        let hits = self
            .boundary
            .triangles()
            .filter(|[a, b, c]| ray_hits_triangle(p, &dir, a, b, c))
            .count();
        hits % 2 == 1
    }

    /// (min z, max z) of the bounding box.
    pub fn z_range(&self) -> (f64, f64) {
        let (min, max) = self.boundary.bounding_box();
        (min.z, max.z)
    }
}

fn closest_of(candidates: impl Iterator<Item = Point>, p: &Point) -> Option<Point> {
    candidates.min_by(|a, b| (a - p).norm_squared().total_cmp(&(b - p).norm_squared()))
}

fn closest_point_on_triangle(p: &Point, a: &Point, b: &Point, c: &Point) -> Point {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    let sum = va + vb + vc;
    if sum.abs() <= f64::EPSILON {
        // Degenerate triangle
        let edges = [
            LineSegment::new(*a, *b),
            LineSegment::new(*b, *c),
            LineSegment::new(*c, *a),
        ];
        return closest_of(edges.iter().map(|e| e.closest_point(p)), p).unwrap_or(*a);
    }
    a + ab * (vb / sum) + ac * (vc / sum)
}

fn ray_hits_triangle(origin: &Point, dir: &Vector, a: &Point, b: &Point, c: &Point) -> bool {
    let e1 = b - a;
    let e2 = c - a;
    let h = dir.cross(&e2);
    let det = e1.dot(&h);
    if det.abs() < 1e-14 {
        return false;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = inv * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(&e1);
    let v = inv * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    inv * e2.dot(&q) > 1e-12
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn segment_closest_point_clamps_to_ends() {
        let s = LineSegment::new(Point::new(0.0, 0.0, 0.0), Point::new(2.0, 0.0, 0.0));
        assert_eq!(s.closest_point(&Point::new(1.0, 3.0, 0.0)), Point::new(1.0, 0.0, 0.0));
        assert_eq!(s.closest_point(&Point::new(-5.0, 1.0, 0.0)), s.start);
        assert_eq!(s.closest_point(&Point::new(9.0, 1.0, 0.0)), s.end);
    }

    #[test]
    fn polygon_closest_point_inside_and_outside() {
        let square = Surface::polygon(vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
        ])
        .unwrap();

        let above = square.closest_point(&Point::new(0.25, 0.75, 2.0));
        assert!(approx((above - Point::new(0.25, 0.75, 0.0)).norm(), 0.0));

        let beside = square.closest_point(&Point::new(3.0, 0.5, 0.0));
        assert!(approx((beside - Point::new(1.0, 0.5, 0.0)).norm(), 0.0));
    }

    #[test]
    fn cuboid_contains_is_strict() {
        let v = Volume::cuboid(Point::new(0.0, 0.0, 0.0), Point::new(2.0, 2.0, 2.0)).unwrap();
        assert!(v.contains(&Point::new(1.0, 1.0, 1.0)));
        assert!(v.contains(&Point::new(0.01, 1.0, 1.9)));
        assert!(!v.contains(&Point::new(1.0, 1.0, 2.0)));
        assert!(!v.contains(&Point::new(1.0, 1.0, 2.01)));
        assert!(!v.contains(&Point::new(-1.0, 1.0, 1.0)));
        assert_eq!(v.z_range(), (0.0, 2.0));
    }

    #[test]
    fn fit_plane_follows_polygon_winding() {
        let pts = vec![
            Point::new(0.0, 0.0, 1.0),
            Point::new(2.0, 0.0, 1.0),
            Point::new(2.0, 1.0, 1.0),
            Point::new(0.0, 1.0, 1.0),
        ];
        let plane = Plane::fit(&pts).unwrap();
        assert!(approx(plane.origin.z, 1.0));
        assert!(approx(plane.z_axis().z, 1.0));
        assert!(approx(plane.x_axis.x, 1.0));

        let reversed: Vec<_> = pts.into_iter().rev().collect();
        assert!(approx(Plane::fit(&reversed).unwrap().z_axis().z, -1.0));
    }

    #[test]
    fn fit_plane_rejects_collinear_points() {
        let pts = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 1.0),
            Point::new(2.0, 2.0, 2.0),
        ];
        assert!(matches!(Plane::fit(&pts), Err(ModelError::PlaneFit(_))));
    }

    #[test]
    fn rotation_about_normal_keeps_normal() {
        let plane = Plane::world_xy().rotated_about_normal(std::f64::consts::FRAC_PI_2);
        assert!(approx(plane.x_axis.y, 1.0));
        assert!(approx(plane.y_axis.x, -1.0));
        assert!(approx(plane.z_axis().z, 1.0));
    }

    #[test]
    fn to_local_projects_on_axes() {
        let plane = Plane::new(Point::origin(), Vector::z(), Vector::x()).unwrap();
        let local = plane.to_local(&Vector::new(1.0, 2.0, 3.0));
        assert!(approx(local.x, 3.0));
        assert!(approx(local.y, 1.0));
        assert!(approx(local.z, 2.0));
    }
}
