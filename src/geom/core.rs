use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Hard iteration cap shared by every iterative solver in the kernel.
pub const MAX_ITERATIONS: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Vector trait
// ─────────────────────────────────────────────────────────────────────────────

/// A value that Hermite interpolation can blend.
///
/// Curves are interpolated over 3-D coordinates, 2-D surface proportions and
/// plain scalar fields, so every curve routine is generic over this trait.
/// Cross products and curvature stay on [`Vec3`].
pub trait Vector:
    Copy
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + Neg<Output = Self>
{
    const ZERO: Self;
    const DIMENSION: usize;

    #[must_use]
    fn dot(self, rhs: Self) -> f64;

    /// Component `index`, which must be below [`Vector::DIMENSION`].
    #[must_use]
    fn component(self, index: usize) -> f64;

    #[must_use]
    fn magnitude(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero or
    /// non-finite vector.
    #[must_use]
    fn normalized(self) -> Option<Self> {
        let len = self.magnitude();
        if len.is_finite() && len > 0.0 {
            Some(self * (1.0 / len))
        } else {
            None
        }
    }

    /// Same direction with length `magnitude`, or `None` for a zero vector.
    #[must_use]
    fn with_magnitude(self, magnitude: f64) -> Option<Self> {
        self.normalized().map(|unit| unit * magnitude)
    }

    /// Largest absolute component.
    #[must_use]
    fn max_abs_component(self) -> f64 {
        (0..Self::DIMENSION)
            .map(|i| self.component(i).abs())
            .fold(0.0, f64::max)
    }
}

impl Vector for f64 {
    const ZERO: Self = 0.0;
    const DIMENSION: usize = 1;

    fn dot(self, rhs: Self) -> f64 {
        self * rhs
    }

    fn component(self, _index: usize) -> f64 {
        self
    }

    fn magnitude(self) -> f64 {
        self.abs()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit vector along the X axis.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit vector along the Y axis.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit vector along the Z axis.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }
}

impl Vector for Vec3 {
    const ZERO: Self = Vec3::ZERO;
    const DIMENSION: usize = 3;

    fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    fn component(self, index: usize) -> f64 {
        match index {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::from_array(arr)
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        rhs * self
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vec2
// ─────────────────────────────────────────────────────────────────────────────

/// Two components, used for (ξ1, ξ2) increments and surface proportions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl Vector for Vec2 {
    const ZERO: Self = Vec2::ZERO;
    const DIMENSION: usize = 2;

    fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    fn component(self, index: usize) -> f64 {
        if index == 0 { self.x } else { self.y }
    }
}

impl From<[f64; 2]> for Vec2 {
    fn from(arr: [f64; 2]) -> Self {
        Self::new(arr[0], arr[1])
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f64 {
    type Output = Vec2;
    fn mul(self, rhs: Vec2) -> Self::Output {
        rhs * self
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Free vector functions
// ─────────────────────────────────────────────────────────────────────────────

#[must_use]
pub fn dot<V: Vector>(a: V, b: V) -> f64 {
    a.dot(b)
}

#[must_use]
pub const fn cross(a: Vec3, b: Vec3) -> Vec3 {
    a.cross(b)
}

#[must_use]
pub fn magnitude<V: Vector>(v: V) -> f64 {
    v.magnitude()
}

/// Unit vector, or `None` when `v` has zero length.
#[must_use]
pub fn normalize<V: Vector>(v: V) -> Option<V> {
    v.normalized()
}

/// `v` rescaled to length `mag`, or `None` when `v` has zero length.
#[must_use]
pub fn set_magnitude<V: Vector>(v: V, mag: f64) -> Option<V> {
    v.with_magnitude(mag)
}

/// Dot product of two equal-length slices.
#[must_use]
pub fn dot_slices(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "dot_slices needs equal lengths");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Dense matrices
// ─────────────────────────────────────────────────────────────────────────────

#[must_use]
pub fn identity_matrix(size: usize) -> Vec<Vec<f64>> {
    (0..size)
        .map(|row| (0..size).map(|col| if row == col { 1.0 } else { 0.0 }).collect())
        .collect()
}

/// `a bᵀ` as a row-major matrix.
#[must_use]
pub fn outer_product(a: &[f64], b: &[f64]) -> Vec<Vec<f64>> {
    a.iter().map(|&ai| b.iter().map(|&bj| ai * bj).collect()).collect()
}

#[must_use]
pub fn matrix_diagonal(matrix: &[Vec<f64>]) -> Vec<f64> {
    matrix
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row.get(i).copied())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// BBox
// ─────────────────────────────────────────────────────────────────────────────

/// Axis-aligned bounds of a coordinate set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox {
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Bounds of `points`, or `None` when the slice is empty.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(Self::new(*first, *first), |bbox, p| {
            Self::new(bbox.min.min(*p), bbox.max.max(*p))
        }))
    }

    #[must_use]
    pub fn extent(self) -> Vec3 {
        self.max - self.min
    }

    /// Largest extent over the three axes.
    #[must_use]
    pub fn max_extent(self) -> f64 {
        let e = self.extent();
        e.x.max(e.y).max(e.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Tolerances used by the iterative solvers.
///
/// Each constant matches one convergence or boundary test:
/// - `ARC_LENGTH`: relative arc-length and smoothing tolerance (1e-6)
/// - `XI`: element-local coordinate convergence (1e-6)
/// - `NEAREST_XI`: nearest-point ξ step convergence (1e-7)
/// - `ELLIPSE_ARC`: ellipse arc-length match, relative to `a + b` (1e-4)
/// - `BOUNDARY_PROPORTION`: snapping a position onto a surface edge (1e-8)
/// - `BOUNDARY_DIRECTION`: detecting the outward edge direction (1e-5)
/// - `SMALL_ANGLE`: treating projection bend angles as zero (1e-6)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    pub const ARC_LENGTH: Self = Self { eps: 1e-6 };

    pub const XI: Self = Self { eps: 1e-6 };

    pub const NEAREST_XI: Self = Self { eps: 1e-7 };

    pub const ELLIPSE_ARC: Self = Self { eps: 1e-4 };

    pub const BOUNDARY_PROPORTION: Self = Self { eps: 1e-8 };

    pub const BOUNDARY_DIRECTION: Self = Self { eps: 1e-5 };

    pub const SMALL_ANGLE: Self = Self { eps: 1e-6 };

    /// Tolerance for detecting zero-length vectors (1e-12).
    pub const ZERO_LENGTH: Self = Self { eps: 1e-12 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    /// Tolerance relative to a length scale: `eps * |span|`.
    #[must_use]
    pub fn relative_to(self, span: f64) -> f64 {
        self.eps * span.abs()
    }

    #[must_use]
    pub fn approx_eq_f64(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    #[must_use]
    pub fn approx_eq_vec3(self, a: Vec3, b: Vec3) -> bool {
        (a - b).length_squared() <= self.eps * self.eps
    }

    #[must_use]
    pub fn is_zero_vec3(self, v: Vec3) -> bool {
        v.length_squared() <= self.eps * self.eps
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::ARC_LENGTH
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_constants() {
        assert_eq!(Vec3::ZERO, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
    }

    #[test]
    fn test_vec3_operators() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(2.0 * a, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a / 2.0, Vec3::new(0.5, 1.0, 1.5));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
    }

    #[test]
    fn test_vector_trait_on_scalars() {
        assert_eq!(Vector::dot(3.0_f64, -2.0), -6.0);
        assert_eq!(magnitude(-4.0_f64), 4.0);
        assert_eq!(normalize(-4.0_f64), Some(-1.0));
        assert_eq!(normalize(0.0_f64), None);
    }

    #[test]
    fn test_max_abs_component() {
        assert_eq!(Vec3::new(1.0, -5.0, 2.0).max_abs_component(), 5.0);
        assert_eq!(Vec2::new(-0.5, 0.25).max_abs_component(), 0.5);
    }

    #[test]
    fn test_matrix_helpers() {
        let id = identity_matrix(3);
        assert_eq!(matrix_diagonal(&id), vec![1.0, 1.0, 1.0]);
        let outer = outer_product(&[1.0, 2.0], &[3.0, 4.0, 5.0]);
        assert_eq!(outer, vec![vec![3.0, 4.0, 5.0], vec![6.0, 8.0, 10.0]]);
        assert_eq!(matrix_diagonal(&outer), vec![3.0, 8.0]);
    }

    #[test]
    fn test_bbox_from_points() {
        assert!(BBox::from_points(&[]).is_none());
        let bbox = BBox::from_points(&[
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(-2.0, 3.0, 0.5),
        ])
        .unwrap();
        assert_eq!(bbox.min, Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(bbox.max_extent(), 4.0);
    }

    #[test]
    fn test_tolerance_relative() {
        assert!((Tolerance::ELLIPSE_ARC.relative_to(-3.0) - 3e-4).abs() < 1e-15);
        assert!(Tolerance::ZERO_LENGTH.is_zero_vec3(Vec3::new(1e-13, 0.0, 0.0)));
    }
}
