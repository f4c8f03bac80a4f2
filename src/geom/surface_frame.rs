//! Local frames on a parametric surface patch.
//!
//! Shared by the ellipsoid solvers and [`super::TrackSurface`]: mapping a
//! 3-D direction into (ξ1, ξ2) increments, building an orthonormal frame
//! from the two tangents, and clipping ξ increments to the unit square.

use serde::{Deserialize, Serialize};

use super::core::{Vec2, Vec3, Vector};

/// ξ increments `(δ1, δ2)` whose combination `δ1 d1 + δ2 d2` best matches
/// `direction` in the least-squares sense.
///
/// Where the tangents are linearly dependent (a degenerate pole) the
/// direction is assigned wholly to `d2` if it has any component along it,
/// otherwise to `d1`, with the sign of that component and magnitude
/// `|direction| / |d|`.
#[must_use]
pub fn calculate_surface_delta_xi(d1: Vec3, d2: Vec3, direction: Vec3) -> Vec2 {
    let a00 = d1.dot(d1);
    let a01 = d1.dot(d2);
    let a11 = d2.dot(d2);
    let b0 = d1.dot(direction);
    let b1 = d2.dot(direction);
    let det = a00 * a11 - a01 * a01;
    if det > 0.0 {
        return Vec2::new((a11 * b0 - a01 * b1) / det, (a00 * b1 - a01 * b0) / det);
    }
    if b1 != 0.0 {
        Vec2::new(0.0, b1.signum() * direction.length() / d2.length())
    } else if b0 != 0.0 {
        Vec2::new(b0.signum() * direction.length() / d1.length(), 0.0)
    } else {
        Vec2::ZERO
    }
}

/// Orthonormal frame on a surface at a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceAxes {
    /// In the surface, along the projected direction.
    pub ax1: Vec3,
    /// In the surface, normal to `ax1`.
    pub ax2: Vec3,
    /// Surface normal `d1 × d2`.
    pub ax3: Vec3,
}

/// Frame with `ax1` along `direction` projected into the tangent plane.
///
/// Where the tangents are parallel `ax2` and `ax3` are zero.
#[must_use]
pub fn calculate_surface_axes(d1: Vec3, d2: Vec3, direction: Vec3) -> SurfaceAxes {
    let delta = calculate_surface_delta_xi(d1, d2, direction);
    let ax1 = (d1 * delta.x + d2 * delta.y)
        .normalized()
        .unwrap_or(Vec3::ZERO);
    match d1.cross(d2).normalized() {
        Some(ax3) => SurfaceAxes {
            ax1,
            ax2: ax3.cross(ax1).normalized().unwrap_or(Vec3::ZERO),
            ax3,
        },
        None => SurfaceAxes {
            ax1,
            ax2: Vec3::ZERO,
            ax3: Vec3::ZERO,
        },
    }
}

/// Side of the unit square crossed by a ξ increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SquareFace {
    /// ξ1 = 0.
    Xi1Min,
    /// ξ1 = 1.
    Xi1Max,
    /// ξ2 = 0.
    Xi2Min,
    /// ξ2 = 1.
    Xi2Max,
}

/// Result of [`increment_xi_on_square`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareIncrement {
    pub xi: Vec2,
    /// Fraction of the increment applied: 1 unless a face was hit.
    pub proportion: f64,
    pub face: Option<SquareFace>,
}

/// Add `dxi` to `xi`, stopping at the first face of the unit square crossed.
///
/// The other coordinate moves in proportion so the step keeps its
/// direction.
#[must_use]
pub fn increment_xi_on_square(xi: Vec2, dxi: Vec2) -> SquareIncrement {
    let target = xi + dxi;
    let mut result = SquareIncrement {
        xi: target,
        proportion: 1.0,
        face: None,
    };
    let outside = |v: f64| !(0.0..=1.0).contains(&v);
    if !(outside(target.x) || outside(target.y)) {
        return result;
    }
    let mut consider = |proportion: f64, face: SquareFace| {
        if proportion < result.proportion {
            result.proportion = proportion;
            result.face = Some(face);
            result.xi = match face {
                SquareFace::Xi1Min => Vec2::new(0.0, xi.y + proportion * dxi.y),
                SquareFace::Xi1Max => Vec2::new(1.0, xi.y + proportion * dxi.y),
                SquareFace::Xi2Min => Vec2::new(xi.x + proportion * dxi.x, 0.0),
                SquareFace::Xi2Max => Vec2::new(xi.x + proportion * dxi.x, 1.0),
            };
        }
    };
    if target.x < 0.0 && dxi.x < 0.0 {
        consider(-xi.x / dxi.x, SquareFace::Xi1Min);
    } else if target.x > 1.0 && dxi.x > 0.0 {
        consider((1.0 - xi.x) / dxi.x, SquareFace::Xi1Max);
    }
    if target.y < 0.0 && dxi.y < 0.0 {
        consider(-xi.y / dxi.y, SquareFace::Xi2Min);
    } else if target.y > 1.0 && dxi.y > 0.0 {
        consider((1.0 - xi.y) / dxi.y, SquareFace::Xi2Max);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_xi_orthogonal_tangents() {
        let d = calculate_surface_delta_xi(
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
            Vec3::new(1.0, 1.0, 0.5),
        );
        assert!((d.x - 0.5).abs() < 1e-12);
        assert!((d.y - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_delta_xi_degenerate_uses_d2() {
        let d = calculate_surface_delta_xi(Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, -3.0, 0.0));
        assert_eq!(d, Vec2::new(0.0, -1.5));
    }

    #[test]
    fn test_delta_xi_degenerate_falls_back_to_d1() {
        let d = calculate_surface_delta_xi(Vec3::new(2.0, 0.0, 0.0), Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(d, Vec2::new(2.0, 0.0));
    }

    #[test]
    fn test_increment_inside_square() {
        let inc = increment_xi_on_square(Vec2::new(0.2, 0.3), Vec2::new(0.1, 0.1));
        assert_eq!(inc.face, None);
        assert_eq!(inc.proportion, 1.0);
    }

    #[test]
    fn test_increment_hits_first_face() {
        let inc = increment_xi_on_square(Vec2::new(0.8, 0.5), Vec2::new(0.4, 0.8));
        assert_eq!(inc.face, Some(SquareFace::Xi1Max));
        assert!((inc.proportion - 0.5).abs() < 1e-12);
        assert!((inc.xi.y - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_surface_axes_flat() {
        let axes = calculate_surface_axes(Vec3::X, Vec3::Y, Vec3::new(0.0, 3.0, 1.0));
        assert_eq!(axes.ax1, Vec3::Y);
        assert_eq!(axes.ax3, Vec3::Z);
        assert_eq!(axes.ax2, -Vec3::X);
    }
}
