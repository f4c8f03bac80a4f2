//! Cubic Hermite interpolation primitives.
//!
//! A segment is defined by values `v1`, `v2` and derivatives `d1`, `d2` at
//! ξ = 0 and ξ = 1. The basis functions are
//!
//! ```text
//! f1 = 1 - 3ξ² + 2ξ³    f2 = ξ - 2ξ² + ξ³
//! f3 = 3ξ² - 2ξ³        f4 = -ξ² + ξ³
//! ```
//!
//! and every routine here is generic over [`Vector`] so the same code blends
//! 3-D coordinates, 2-D surface proportions and scalar fields.
//!
//! # Operations
//! - **Basis**: values, first and second derivatives of the cubic basis,
//!   plus the quadratic Hermite-Lagrange and Lagrange-Hermite forms.
//! - **Arc length**: 4-point Gauss quadrature, and an iterative rescaling
//!   that finds the length when derivative magnitudes are not arc-length.
//! - **Point at distance**: Newton search for the location a given arc
//!   distance along a multi-segment curve.
//! - **Curvature**: signed along a radial direction, or unsigned.

use thiserror::Error;

use super::core::{MAX_ITERATIONS, Tolerance, Vec3, Vector};
use super::curve_location::CurveLocation;
use super::diagnostics::IterationResult;

/// Gauss-Legendre abscissae for 4 points, mapped onto [0, 1].
pub const GAUSS_XI_4: [f64; 4] = [
    0.069_431_844_202_973_7,
    0.330_009_478_207_571_9,
    0.669_990_521_792_428_1,
    0.930_568_155_797_026_3,
];

/// Weights matching [`GAUSS_XI_4`], summing to 1.
pub const GAUSS_WEIGHT_4: [f64; 4] = [
    0.173_927_422_568_726_92,
    0.326_072_577_431_273_05,
    0.326_072_577_431_273_05,
    0.173_927_422_568_726_92,
];

/// Errors for malformed curve input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("curve needs at least {required} nodes, got {count}")]
    TooFewNodes { required: usize, count: usize },

    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("at least one output element is required")]
    ZeroElements,

    #[error("node index {index} out of range for {count} nodes")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("location in element {element} is outside a curve of {count} elements")]
    LocationOutOfRange { element: usize, count: usize },
}

/// Check a node/derivative pair of lists describes a curve of at least
/// `required` nodes.
pub(crate) fn check_curve<V, W>(
    x: &[V],
    d: &[W],
    required: usize,
) -> Result<(), InterpolationError> {
    if x.len() < required {
        return Err(InterpolationError::TooFewNodes {
            required,
            count: x.len(),
        });
    }
    if d.len() != x.len() {
        return Err(InterpolationError::LengthMismatch {
            what: "derivatives",
            expected: x.len(),
            actual: d.len(),
        });
    }
    Ok(())
}

// ============================================================================
// Basis functions
// ============================================================================

#[must_use]
pub fn cubic_hermite_basis(xi: f64) -> [f64; 4] {
    let xi2 = xi * xi;
    let xi3 = xi2 * xi;
    [
        1.0 - 3.0 * xi2 + 2.0 * xi3,
        xi - 2.0 * xi2 + xi3,
        3.0 * xi2 - 2.0 * xi3,
        -xi2 + xi3,
    ]
}

#[must_use]
pub fn cubic_hermite_basis_derivatives(xi: f64) -> [f64; 4] {
    let xi2 = xi * xi;
    [
        -6.0 * xi + 6.0 * xi2,
        1.0 - 4.0 * xi + 3.0 * xi2,
        6.0 * xi - 6.0 * xi2,
        -2.0 * xi + 3.0 * xi2,
    ]
}

#[must_use]
pub fn cubic_hermite_basis_second_derivatives(xi: f64) -> [f64; 4] {
    [
        -6.0 + 12.0 * xi,
        -4.0 + 6.0 * xi,
        6.0 - 12.0 * xi,
        -2.0 + 6.0 * xi,
    ]
}

#[inline]
fn blend4<V: Vector>(f: [f64; 4], v1: V, d1: V, v2: V, d2: V) -> V {
    v1 * f[0] + d1 * f[1] + v2 * f[2] + d2 * f[3]
}

/// Value at `xi` of the cubic Hermite segment from (`v1`, `d1`) to (`v2`, `d2`).
#[must_use]
pub fn interpolate_cubic_hermite<V: Vector>(v1: V, d1: V, v2: V, d2: V, xi: f64) -> V {
    blend4(cubic_hermite_basis(xi), v1, d1, v2, d2)
}

/// First derivative with respect to ξ at `xi`.
#[must_use]
pub fn interpolate_cubic_hermite_derivative<V: Vector>(v1: V, d1: V, v2: V, d2: V, xi: f64) -> V {
    blend4(cubic_hermite_basis_derivatives(xi), v1, d1, v2, d2)
}

#[must_use]
pub fn interpolate_cubic_hermite_second_derivative<V: Vector>(
    v1: V,
    d1: V,
    v2: V,
    d2: V,
    xi: f64,
) -> V {
    blend4(cubic_hermite_basis_second_derivatives(xi), v1, d1, v2, d2)
}

/// Quadratic through `v1` with slope `d1` at ξ = 0, ending at `v2`.
#[must_use]
pub fn interpolate_hermite_lagrange<V: Vector>(v1: V, d1: V, v2: V, xi: f64) -> V {
    v1 * (1.0 - xi * xi) + d1 * (xi - xi * xi) + v2 * (xi * xi)
}

#[must_use]
pub fn interpolate_hermite_lagrange_derivative<V: Vector>(v1: V, d1: V, v2: V, xi: f64) -> V {
    v1 * (-2.0 * xi) + d1 * (1.0 - 2.0 * xi) + v2 * (2.0 * xi)
}

/// Quadratic from `v1` to `v2` with slope `d2` at ξ = 1.
#[must_use]
pub fn interpolate_lagrange_hermite<V: Vector>(v1: V, v2: V, d2: V, xi: f64) -> V {
    v1 * (1.0 - 2.0 * xi + xi * xi) + v2 * (2.0 * xi - xi * xi) + d2 * (-xi + xi * xi)
}

#[must_use]
pub fn interpolate_lagrange_hermite_derivative<V: Vector>(v1: V, v2: V, d2: V, xi: f64) -> V {
    v1 * (-2.0 + 2.0 * xi) + v2 * (2.0 - 2.0 * xi) + d2 * (-1.0 + 2.0 * xi)
}

// ============================================================================
// Arc length
// ============================================================================

/// Arc length of one segment by 4-point Gauss quadrature.
///
/// Approximate; exact for straight segments with uniform parameterisation.
#[must_use]
pub fn cubic_hermite_arc_length<V: Vector>(v1: V, d1: V, v2: V, d2: V) -> f64 {
    GAUSS_XI_4
        .iter()
        .zip(GAUSS_WEIGHT_4)
        .map(|(&xi, w)| w * interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi).magnitude())
        .sum()
}

/// Arc length from ξ = 0 up to `xi`.
#[must_use]
pub fn cubic_hermite_arc_length_to_xi<V: Vector>(v1: V, d1: V, v2: V, d2: V, xi: f64) -> f64 {
    let v2m = interpolate_cubic_hermite(v1, d1, v2, d2, xi);
    let d2m = interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi) * xi;
    cubic_hermite_arc_length(v1, d1 * xi, v2m, d2m)
}

/// Arc length of the segment when both derivatives are rescaled to that
/// same arc length.
///
/// Iterates from the chord length (`rescale_derivatives`) or the quadrature
/// length of the supplied derivatives. After ten iterations the update is
/// damped to `0.8 new + 0.2 old`. Converges when the change is below
/// `1e-6 × length`.
#[must_use]
pub fn compute_cubic_hermite_arc_length<V: Vector>(
    v1: V,
    d1: V,
    v2: V,
    d2: V,
    rescale_derivatives: bool,
) -> IterationResult<f64> {
    let mut last = if rescale_derivatives {
        (v2 - v1).magnitude()
    } else {
        cubic_hermite_arc_length(v1, d1, v2, d2)
    };
    let u1 = d1.normalized().unwrap_or(V::ZERO);
    let u2 = d2.normalized().unwrap_or(V::ZERO);
    let mut arc_length = last;
    for iter in 0..MAX_ITERATIONS {
        arc_length = cubic_hermite_arc_length(v1, u1 * last, v2, u2 * last);
        if iter > 9 {
            arc_length = 0.8 * arc_length + 0.2 * last;
        }
        let change = (arc_length - last).abs();
        if change <= Tolerance::ARC_LENGTH.relative_to(arc_length) {
            return IterationResult::converged(arc_length, iter + 1, change);
        }
        last = arc_length;
    }
    IterationResult::unconverged(
        arc_length,
        MAX_ITERATIONS,
        (arc_length - last).abs(),
        "compute_cubic_hermite_arc_length",
    )
}

/// Factor for `d1` and `d2` that makes their mean magnitude equal the
/// segment's arc length.
#[must_use]
pub fn compute_cubic_hermite_derivative_scaling<V: Vector>(
    v1: V,
    d1: V,
    v2: V,
    d2: V,
) -> IterationResult<f64> {
    let orig_mag = 0.5 * (d1.magnitude() + d2.magnitude());
    let mut scaling = 1.0;
    let mut residual = f64::INFINITY;
    for iter in 0..MAX_ITERATIONS {
        let mag = orig_mag * scaling;
        let arc_length = cubic_hermite_arc_length(v1, d1 * scaling, v2, d2 * scaling);
        residual = (arc_length - mag).abs();
        if residual < Tolerance::ARC_LENGTH.relative_to(arc_length) {
            return IterationResult::converged(scaling, iter + 1, residual);
        }
        if mag == 0.0 {
            break;
        }
        scaling *= arc_length / mag;
    }
    IterationResult::unconverged(
        scaling,
        MAX_ITERATIONS,
        residual,
        "compute_cubic_hermite_derivative_scaling",
    )
}

/// Total quadrature length of a multi-segment curve.
///
/// With `closed` the last node joins back to the first.
///
/// # Errors
/// Returns an error if fewer than 2 nodes are given or the lists differ in
/// length.
pub fn cubic_hermite_curves_length<V: Vector>(
    x: &[V],
    d1: &[V],
    closed: bool,
) -> Result<f64, InterpolationError> {
    check_curve(x, d1, 2)?;
    let count = x.len();
    let elements = if closed { count } else { count - 1 };
    Ok((0..elements)
        .map(|e| {
            let ep = (e + 1) % count;
            cubic_hermite_arc_length(x[e], d1[e], x[ep], d1[ep])
        })
        .sum())
}

/// Lengths of a curve cut at optional start and end locations.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedLengths {
    /// Length before the start location.
    pub start: f64,
    /// Length between the start and end locations.
    pub length: f64,
    /// Length after the end location.
    pub end: f64,
    /// Cumulative untrimmed length to each node.
    pub length_to_node: Vec<f64>,
}

/// Split a curve's length at optional start and end locations.
///
/// # Errors
/// Returns an error if the curve is malformed or a location lies outside it.
pub fn cubic_hermite_trimmed_curves_lengths<V: Vector>(
    x: &[V],
    d1: &[V],
    start_location: Option<CurveLocation>,
    end_location: Option<CurveLocation>,
) -> Result<TrimmedLengths, InterpolationError> {
    check_curve(x, d1, 2)?;
    let elements_count = x.len() - 1;
    let mut length_to_node = Vec::with_capacity(x.len());
    length_to_node.push(0.0);
    let mut length = 0.0;
    for e in 0..elements_count {
        length += cubic_hermite_arc_length(x[e], d1[e], x[e + 1], d1[e + 1]);
        length_to_node.push(length);
    }
    let length_in = |location: CurveLocation| -> Result<f64, InterpolationError> {
        let e = location.element;
        if e >= elements_count {
            return Err(InterpolationError::LocationOutOfRange {
                element: e,
                count: elements_count,
            });
        }
        Ok(cubic_hermite_arc_length_to_xi(
            x[e],
            d1[e],
            x[e + 1],
            d1[e + 1],
            location.xi,
        ))
    };
    let mut start = 0.0;
    if let Some(location) = start_location {
        start = length_to_node[location.element.min(elements_count)] + length_in(location)?;
        length -= start;
    }
    let mut end = 0.0;
    if let Some(location) = end_location {
        end = length_to_node[elements_count]
            - length_to_node[location.element.min(elements_count)]
            - length_in(location)?;
        length -= end;
    }
    Ok(TrimmedLengths {
        start,
        length,
        end,
        length_to_node,
    })
}

// ============================================================================
// Curvature
// ============================================================================

/// Curvature of a 3-D segment at `xi` measured along `radial`.
///
/// `radial` is assumed to be a unit vector normal to the tangent. The sign
/// follows the radial direction.
#[must_use]
pub fn cubic_hermite_curvature(
    v1: Vec3,
    d1: Vec3,
    v2: Vec3,
    d2: Vec3,
    radial: Vec3,
    xi: f64,
) -> f64 {
    let tangent = interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi);
    let d_tangent = interpolate_cubic_hermite_second_derivative(v1, d1, v2, d2, xi);
    d_tangent.dot(radial) / tangent.length_squared()
}

/// Unsigned curvature with the tangent and its derivative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvatureSample {
    pub curvature: f64,
    pub tangent: Vec3,
    pub d_tangent: Vec3,
}

/// `|t × t'| / |t|³` at `xi`, zero where the tangent vanishes.
#[must_use]
pub fn cubic_hermite_curvature_simple(
    v1: Vec3,
    d1: Vec3,
    v2: Vec3,
    d2: Vec3,
    xi: f64,
) -> CurvatureSample {
    let tangent = interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi);
    let mag = tangent.length();
    if mag > 0.0 {
        let d_tangent = interpolate_cubic_hermite_second_derivative(v1, d1, v2, d2, xi);
        CurvatureSample {
            curvature: tangent.cross(d_tangent).length() / (mag * mag * mag),
            tangent,
            d_tangent,
        }
    } else {
        CurvatureSample {
            curvature: 0.0,
            tangent,
            d_tangent: Vec3::ZERO,
        }
    }
}

// ============================================================================
// Point at arc distance
// ============================================================================

/// A point found a given distance along a multi-segment curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcDistancePoint<V> {
    pub x: V,
    /// Interpolated derivative, not rescaled.
    pub d: V,
    pub element: usize,
    pub xi: f64,
}

const POINT_AT_DISTANCE_XI_DELTA: f64 = 1.0e-6;
const POINT_AT_DISTANCE_DXI_LIMIT: f64 = 0.1;
const POINT_AT_DISTANCE_HALVING_ITERATIONS: [usize; 4] = [4, 10, 25, 62];

/// Locate the point `arc_distance` along the curve, using the supplied
/// derivatives as they are.
///
/// Negative distances clamp to the first node and distances past the end
/// clamp to the last. Inside a segment ξ is found by Newton iteration on a
/// central-difference slope, with the step clamped to a limit that halves
/// at fixed iterations. On hitting the iteration cap the estimate at the
/// final ξ is returned.
///
/// # Errors
/// Returns an error if fewer than 2 nodes are given or the lists differ in
/// length.
pub fn cubic_hermite_curves_point_at_arc_distance<V: Vector>(
    x: &[V],
    d: &[V],
    arc_distance: f64,
) -> Result<IterationResult<ArcDistancePoint<V>>, InterpolationError> {
    check_curve(x, d, 2)?;
    let elements_count = x.len() - 1;
    if arc_distance < 0.0 {
        return Ok(IterationResult::converged(
            ArcDistancePoint {
                x: x[0],
                d: d[0],
                element: 0,
                xi: 0.0,
            },
            0,
            0.0,
        ));
    }
    let delta = POINT_AT_DISTANCE_XI_DELTA;
    let mut length = 0.0;
    for e in 0..elements_count {
        let part_distance = arc_distance - length;
        let (v1, d1, v2, d2) = (x[e], d[e], x[e + 1], d[e + 1]);
        let arc_length = cubic_hermite_arc_length(v1, d1, v2, d2);
        if part_distance <= arc_length {
            let point_at = |xi: f64| ArcDistancePoint {
                x: interpolate_cubic_hermite(v1, d1, v2, d2, xi),
                d: interpolate_cubic_hermite_derivative(v1, d1, v2, d2, xi),
                element: e,
                xi,
            };
            if arc_length <= 0.0 {
                return Ok(IterationResult::converged(point_at(0.0), 0, 0.0));
            }
            let mut xi = part_distance / arc_length;
            let mut dxi_limit = POINT_AT_DISTANCE_DXI_LIMIT;
            let mut residual = f64::INFINITY;
            for iter in 0..MAX_ITERATIONS {
                let dist = cubic_hermite_arc_length_to_xi(v1, d1, v2, d2, xi);
                let dist_p = cubic_hermite_arc_length_to_xi(v1, d1, v2, d2, xi + delta);
                let mut dist_m = cubic_hermite_arc_length_to_xi(v1, d1, v2, d2, xi - delta);
                if xi - delta < 0.0 {
                    dist_m = -dist_m;
                }
                residual = (part_distance - dist).abs();
                let slope = dist_p - dist_m;
                if slope == 0.0 {
                    break;
                }
                let dxi = (2.0 * delta / slope * (part_distance - dist)).clamp(-dxi_limit, dxi_limit);
                xi += dxi;
                if dxi.abs() <= Tolerance::XI.eps {
                    return Ok(IterationResult::converged(point_at(xi), iter + 1, residual));
                }
                if POINT_AT_DISTANCE_HALVING_ITERATIONS.contains(&iter) {
                    dxi_limit *= 0.5;
                }
            }
            return Ok(IterationResult::unconverged(
                point_at(xi),
                MAX_ITERATIONS,
                residual,
                "cubic_hermite_curves_point_at_arc_distance",
            ));
        }
        length += arc_length;
    }
    Ok(IterationResult::converged(
        ArcDistancePoint {
            x: x[elements_count],
            d: d[elements_count],
            element: elements_count - 1,
            xi: 1.0,
        },
        0,
        0.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_partition_of_unity() {
        for xi in [0.0, 0.25, 0.5, 0.9, 1.0] {
            let f = cubic_hermite_basis(xi);
            assert!((f[0] + f[2] - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn test_gauss_weights_sum_to_one() {
        let sum: f64 = GAUSS_WEIGHT_4.iter().sum();
        assert!((sum - 1.0).abs() < 1e-15);
    }
}
