//! Iterative smoothing of Hermite curve derivatives.
//!
//! # Operations
//! - **Line**: `smooth_cubic_hermite_derivatives_line` for open curves, with
//!   optional fixed end derivatives or directions.
//! - **Loop**: `smooth_cubic_hermite_derivatives_loop` for closed curves.
//! - **Side cross derivatives**: rates of change of lateral direction vectors
//!   along a curve, fitted per element and averaged at shared nodes.
//!
//! Smoothing stops when no derivative component changes by more than
//! `1e-6 × mean arc length`, or after the iteration cap. On hitting the cap
//! the last estimate is returned with `residual` holding the closeness ratio
//! `max change / tolerance`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::core::{MAX_ITERATIONS, Tolerance, Vec2, Vec3, Vector};
use super::diagnostics::IterationResult;
use super::hermite::{
    InterpolationError, check_curve, compute_cubic_hermite_arc_length, cubic_hermite_arc_length,
    cubic_hermite_basis, interpolate_cubic_hermite_derivative, interpolate_hermite_lagrange,
    interpolate_hermite_lagrange_derivative, interpolate_lagrange_hermite,
    interpolate_lagrange_hermite_derivative,
};

/// How a node's derivative magnitude is formed from the arc lengths of the
/// elements either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DerivativeScalingMode {
    /// Half the sum of the two arc lengths.
    #[default]
    ArithmeticMean,
    /// Reciprocal of the mean reciprocal arc length.
    HarmonicMean,
}

impl DerivativeScalingMode {
    fn magnitude(self, arc_m: f64, arc_p: f64) -> f64 {
        match self {
            Self::ArithmeticMean => 0.5 * (arc_m + arc_p),
            Self::HarmonicMean => {
                if arc_m > 0.0 && arc_p > 0.0 {
                    2.0 / (1.0 / arc_m + 1.0 / arc_p)
                } else {
                    log::warn!("harmonic mean of zero-length element (arc lengths {arc_m}, {arc_p}); using 0");
                    0.0
                }
            }
        }
    }
}

/// Options for [`smooth_cubic_hermite_derivatives_line`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothLineOptions {
    /// Only smooth magnitudes; every direction stays as supplied.
    pub fix_all_directions: bool,
    /// Keep the start derivative exactly as supplied.
    pub fix_start_derivative: bool,
    pub fix_end_derivative: bool,
    /// Keep the start direction, smoothing its magnitude.
    pub fix_start_direction: bool,
    pub fix_end_direction: bool,
    pub magnitude_scaling_mode: DerivativeScalingMode,
}

impl SmoothLineOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fix_all_directions: false,
            fix_start_derivative: false,
            fix_end_derivative: false,
            fix_start_direction: false,
            fix_end_direction: false,
            magnitude_scaling_mode: DerivativeScalingMode::ArithmeticMean,
        }
    }

    #[must_use]
    pub const fn fix_all_directions(mut self, fix: bool) -> Self {
        self.fix_all_directions = fix;
        self
    }

    #[must_use]
    pub const fn fix_derivatives(mut self, start: bool, end: bool) -> Self {
        self.fix_start_derivative = start;
        self.fix_end_derivative = end;
        self
    }

    #[must_use]
    pub const fn fix_directions(mut self, start: bool, end: bool) -> Self {
        self.fix_start_direction = start;
        self.fix_end_direction = end;
        self
    }

    #[must_use]
    pub const fn with_scaling_mode(mut self, mode: DerivativeScalingMode) -> Self {
        self.magnitude_scaling_mode = mode;
        self
    }

    const fn fixes_anything(self) -> bool {
        self.fix_all_directions
            || self.fix_start_derivative
            || self.fix_end_derivative
            || self.fix_start_direction
            || self.fix_end_direction
    }
}

/// Options for [`smooth_cubic_hermite_derivatives_loop`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothLoopOptions {
    pub fix_all_directions: bool,
    pub magnitude_scaling_mode: DerivativeScalingMode,
}

impl SmoothLoopOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fix_all_directions: false,
            magnitude_scaling_mode: DerivativeScalingMode::ArithmeticMean,
        }
    }

    #[must_use]
    pub const fn fix_all_directions(mut self, fix: bool) -> Self {
        self.fix_all_directions = fix;
        self
    }

    #[must_use]
    pub const fn with_scaling_mode(mut self, mode: DerivativeScalingMode) -> Self {
        self.magnitude_scaling_mode = mode;
        self
    }
}

/// Largest component change between two derivative sets.
fn max_change<V: Vector>(current: &[V], last: &[V]) -> f64 {
    current
        .iter()
        .zip(last)
        .map(|(&a, &b)| (a - b).max_abs_component())
        .fold(0.0, f64::max)
}

/// Direction from `n` blending the chords to its neighbours, each weighted
/// by the opposite element's arc length.
fn blended_direction<V: Vector>(xm: V, x: V, xp: V, arc_m: f64, arc_p: f64) -> V {
    let sum = arc_m + arc_p;
    if sum <= 0.0 {
        return V::ZERO;
    }
    (x - xm) * (arc_p / sum) + (xp - x) * (arc_m / sum)
}

/// Smooth the derivatives of an open curve so direction and magnitude vary
/// smoothly and approach arc length.
///
/// A single element with nothing fixed becomes a straight line; with both
/// directions fixed it takes the rescaled arc length at both ends.
///
/// # Errors
/// Returns an error if fewer than 2 nodes are given or the lists differ in
/// length.
pub fn smooth_cubic_hermite_derivatives_line<V: Vector>(
    x: &[V],
    d1: &[V],
    options: SmoothLineOptions,
) -> Result<IterationResult<Vec<V>>, InterpolationError> {
    check_curve(x, d1, 2)?;
    let nodes_count = x.len();
    let elements_count = nodes_count - 1;
    if elements_count == 1 {
        if !options.fixes_anything() {
            let delta = x[1] - x[0];
            return Ok(IterationResult::converged(vec![delta, delta], 0, 0.0));
        }
        if options.fix_all_directions || (options.fix_start_direction && options.fix_end_direction) {
            let arc = compute_cubic_hermite_arc_length(x[0], d1[0], x[1], d1[1], true);
            let value = vec![
                d1[0].with_magnitude(arc.value).unwrap_or(V::ZERO),
                d1[1].with_magnitude(arc.value).unwrap_or(V::ZERO),
            ];
            return Ok(arc.map(|_| value));
        }
    }

    let mode = options.magnitude_scaling_mode;
    let mut md1 = d1.to_vec();
    let mut closeness = f64::INFINITY;
    for iter in 0..MAX_ITERATIONS {
        let last = md1.clone();
        let arc_lengths: Vec<f64> = (0..elements_count)
            .map(|e| cubic_hermite_arc_length(x[e], md1[e], x[e + 1], md1[e + 1]))
            .collect();

        if !options.fix_start_derivative {
            md1[0] = if options.fix_all_directions || options.fix_start_direction {
                let mag = 2.0 * arc_lengths[0] - last[1].magnitude();
                if mag > 0.0 {
                    d1[0].with_magnitude(mag).unwrap_or(V::ZERO)
                } else {
                    V::ZERO
                }
            } else {
                interpolate_lagrange_hermite_derivative(x[0], x[1], last[1], 0.0)
            };
        }
        for n in 1..nodes_count - 1 {
            if !options.fix_all_directions {
                md1[n] = blended_direction(x[n - 1], x[n], x[n + 1], arc_lengths[n - 1], arc_lengths[n]);
            }
            let mag = mode.magnitude(arc_lengths[n - 1], arc_lengths[n]);
            md1[n] = md1[n].with_magnitude(mag).unwrap_or(V::ZERO);
        }
        if !options.fix_end_derivative {
            let n = nodes_count - 1;
            md1[n] = if options.fix_all_directions || options.fix_end_direction {
                let mag = 2.0 * arc_lengths[elements_count - 1] - last[n - 1].magnitude();
                if mag > 0.0 {
                    d1[n].with_magnitude(mag).unwrap_or(V::ZERO)
                } else {
                    V::ZERO
                }
            } else {
                interpolate_hermite_lagrange_derivative(x[n - 1], last[n - 1], x[n], 1.0)
            };
        }

        let mean_arc = arc_lengths.iter().sum::<f64>() / elements_count as f64;
        let dtol = Tolerance::ARC_LENGTH.relative_to(mean_arc);
        let cmax = max_change(&md1, &last);
        closeness = if dtol > 0.0 { cmax / dtol } else { 0.0 };
        if cmax <= dtol {
            log::debug!("smooth_cubic_hermite_derivatives_line: converged after {} iterations", iter + 1);
            return Ok(IterationResult::converged(md1, iter + 1, closeness));
        }
    }
    Ok(IterationResult::unconverged(
        md1,
        MAX_ITERATIONS,
        closeness,
        "smooth_cubic_hermite_derivatives_line",
    ))
}

/// Smooth the derivatives of a closed curve whose last node joins the first.
///
/// # Errors
/// Returns an error if fewer than 2 nodes are given or the lists differ in
/// length.
pub fn smooth_cubic_hermite_derivatives_loop<V: Vector>(
    x: &[V],
    d1: &[V],
    options: SmoothLoopOptions,
) -> Result<IterationResult<Vec<V>>, InterpolationError> {
    check_curve(x, d1, 2)?;
    let count = x.len();
    let mode = options.magnitude_scaling_mode;
    let mut md1 = d1.to_vec();
    let mut closeness = f64::INFINITY;
    for iter in 0..MAX_ITERATIONS {
        let last = md1.clone();
        let arc_lengths: Vec<f64> = (0..count)
            .map(|e| {
                let ep = (e + 1) % count;
                cubic_hermite_arc_length(x[e], md1[e], x[ep], md1[ep])
            })
            .collect();
        for n in 0..count {
            let nm = (n + count - 1) % count;
            let np = (n + 1) % count;
            if !options.fix_all_directions {
                md1[n] = blended_direction(x[nm], x[n], x[np], arc_lengths[nm], arc_lengths[n]);
            }
            let mag = mode.magnitude(arc_lengths[nm], arc_lengths[n]);
            md1[n] = md1[n].with_magnitude(mag).unwrap_or(V::ZERO);
        }
        let mean_arc = arc_lengths.iter().sum::<f64>() / count as f64;
        let dtol = Tolerance::ARC_LENGTH.relative_to(mean_arc);
        let cmax = max_change(&md1, &last);
        closeness = if dtol > 0.0 { cmax / dtol } else { 0.0 };
        if cmax <= dtol {
            log::debug!("smooth_cubic_hermite_derivatives_loop: converged after {} iterations", iter + 1);
            return Ok(IterationResult::converged(md1, iter + 1, closeness));
        }
    }
    Ok(IterationResult::unconverged(
        md1,
        MAX_ITERATIONS,
        closeness,
        "smooth_cubic_hermite_derivatives_loop",
    ))
}

// ============================================================================
// Side cross derivatives
// ============================================================================

/// Errors specific to side cross derivative fitting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SideCrossError {
    #[error(transparent)]
    Curve(#[from] InterpolationError),

    #[error("no side vectors supplied")]
    NoSideVectors,

    #[error("side vector set {index} has {actual} entries, expected {expected}")]
    SideVectorCount {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// End whose side cross derivatives are held fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SideCrossFixed<'a> {
    None,
    /// Fixed cross derivatives at the start, one per side vector.
    Start(&'a [Vec3]),
    /// Fixed cross derivatives at the end, one per side vector.
    End(&'a [Vec3]),
}

/// Fit start and end cross derivatives for side vectors so their Hermite
/// interpolation follows the curve's bending and twisting.
///
/// Targets at ξ = 1/3 and 2/3 keep each side vector's normal and tangential
/// components, blended linearly, or quadratically toward a fixed end.
///
/// # Returns
/// Start and end cross derivatives, one per side vector.
///
/// # Errors
/// Returns an error if the side vector lists or the fixed list differ in
/// length.
pub fn compute_cubic_hermite_side_cross_derivatives(
    ax: Vec3,
    ad1: Vec3,
    bx: Vec3,
    bd1: Vec3,
    a_side: &[Vec3],
    b_side: &[Vec3],
    fixed: SideCrossFixed<'_>,
) -> Result<(Vec<Vec3>, Vec<Vec3>), SideCrossError> {
    let count = a_side.len();
    if b_side.len() != count {
        return Err(SideCrossError::SideVectorCount {
            index: 1,
            expected: count,
            actual: b_side.len(),
        });
    }
    if let SideCrossFixed::Start(list) | SideCrossFixed::End(list) = fixed {
        if list.len() != count {
            return Err(SideCrossError::SideVectorCount {
                index: 2,
                expected: count,
                actual: list.len(),
            });
        }
    }
    let unit = |v: Vec3| v.normalized().unwrap_or(Vec3::ZERO);
    let normal_to = |tangent: Vec3, side: Vec3| unit(tangent.cross(side).cross(tangent));

    let a_tangent = unit(ad1);
    let b_tangent = unit(bd1);
    let aa_xi = 1.0 / 3.0;
    let bb_xi = 2.0 / 3.0;
    let aa_phi = cubic_hermite_basis(aa_xi);
    let bb_phi = cubic_hermite_basis(bb_xi);
    let aa_tangent = unit(interpolate_cubic_hermite_derivative(ax, ad1, bx, bd1, aa_xi));
    let bb_tangent = unit(interpolate_cubic_hermite_derivative(ax, ad1, bx, bd1, bb_xi));
    let beta_fact = aa_phi[3] / bb_phi[3];
    let alpha_fact = aa_phi[1] - beta_fact * bb_phi[1];

    let mut a_cross = Vec::with_capacity(count);
    let mut b_cross = Vec::with_capacity(count);
    for s in 0..count {
        let asd = a_side[s];
        let bsd = b_side[s];
        let a_normal = normal_to(ad1, asd);
        let b_normal = normal_to(bd1, bsd);
        let a_comp = Vec2::new(asd.dot(a_normal), asd.dot(a_tangent));
        let b_comp = Vec2::new(bsd.dot(b_normal), bsd.dot(b_tangent));

        let (aa_guess, bb_guess, aa_comp, bb_comp) = match fixed {
            SideCrossFixed::Start(list) => {
                let cd = list[s];
                let cd_comp = Vec2::new(cd.dot(a_normal), cd.dot(a_tangent));
                (
                    interpolate_hermite_lagrange(asd, cd, bsd, aa_xi),
                    interpolate_hermite_lagrange(asd, cd, bsd, bb_xi),
                    interpolate_hermite_lagrange(a_comp, cd_comp, b_comp, aa_xi),
                    interpolate_hermite_lagrange(a_comp, cd_comp, b_comp, bb_xi),
                )
            }
            SideCrossFixed::End(list) => {
                let cd = list[s];
                let cd_comp = Vec2::new(cd.dot(b_normal), cd.dot(b_tangent));
                (
                    interpolate_lagrange_hermite(asd, bsd, cd, aa_xi),
                    interpolate_lagrange_hermite(asd, bsd, cd, bb_xi),
                    interpolate_lagrange_hermite(a_comp, b_comp, cd_comp, aa_xi),
                    interpolate_lagrange_hermite(a_comp, b_comp, cd_comp, bb_xi),
                )
            }
            SideCrossFixed::None => (
                asd * bb_xi + bsd * aa_xi,
                asd * aa_xi + bsd * bb_xi,
                a_comp * bb_xi + b_comp * aa_xi,
                a_comp * aa_xi + b_comp * bb_xi,
            ),
        };
        let aa_normal = normal_to(aa_tangent, aa_guess);
        let bb_normal = normal_to(bb_tangent, bb_guess);
        let aa_target = aa_normal * aa_comp.x + aa_tangent * aa_comp.y;
        let bb_target = bb_normal * bb_comp.x + bb_tangent * bb_comp.y;

        // Remaining parts the cross derivative terms must supply at each ξ.
        let aa_rest = aa_target - asd * aa_phi[0] - bsd * aa_phi[2];
        let bb_rest = bb_target - asd * bb_phi[0] - bsd * bb_phi[2];
        let ascd = (aa_rest - bb_rest * beta_fact) * (1.0 / alpha_fact);
        let bscd = (aa_rest - ascd * aa_phi[1]) * (1.0 / aa_phi[3]);
        a_cross.push(ascd);
        b_cross.push(bscd);
    }
    Ok((a_cross, b_cross))
}

/// Smooth rates of change of lateral direction vectors along a curve.
///
/// `side_vectors` holds one list per lateral direction, each with one
/// vector per node. Per-element fits are averaged at shared nodes; on an
/// open curve the two end values are then refitted holding the adjacent
/// interior value fixed.
///
/// # Errors
/// Returns an error if no side vectors are given, a list has the wrong
/// length, or a closed curve has fewer than 3 nodes.
pub fn smooth_curve_side_cross_derivatives(
    x: &[Vec3],
    d1: &[Vec3],
    side_vectors: &[Vec<Vec3>],
    closed: bool,
) -> Result<Vec<Vec<Vec3>>, SideCrossError> {
    check_curve(x, d1, if closed { 3 } else { 2 })?;
    if side_vectors.is_empty() {
        return Err(SideCrossError::NoSideVectors);
    }
    let nodes_count = x.len();
    if let Some((index, list)) = side_vectors
        .iter()
        .enumerate()
        .find(|(_, list)| list.len() != nodes_count)
    {
        return Err(SideCrossError::SideVectorCount {
            index,
            expected: nodes_count,
            actual: list.len(),
        });
    }
    let elements_count = if closed { nodes_count } else { nodes_count - 1 };
    let sides_at = |n: usize| -> Vec<Vec3> { side_vectors.iter().map(|list| list[n]).collect() };

    let mut accumulated: Vec<Vec<Option<Vec3>>> = vec![vec![None; nodes_count]; side_vectors.len()];
    for e in 0..elements_count {
        let nm = e;
        let np = (e + 1) % nodes_count;
        let (dm, dp) = compute_cubic_hermite_side_cross_derivatives(
            x[nm],
            d1[nm],
            x[np],
            d1[np],
            &sides_at(nm),
            &sides_at(np),
            SideCrossFixed::None,
        )?;
        for (s, node_values) in accumulated.iter_mut().enumerate() {
            for (n, value) in [(nm, dm[s]), (np, dp[s])] {
                node_values[n] = Some(match node_values[n] {
                    Some(existing) => (existing + value) * 0.5,
                    None => value,
                });
            }
        }
    }
    let mut result: Vec<Vec<Vec3>> = accumulated
        .into_iter()
        .map(|list| list.into_iter().map(|v| v.unwrap_or(Vec3::ZERO)).collect())
        .collect();

    if !closed && elements_count > 1 {
        let last = nodes_count - 1;
        let fixed_second: Vec<Vec3> = result.iter().map(|list| list[1]).collect();
        let (start, _) = compute_cubic_hermite_side_cross_derivatives(
            x[0],
            d1[0],
            x[1],
            d1[1],
            &sides_at(0),
            &sides_at(1),
            SideCrossFixed::End(&fixed_second),
        )?;
        let fixed_penultimate: Vec<Vec3> = result.iter().map(|list| list[last - 1]).collect();
        let (_, end) = compute_cubic_hermite_side_cross_derivatives(
            x[last - 1],
            d1[last - 1],
            x[last],
            d1[last],
            &sides_at(last - 1),
            &sides_at(last),
            SideCrossFixed::Start(&fixed_penultimate),
        )?;
        for (s, list) in result.iter_mut().enumerate() {
            list[0] = start[s];
            list[last] = end[s];
        }
    }
    Ok(result)
}

/// Derivative at `mx`, the join of two curves from `ax` and to `bx`, that
/// balances the end derivatives `ad1` and `bd1`.
#[must_use]
pub fn double_cubic_hermite_curves_mid_derivative<V: Vector>(
    ax: V,
    ad1: V,
    mx: V,
    bx: V,
    bd1: V,
) -> V {
    let md1 = bx - ax;
    let arc_a = compute_cubic_hermite_arc_length(ax, ad1, mx, md1, true).value;
    let arc_b = compute_cubic_hermite_arc_length(mx, md1, bx, bd1, true).value;
    let mag = arc_a + arc_b - 0.5 * (ad1.magnitude() + bd1.magnitude());
    md1.with_magnitude(mag).unwrap_or(V::ZERO)
}
