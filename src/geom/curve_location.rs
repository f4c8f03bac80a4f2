//! Locations on multi-element Hermite curves.
//!
//! A [`CurveLocation`] is an element index plus ξ within that element.
//! Curves may be open or closed; a closed curve of `n` nodes has `n`
//! elements with the last joining back to node 0.

use serde::{Deserialize, Serialize};

use super::core::{BBox, MAX_ITERATIONS, Tolerance, Vec3, Vector};
use super::diagnostics::IterationResult;
use super::hermite::{
    InterpolationError, check_curve, cubic_hermite_curvature, cubic_hermite_curvature_simple,
    interpolate_cubic_hermite, interpolate_cubic_hermite_derivative,
};

/// Largest ξ step taken by a single advance.
pub const MAX_CURVE_DXI: f64 = 0.5;

const MAX_CURVATURE_FACTOR: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveLocation {
    pub element: usize,
    pub xi: f64,
}

impl CurveLocation {
    #[must_use]
    pub const fn new(element: usize, xi: f64) -> Self {
        Self { element, xi }
    }
}

/// End of an element, or of a whole open curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveEnd {
    /// ξ = 0.
    Start,
    /// ξ = 1.
    End,
}

const fn elements_count_for(nodes: usize, closed: bool) -> usize {
    if closed { nodes } else { nodes - 1 }
}

/// Add `dxi` to `xi`, stopping at the element ends.
///
/// Returns the new ξ and the end crossed, if any.
#[must_use]
pub fn increment_xi_on_line(xi: f64, dxi: f64) -> (f64, Option<CurveEnd>) {
    let new_xi = xi + dxi;
    if new_xi >= 1.0 {
        (1.0, Some(CurveEnd::End))
    } else if new_xi < 0.0 {
        (0.0, Some(CurveEnd::Start))
    } else {
        (new_xi, None)
    }
}

/// Result of [`advance_curve_location`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveAdvance {
    pub location: CurveLocation,
    /// ξ increment actually applied.
    pub dxi: f64,
    /// Open-curve end reached, if any.
    pub boundary: Option<CurveEnd>,
}

/// Move along the curve by `dxi` element units, capped at `max_mag_dxi`.
///
/// Closed curves wrap; open curves clamp at their ends.
#[must_use]
pub fn advance_curve_location(
    start: CurveLocation,
    dxi: f64,
    elements_count: usize,
    closed: bool,
    max_mag_dxi: f64,
) -> CurveAdvance {
    let count = elements_count as f64;
    let start_proportion = (start.element as f64 + start.xi) / count;
    let mut adxi = dxi;
    if dxi.abs() > max_mag_dxi {
        adxi *= max_mag_dxi / dxi.abs();
    }
    let mut proportion = start_proportion + adxi / count;
    let mut boundary = None;
    if closed {
        if proportion < 0.0 {
            proportion += 1.0;
        } else if proportion > 1.0 {
            proportion -= 1.0;
        }
    } else {
        if proportion < 0.0 {
            proportion = 0.0;
            boundary = Some(CurveEnd::Start);
        } else if proportion > 1.0 {
            proportion = 1.0;
            boundary = Some(CurveEnd::End);
        }
        adxi = (proportion - start_proportion) * count;
    }
    let scaled = proportion * count;
    let element = scaled.floor().max(0.0) as usize;
    let location = if element >= elements_count {
        if closed {
            CurveLocation::new(0, 0.0)
        } else {
            CurveLocation::new(elements_count - 1, 1.0)
        }
    } else {
        CurveLocation::new(element, scaled - element as f64)
    };
    CurveAdvance {
        location,
        dxi: adxi,
        boundary,
    }
}

/// Coordinates and ξ derivative at `location`.
///
/// # Errors
/// Returns an error if the curve is malformed or the location's element is
/// out of range.
pub fn evaluate_coordinates_on_curve<V: Vector>(
    x: &[V],
    d1: &[V],
    location: CurveLocation,
    closed: bool,
) -> Result<(V, V), InterpolationError> {
    check_curve(x, d1, 2)?;
    let elements_count = elements_count_for(x.len(), closed);
    let e1 = location.element;
    if e1 >= elements_count {
        return Err(InterpolationError::LocationOutOfRange {
            element: e1,
            count: elements_count,
        });
    }
    let e2 = (e1 + 1) % x.len();
    Ok((
        interpolate_cubic_hermite(x[e1], d1[e1], x[e2], d1[e2], location.xi),
        interpolate_cubic_hermite_derivative(x[e1], d1[e1], x[e2], d1[e2], location.xi),
    ))
}

/// Whether `location` sits on either end of an open curve.
#[must_use]
pub fn is_location_on_curve_boundary(location: CurveLocation, elements_count: usize) -> bool {
    let tol = Tolerance::BOUNDARY_PROPORTION.eps;
    (location.element == 0 && location.xi < tol)
        || (location.element + 1 == elements_count && location.xi > 1.0 - tol)
}

/// Step into the neighbouring element across `face`.
///
/// Returns the new location and `true` when an open curve's end stops it.
#[must_use]
pub fn update_curve_location_to_face(
    location: CurveLocation,
    face: CurveEnd,
    elements_count: usize,
    closed: bool,
) -> (CurveLocation, bool) {
    let CurveLocation { element, xi } = location;
    match face {
        CurveEnd::Start if element == 0 => {
            if closed {
                (CurveLocation::new(elements_count - 1, 1.0), false)
            } else {
                (location, true)
            }
        }
        CurveEnd::Start => (CurveLocation::new(element - 1, 1.0), false),
        CurveEnd::End if element + 1 == elements_count => {
            if closed {
                (CurveLocation::new(0, 0.0), false)
            } else {
                (CurveLocation::new(element, xi), true)
            }
        }
        CurveEnd::End => (CurveLocation::new(element + 1, 0.0), false),
    }
}

/// Index of the point in `points` closest to `target`.
#[must_use]
pub fn nearest_point_index<V: Vector>(points: &[V], target: V) -> Option<usize> {
    points
        .iter()
        .map(|&p| (p - target).magnitude())
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, dist)| match best {
            Some((_, best_dist)) if best_dist <= dist => best,
            _ => Some((i, dist)),
        })
        .map(|(i, _)| i)
}

/// Location of the node nearest `target`, with its distance.
///
/// # Errors
/// Returns an error if fewer than 2 nodes are given.
pub fn nearest_parameter_location_on_curve<V: Vector>(
    x: &[V],
    target: V,
    closed: bool,
) -> Result<(CurveLocation, f64), InterpolationError> {
    check_curve(x, x, 2)?;
    let n = nearest_point_index(x, target).unwrap_or(0);
    let distance = (x[n] - target).magnitude();
    let location = if !closed && n == x.len() - 1 {
        CurveLocation::new(n - 1, 1.0)
    } else {
        CurveLocation::new(n, 0.0)
    };
    Ok((location, distance))
}

/// Nearest location found on a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestCurvePoint {
    pub location: CurveLocation,
    pub x: Vec3,
}

/// Newton search for the location on a 3-D curve closest to `target`.
///
/// Starts from `start` or the nearest node. The tangential step is
/// corrected for curvature using the local osculating circle, then capped
/// at [`MAX_CURVE_DXI`]. May find a local minimum.
///
/// # Errors
/// Returns an error if the curve is malformed or `start` is out of range.
pub fn nearest_location_on_curve(
    x: &[Vec3],
    d1: &[Vec3],
    target: Vec3,
    closed: bool,
    start: Option<CurveLocation>,
) -> Result<IterationResult<NearestCurvePoint>, InterpolationError> {
    check_curve(x, d1, 2)?;
    let nodes_count = x.len();
    let elements_count = elements_count_for(nodes_count, closed);
    let mut location = match start {
        Some(location) => location,
        None => nearest_parameter_location_on_curve(x, target, closed)?.0,
    };
    let max_range = BBox::from_points(x).map_or(0.0, BBox::max_extent);
    let min_curvature = 0.1 / max_range;
    let mut current = x[0];
    let mut mag_adxi = f64::INFINITY;
    for iter in 0..MAX_ITERATIONS {
        let (cx, d) = evaluate_coordinates_on_curve(x, d1, location, closed)?;
        current = cx;
        let mag_d = d.length();
        if mag_d == 0.0 {
            log::warn!("nearest_location_on_curve: zero derivative at iteration {}", iter + 1);
            break;
        }
        let delta_x = target - current;
        let ut = delta_x.dot(d) / mag_d;
        let mut dxi = ut / mag_d;
        let nm = location.element;
        let np = (nm + 1) % nodes_count;
        let sample = cubic_hermite_curvature_simple(x[nm], d1[nm], x[np], d1[np], location.xi);
        if sample.curvature > min_curvature {
            let radius = 1.0 / sample.curvature;
            let mut j = sample.tangent.normalized().unwrap_or(Vec3::ZERO);
            if dxi < 0.0 {
                j = -j;
            }
            let i = sample
                .tangent
                .cross(sample.tangent.cross(sample.d_tangent))
                .normalized()
                .unwrap_or(Vec3::ZERO);
            let centre = current - i * radius;
            let delta = target - centre;
            let dj = delta.dot(j);
            let di = delta.dot(i);
            let angle = dj.atan2(di);
            let factor = if iter < 10 && angle.abs() > 0.1 {
                radius * angle / ut.abs()
            } else {
                (radius / di).min(MAX_CURVATURE_FACTOR)
            };
            dxi *= factor;
        }
        let advance = advance_curve_location(location, dxi, elements_count, closed, MAX_CURVE_DXI);
        location = advance.location;
        mag_adxi = advance.dxi.abs();
        if mag_adxi < Tolerance::NEAREST_XI.eps {
            log::debug!("nearest_location_on_curve: converged in {} iterations", iter + 1);
            return Ok(IterationResult::converged(
                NearestCurvePoint {
                    location,
                    x: current,
                },
                iter + 1,
                mag_adxi,
            ));
        }
    }
    Ok(IterationResult::unconverged(
        NearestCurvePoint {
            location,
            x: current,
        },
        MAX_ITERATIONS,
        mag_adxi,
        "nearest_location_on_curve",
    ))
}

/// Signed curvature at each node along the node's radial vector, averaged
/// over the elements either side.
///
/// # Errors
/// Returns an error if the lists differ in length or have fewer than 2
/// nodes.
pub fn curvatures_along_curve(
    x: &[Vec3],
    d: &[Vec3],
    radial_vectors: &[Vec3],
    closed: bool,
) -> Result<Vec<f64>, InterpolationError> {
    check_curve(x, d, 2)?;
    check_curve(x, radial_vectors, 2)?;
    let count = x.len();
    Ok((0..count)
        .map(|c| {
            let incoming = (c > 0 || closed).then(|| {
                let cm = (c + count - 1) % count;
                cubic_hermite_curvature(x[cm], d[cm], x[c], d[c], radial_vectors[c], 1.0)
            });
            let outgoing = (c + 1 < count || closed).then(|| {
                let cp = (c + 1) % count;
                cubic_hermite_curvature(x[c], d[c], x[cp], d[cp], radial_vectors[c], 0.0)
            });
            match (incoming, outgoing) {
                (Some(a), Some(b)) => 0.5 * (a + b),
                (Some(k), None) | (None, Some(k)) => k,
                (None, None) => 0.0,
            }
        })
        .collect())
}

/// Node projected through a wall of given thickness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallProjection {
    pub x: Vec3,
    /// Along-curve derivative scaled for curvature.
    pub d1: Vec3,
    /// Cross derivative, copied unchanged.
    pub d2: Vec3,
    /// Through-wall derivative of magnitude `|thickness|`.
    pub d3: Vec3,
}

/// Project node `n` of a curve with cross direction `d2` along the normal
/// `d1 × d2` by `wall_thickness`.
///
/// Positive thickness moves outward along the normal. The along-curve
/// derivative is scaled by `1 - κ t` using the mean curvature of the
/// neighbouring elements.
///
/// # Errors
/// Returns an error if the lists differ in length or `n` is out of range.
pub fn project_hermite_curves_through_wall(
    x: &[Vec3],
    d1: &[Vec3],
    d2: &[Vec3],
    n: usize,
    wall_thickness: f64,
    closed: bool,
) -> Result<WallProjection, InterpolationError> {
    check_curve(x, d1, 2)?;
    check_curve(x, d2, 2)?;
    let count = x.len();
    if n >= count {
        return Err(InterpolationError::IndexOutOfRange { index: n, count });
    }
    let unit_normal = d1[n].cross(d2[n]).normalized().unwrap_or(Vec3::ZERO);
    let mut curvature = 0.0;
    let mut sides = 0.0;
    if closed || n > 0 {
        let m = (n + count - 1) % count;
        curvature += cubic_hermite_curvature(x[m], d1[m], x[n], d1[n], unit_normal, 1.0);
        sides += 1.0;
    }
    if closed || n + 1 < count {
        let p = (n + 1) % count;
        curvature += cubic_hermite_curvature(x[n], d1[n], x[p], d1[p], unit_normal, 0.0);
        sides += 1.0;
    }
    curvature /= sides;
    Ok(WallProjection {
        x: x[n] + unit_normal * wall_thickness,
        d1: d1[n] * (1.0 - curvature * wall_thickness),
        d2: d2[n],
        d3: unit_normal * wall_thickness.abs(),
    })
}
