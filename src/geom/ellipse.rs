//! Ellipse and ellipsoid geometry.
//!
//! Angles are parametric: a point at angle θ on an ellipse with axes `a`
//! and `b` is `(a cos θ, b sin θ)`, measured anticlockwise from the first
//! axis.
//!
//! # Operations
//! - **Scalars**: Ramanujan perimeter, angle from a direction, arc length
//!   between two angles, angle reached by moving an arc length, and the
//!   angle at which a rotated ellipse reaches a given x.
//! - **Point rings**: evenly spaced points on circles and ellipses in 3-D,
//!   held in an [`EllipseFrame`].
//! - **Ellipsoids**: a lattice of points up an ellipsoid of revolution,
//!   polar coordinates, and moving points or derivatives onto the surface.
//! - **Projection axes**: stepping a local frame along a bend.
//!
//! # Example
//!
//! ```ignore
//! use scaffold_geom::geom::{EllipseFrame, Vec3};
//!
//! let frame = EllipseFrame::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0))?;
//! let (ring, diagnostics) = frame.ellipse_points(std::f64::consts::TAU, 8, 0.0)?;
//! assert_eq!(ring.x.len(), 8);
//! ```

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::core::{MAX_ITERATIONS, Tolerance, Vec2, Vec3, Vector};
use super::diagnostics::{IterationResult, SolverDiagnostics};
use super::surface_frame::calculate_surface_delta_xi;

/// Line segments used per π radians when measuring ellipse arc length.
const ARC_SEGMENTS_PER_PI: f64 = 50.0;

/// Iteration after which angle updates are averaged with the previous one.
const DAMPING_START_ITERATION: usize = 50;

/// Residual tolerance on `a cos θ + b sin θ - x`, relative to the axes.
const RADIANS_TO_X_TOLERANCE: f64 = 1.0e-10;

/// Tolerance on the implicit ellipsoid equation when moving onto it.
const ELLIPSOID_SURFACE_TOLERANCE: f64 = 1.0e-8;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EllipseError {
    #[error("at least one element is required")]
    ZeroElements,

    #[error("degenerate {what}: axes must have non-zero length")]
    DegenerateAxis { what: &'static str },
}

// ============================================================================
// Scalar ellipse functions
// ============================================================================

/// Perimeter by Ramanujan's second approximation.
#[must_use]
pub fn approximate_ellipse_perimeter(a: f64, b: f64) -> f64 {
    let h = ((a - b) / (a + b)).powi(2);
    PI * (a + b) * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt()))
}

/// Parametric angle of the ellipse point in direction `(x, y)` from the
/// centre.
#[must_use]
pub fn ellipse_angle_from_vector(a: f64, b: f64, x: f64, y: f64) -> f64 {
    (a * y).atan2(b * x)
}

/// Arc length from `angle1` to `angle2` by summing chords.
///
/// Uses up to 50 chords per π radians. The result is negative when
/// `angle2 < angle1`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn ellipse_arc_length(a: f64, b: f64, angle1: f64, angle2: f64) -> f64 {
    let lo = angle1.min(angle2);
    let hi = angle1.max(angle2);
    let segments = (ARC_SEGMENTS_PER_PI * (hi - lo) / PI).ceil() as usize;
    if segments == 0 {
        return 0.0;
    }
    let point = |angle: f64| Vec2::new(a * angle.cos(), b * angle.sin());
    let mut last = point(hi);
    let mut length = 0.0;
    for i in 1..=segments {
        let r = i as f64 / segments as f64;
        let next = point(r * lo + (1.0 - r) * hi);
        length += (next - last).magnitude();
        last = next;
    }
    if angle1 < angle2 { length } else { -length }
}

/// Angle reached by travelling `arc_length` around the ellipse from
/// `angle`, positive anticlockwise.
///
/// Newton iteration on [`ellipse_arc_length`], converging when the length
/// travelled is within `tolerance × (a + b)` of the target. `tolerance`
/// defaults to [`Tolerance::ELLIPSE_ARC`]. Late iterations are damped.
#[must_use]
pub fn update_ellipse_angle_by_arc_length(
    a: f64,
    b: f64,
    angle: f64,
    arc_length: f64,
    tolerance: Option<f64>,
) -> IterationResult<f64> {
    let length_tol = Tolerance::new(tolerance.unwrap_or(Tolerance::ELLIPSE_ARC.eps)).relative_to(a + b);
    let mut new_angle = angle;
    let mut moved = 0.0;
    let mut iterations = 0;
    while (arc_length - moved).abs() > length_tol {
        if iterations == MAX_ITERATIONS {
            return IterationResult::unconverged(
                new_angle,
                iterations,
                (arc_length - moved).abs(),
                "update_ellipse_angle_by_arc_length",
            );
        }
        let old_angle = new_angle;
        let rate = Vec2::new(-a * new_angle.sin(), b * new_angle.cos()).magnitude();
        if rate <= 0.0 {
            return IterationResult::unconverged(
                new_angle,
                iterations,
                (arc_length - moved).abs(),
                "update_ellipse_angle_by_arc_length: zero rate",
            );
        }
        new_angle += (arc_length - moved) / rate;
        if iterations >= DAMPING_START_ITERATION {
            new_angle = 0.5 * (new_angle + old_angle);
        }
        moved = ellipse_arc_length(a, b, angle, new_angle);
        iterations += 1;
    }
    IterationResult::converged(new_angle, iterations, (arc_length - moved).abs())
}

/// Solve `ax cos θ + bx sin θ = dx` for θ by Newton iteration.
///
/// The equation is multi-valued so the root found depends on
/// `initial_angle`.
#[must_use]
pub fn ellipse_radians_to_x(ax: f64, bx: f64, dx: f64, initial_angle: f64) -> IterationResult<f64> {
    let f_tol = ax.hypot(bx) * RADIANS_TO_X_TOLERANCE;
    let mut theta = initial_angle;
    for iterations in 0..MAX_ITERATIONS {
        let (sin, cos) = theta.sin_cos();
        let f = ax * cos + bx * sin - dx;
        if f.abs() < f_tol {
            return IterationResult::converged(theta, iterations, f.abs());
        }
        let df = -ax * sin + bx * cos;
        if df == 0.0 {
            return IterationResult::unconverged(theta, iterations, f.abs(), "ellipse_radians_to_x: zero slope");
        }
        theta -= f / df;
    }
    let residual = (ax * theta.cos() + bx * theta.sin() - dx).abs();
    if residual < f_tol {
        IterationResult::converged(theta, MAX_ITERATIONS, residual)
    } else {
        IterationResult::unconverged(theta, MAX_ITERATIONS, residual, "ellipse_radians_to_x")
    }
}

/// Point where a ray from the centre at true (not parametric) angle
/// `angle` meets the ellipse.
#[must_use]
pub fn ellipse_point_at_true_angle(a: f64, b: f64, angle: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    // ray normal
    let ni = sin;
    let nj = -cos;
    if nj.abs() > ni.abs() {
        let denominator = 1.0 / (a * a) + (ni * ni) / (nj * nj * b * b);
        let x = (1.0 / denominator).sqrt().copysign(cos);
        Vec2::new(x, (-ni / nj) * x)
    } else {
        let denominator = 1.0 / (b * b) + (nj * nj) / (ni * ni * a * a);
        let y = (1.0 / denominator).sqrt().copysign(sin);
        Vec2::new((-nj / ni) * y, y)
    }
}

/// Unit anticlockwise tangent at a point on the ellipse, `None` at the
/// centre.
#[must_use]
pub fn ellipse_tangent_at_point(a: f64, b: f64, point: Vec2) -> Option<Vec2> {
    Vec2::new(-point.y / (b * b), point.x / (a * a)).normalized()
}

// ============================================================================
// Ellipses in 3-D
// ============================================================================

/// Points and derivatives around a ring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EllipsePoints {
    pub x: Vec<Vec3>,
    pub d1: Vec<Vec3>,
}

impl EllipsePoints {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            d1: Vec::with_capacity(capacity),
        }
    }
}

/// An ellipse in 3-D: a centre and two orthogonal axis vectors.
///
/// Angle 0 is at `centre + axis1`, angle π/2 at `centre + axis2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseFrame {
    pub centre: Vec3,
    pub axis1: Vec3,
    pub axis2: Vec3,
}

impl EllipseFrame {
    /// # Errors
    /// Returns [`EllipseError::DegenerateAxis`] if either axis is zero.
    pub fn new(centre: Vec3, axis1: Vec3, axis2: Vec3) -> Result<Self, EllipseError> {
        if axis1.normalized().is_none() || axis2.normalized().is_none() {
            return Err(EllipseError::DegenerateAxis { what: "ellipse" });
        }
        Ok(Self { centre, axis1, axis2 })
    }

    #[must_use]
    pub fn axis1_length(&self) -> f64 {
        self.axis1.length()
    }

    #[must_use]
    pub fn axis2_length(&self) -> f64 {
        self.axis2.length()
    }

    #[must_use]
    pub fn point_at(&self, angle: f64) -> Vec3 {
        let (sin, cos) = angle.sin_cos();
        self.centre + self.axis1 * cos + self.axis2 * sin
    }

    /// Derivative of [`Self::point_at`] with respect to the angle.
    #[must_use]
    pub fn derivative_at(&self, angle: f64) -> Vec3 {
        let (sin, cos) = angle.sin_cos();
        self.axis1 * -sin + self.axis2 * cos
    }

    #[must_use]
    pub fn perimeter(&self) -> f64 {
        approximate_ellipse_perimeter(self.axis1_length(), self.axis2_length())
    }

    #[must_use]
    pub fn arc_length(&self, angle1: f64, angle2: f64) -> f64 {
        ellipse_arc_length(self.axis1_length(), self.axis2_length(), angle1, angle2)
    }

    /// `elements_count + 1` points at even arc length from `angle1` to
    /// `angle2`, with derivatives scaled to the element arc length.
    ///
    /// # Errors
    /// Returns [`EllipseError::ZeroElements`] if `elements_count` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample_points(
        &self,
        angle1: f64,
        angle2: f64,
        elements_count: usize,
    ) -> Result<(EllipsePoints, SolverDiagnostics), EllipseError> {
        if elements_count == 0 {
            return Err(EllipseError::ZeroElements);
        }
        let a = self.axis1_length();
        let b = self.axis2_length();
        let element_length = self.arc_length(angle1, angle2) / elements_count as f64;
        let mut points = EllipsePoints::with_capacity(elements_count + 1);
        let mut diagnostics = SolverDiagnostics::new();
        let mut angle = angle1;
        for _ in 0..=elements_count {
            points.x.push(self.point_at(angle));
            points.d1.push(
                self.derivative_at(angle)
                    .normalized()
                    .map_or(Vec3::ZERO, |unit| unit * element_length),
            );
            let update = update_ellipse_angle_by_arc_length(a, b, angle, element_length, None);
            diagnostics.record("ellipse angle", &update);
            angle = update.value;
        }
        Ok((points, diagnostics))
    }

    /// `elements_count` points at even angles around a full circle.
    ///
    /// Derivatives are scaled by the angle per element, which is the
    /// element arc length when the axes are equal in length.
    ///
    /// # Errors
    /// Returns [`EllipseError::ZeroElements`] if `elements_count` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn circle_points(&self, elements_count: usize, start_angle: f64) -> Result<EllipsePoints, EllipseError> {
        if elements_count == 0 {
            return Err(EllipseError::ZeroElements);
        }
        let radians_per_element = TAU / elements_count as f64;
        let mut points = EllipsePoints::with_capacity(elements_count);
        for n in 0..elements_count {
            let angle = start_angle + n as f64 * radians_per_element;
            points.x.push(self.point_at(angle));
            points.d1.push(self.derivative_at(angle) * radians_per_element);
        }
        Ok(points)
    }

    /// Points at even arc length over `radians` of the ellipse from
    /// `start_angle`, spaced by the Ramanujan perimeter.
    ///
    /// A full ellipse (`radians` = 2π) gives `elements_count` points, a
    /// partial arc gives `elements_count + 1` including both ends.
    ///
    /// # Errors
    /// Returns [`EllipseError::ZeroElements`] if `elements_count` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn ellipse_points(
        &self,
        radians: f64,
        elements_count: usize,
        start_angle: f64,
    ) -> Result<(EllipsePoints, SolverDiagnostics), EllipseError> {
        if elements_count == 0 {
            return Err(EllipseError::ZeroElements);
        }
        let a = self.axis1_length();
        let b = self.axis2_length();
        let element_length = radians * self.perimeter() / TAU / elements_count as f64;
        let points_count = if (radians - TAU).abs() > f64::EPSILON {
            elements_count + 1
        } else {
            elements_count
        };
        let unit1 = self.axis1 * (1.0 / a);
        let unit2 = self.axis2 * (1.0 / b);
        let mut points = EllipsePoints::with_capacity(points_count);
        let mut diagnostics = SolverDiagnostics::new();
        for n in 0..points_count {
            let update = update_ellipse_angle_by_arc_length(a, b, start_angle, n as f64 * element_length, None);
            diagnostics.record("ellipse angle", &update);
            let (sin, cos) = update.value.sin_cos();
            points.x.push(self.point_at(update.value));
            let direction = unit1 * (-a * sin) + unit2 * (b * cos);
            points
                .d1
                .push(direction.normalized().map_or(Vec3::ZERO, |unit| unit * element_length));
        }
        Ok((points, diagnostics))
    }
}

// ============================================================================
// Ellipsoids
// ============================================================================

/// Lattice of points over an ellipsoid of revolution, fastest around.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EllipsoidPoints {
    pub x: Vec<Vec3>,
    /// Derivatives around each latitude.
    pub d1: Vec<Vec3>,
    /// Derivatives up from the starting pole.
    pub d2: Vec<Vec3>,
}

/// Points on an ellipsoid of revolution from the pole at
/// `centre + pole_axis` up to `height` along the pole axis.
///
/// Rows are equally spaced in arc length up the meridian ellipse and each
/// row has `elements_count_around` points at equal angles. The first row
/// collapses onto the pole. The output suits a [`super::TrackSurface`]
/// looped in direction 1.
///
/// # Errors
/// Returns an error if either count is zero, either axis is zero, or the
/// axes are parallel.
#[allow(clippy::cast_precision_loss)]
pub fn create_ellipsoid_points(
    centre: Vec3,
    pole_axis: Vec3,
    side_axis: Vec3,
    elements_count_around: usize,
    elements_count_up: usize,
    height: f64,
) -> Result<(EllipsoidPoints, SolverDiagnostics), EllipseError> {
    if elements_count_around == 0 || elements_count_up == 0 {
        return Err(EllipseError::ZeroElements);
    }
    let degenerate = EllipseError::DegenerateAxis { what: "ellipsoid" };
    let unit_pole = pole_axis.normalized().ok_or_else(|| degenerate.clone())?;
    let unit_side1 = side_axis.normalized().ok_or_else(|| degenerate.clone())?;
    let unit_side2 = side_axis.cross(pole_axis).normalized().ok_or(degenerate)?;
    let mag_pole = pole_axis.length();
    let mag_side = side_axis.length();

    let mut diagnostics = SolverDiagnostics::new();
    let use_height = height.clamp(0.0, 2.0 * mag_pole);
    let total_up = ellipse_radians_to_x(
        mag_pole,
        0.0,
        mag_pole - use_height,
        FRAC_PI_2 * use_height / mag_pole,
    );
    diagnostics.record("ellipsoid height angle", &total_up);
    let element_length_up = ellipse_arc_length(mag_pole, mag_side, 0.0, total_up.value) / elements_count_up as f64;
    let radians_per_element_around = TAU / elements_count_around as f64;

    let count = elements_count_around * (elements_count_up + 1);
    let mut points = EllipsoidPoints {
        x: Vec::with_capacity(count),
        d1: Vec::with_capacity(count),
        d2: Vec::with_capacity(count),
    };
    let mut radians_up = 0.0_f64;
    for _ in 0..=elements_count_up {
        let (sin_up, cos_up) = radians_up.sin_cos();
        let radius = sin_up * mag_side;
        let d2 = Vec2::new(cos_up * mag_side, sin_up * mag_pole)
            .with_magnitude(element_length_up)
            .unwrap_or(Vec2::ZERO);
        let cx = centre + pole_axis * cos_up;
        let element_length_around = radius * radians_per_element_around;
        for n in 0..elements_count_around {
            let (sin_around, cos_around) = (n as f64 * radians_per_element_around).sin_cos();
            let radial = unit_side1 * cos_around + unit_side2 * sin_around;
            points.x.push(cx + radial * radius);
            points
                .d1
                .push((unit_side1 * -sin_around + unit_side2 * cos_around) * element_length_around);
            points.d2.push(radial * d2.x - unit_pole * d2.y);
        }
        let update = update_ellipse_angle_by_arc_length(mag_pole, mag_side, radians_up, element_length_up, None);
        diagnostics.record("ellipsoid row angle", &update);
        radians_up = update.value;
    }
    log::debug!(
        "create_ellipsoid_points: {} x {} points, {}",
        elements_count_around,
        elements_count_up + 1,
        diagnostics.summary()
    );
    Ok((points, diagnostics))
}

/// Position and tangents of the ellipsoid `x²/a² + y²/b² + z²/c² = 1` at
/// polar coordinates `(u, v)`.
///
/// `u` runs from +x towards +y, `v` from 0 at the −z apex to π at +z:
/// `x = (a cos u sin v, b sin u sin v, −c cos v)`. Returns
/// `(x, dx/du, dx/dv)`; `dx/du × dx/dv` points outward. The tangents
/// degenerate at the apexes.
#[must_use]
pub fn ellipsoid_polar_coordinates_tangents(a: f64, b: f64, c: f64, u: f64, v: f64) -> (Vec3, Vec3, Vec3) {
    let (sin_u, cos_u) = u.sin_cos();
    let (sin_v, cos_v) = v.sin_cos();
    (
        Vec3::new(a * cos_u * sin_v, b * sin_u * sin_v, -c * cos_v),
        Vec3::new(-a * sin_u * sin_v, b * cos_u * sin_v, 0.0),
        Vec3::new(a * cos_u * cos_v, b * sin_u * cos_v, c * sin_v),
    )
}

/// Polar coordinates `(u, v)` of the ellipsoid point nearest `position`.
///
/// Starts from the scaled direction of `position` and refines with the
/// least-squares tangent step until both increments fall below
/// [`Tolerance::XI`].
#[must_use]
pub fn ellipsoid_polar_coordinates_from_position(
    a: f64,
    b: f64,
    c: f64,
    position: Vec3,
) -> IterationResult<(f64, f64)> {
    let rx = position.x / a;
    let ry = position.y / b;
    let rz = position.z / c;
    let mut u = ry.atan2(rx);
    let mut v = rx.hypot(ry).atan2(-rz);
    let mut step = 0.0;
    for iterations in 1..=MAX_ITERATIONS {
        let (x, dx_du, dx_dv) = ellipsoid_polar_coordinates_tangents(a, b, c, u, v);
        let delta = calculate_surface_delta_xi(dx_du, dx_dv, position - x);
        u += delta.x;
        v += delta.y;
        step = delta.x.abs().max(delta.y.abs());
        if step < Tolerance::XI.eps {
            return IterationResult::converged((u, v), iterations, step);
        }
    }
    IterationResult::unconverged((u, v), MAX_ITERATIONS, step, "ellipsoid_polar_coordinates_from_position")
}

/// Move `start` onto the ellipsoid surface along the gradient of its
/// implicit equation.
#[must_use]
pub fn move_coordinates_to_ellipsoid_surface(a: f64, b: f64, c: f64, start: Vec3) -> IterationResult<Vec3> {
    let scale = Vec3::new(1.0 / (a * a), 1.0 / (b * b), 1.0 / (c * c));
    let mut x = start;
    let mut f = 0.0_f64;
    for iterations in 0..MAX_ITERATIONS {
        f = x.x * x.x * scale.x + x.y * x.y * scale.y + x.z * x.z * scale.z - 1.0;
        if f.abs() < ELLIPSOID_SURFACE_TOLERANCE {
            return IterationResult::converged(x, iterations, f.abs());
        }
        let df = Vec3::new(2.0 * x.x * scale.x, 2.0 * x.y * scale.y, 2.0 * x.z * scale.z);
        let mag_sq = df.length_squared();
        if mag_sq == 0.0 {
            return IterationResult::unconverged(x, iterations, f.abs(), "move_coordinates_to_ellipsoid_surface: at centre");
        }
        x = x - df * (f / mag_sq);
    }
    IterationResult::unconverged(x, MAX_ITERATIONS, f.abs(), "move_coordinates_to_ellipsoid_surface")
}

/// Make `derivative` tangent to the ellipsoid at surface point `x`, keeping
/// its magnitude.
#[must_use]
pub fn move_derivative_to_ellipsoid_surface(a: f64, b: f64, c: f64, x: Vec3, derivative: Vec3) -> Vec3 {
    let normal = Vec3::new(2.0 * x.x / (a * a), 2.0 * x.y / (b * b), 2.0 * x.z / (c * c));
    let normal_sq = normal.length_squared();
    if normal_sq == 0.0 {
        return derivative;
    }
    let rejection = derivative - normal * (derivative.dot(normal) / normal_sq);
    rejection.with_magnitude(derivative.length()).unwrap_or(Vec3::ZERO)
}

// ============================================================================
// Projection axes
// ============================================================================

/// A position with three orthogonal axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionAxes {
    pub x: Vec3,
    pub d1: Vec3,
    pub d2: Vec3,
    /// Forward direction.
    pub d3: Vec3,
}

/// Bend direction blending `d1`, `d2` and `d3` for two bend angles.
fn bend_factors(angle1: f64, angle2: f64) -> (f64, f64, f64) {
    let (sin1, cos1) = angle1.sin_cos();
    let (sin2, cos2) = angle2.sin_cos();
    (sin1 * cos2, cos1 * sin2, cos1 * cos2)
}

/// Step `axes` forward along a circular arc of `length` that starts along
/// `d3` and ends turned by `angle1` towards `d1` and `angle2` towards `d2`.
///
/// `angle3` optionally rolls the final `d1`, `d2` about the new `d3`.
/// Unit input axes give unit output axes. Not valid for bends near 90°.
#[must_use]
pub fn circle_projection_axes(
    axes: ProjectionAxes,
    length: f64,
    angle1: f64,
    angle2: f64,
    angle3: Option<f64>,
) -> ProjectionAxes {
    let small = Tolerance::SMALL_ANGLE.eps;
    let mut result = if angle1.abs() < small && angle2.abs() < small {
        ProjectionAxes {
            x: axes.x + axes.d3 * length,
            ..axes
        }
    } else {
        let (f1, f2, f3) = bend_factors(angle1, angle2);
        let angle_around = f2.atan2(f1);
        let fh = f1.hypot(f2);
        let arc_angle = FRAC_PI_2 - f3.atan2(fh);
        let arc_radius = length / arc_angle;
        let br = arc_radius * (1.0 - arc_angle.cos());
        let x = axes.x
            + axes.d1 * (br * angle_around.cos())
            + axes.d2 * (br * angle_around.sin())
            + axes.d3 * (arc_radius * arc_angle.sin());
        let d3 = (axes.d1 * f1 + axes.d2 * f2 + axes.d3 * f3)
            .normalized()
            .unwrap_or(axes.d3);
        let d1 = axes.d2.cross(d3).normalized().unwrap_or(axes.d1);
        ProjectionAxes {
            x,
            d1,
            d2: d3.cross(d1),
            d3,
        }
    };
    if let Some(roll) = angle3 {
        let (sin3, cos3) = roll.sin_cos();
        let d1 = result.d1 * cos3 + result.d2 * sin3;
        let d2 = result.d2 * cos3 - result.d1 * sin3;
        result.d1 = d1;
        result.d2 = d2;
    }
    result
}

/// Step `axes` forward by `length` along `d3` rotated by `angle1` towards
/// `d1` and `angle2` towards `d2`, by plain rotation.
///
/// The output axes are not renormalized.
#[must_use]
pub fn surface_projection_axes(axes: ProjectionAxes, angle1: f64, angle2: f64, length: f64) -> ProjectionAxes {
    let (f1, f2, f3) = bend_factors(angle1, angle2);
    let d3 = axes.d1 * f1 + axes.d2 * f2 + axes.d3 * f3;
    let d1 = axes.d2.cross(d3);
    ProjectionAxes {
        x: axes.x + d3 * length,
        d1,
        d2: d3.cross(d1),
        d3,
    }
}
