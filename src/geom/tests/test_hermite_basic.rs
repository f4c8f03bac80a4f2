use std::f64::consts::{FRAC_PI_2, TAU};

use approx::{assert_abs_diff_eq, assert_relative_eq};

use crate::geom::{
    CurveLocation, InterpolationError, Vec2, Vec3, compute_cubic_hermite_arc_length,
    compute_cubic_hermite_derivative_scaling, cubic_hermite_arc_length,
    cubic_hermite_arc_length_to_xi, cubic_hermite_curvature, cubic_hermite_curvature_simple,
    cubic_hermite_curves_length, cubic_hermite_curves_point_at_arc_distance,
    cubic_hermite_trimmed_curves_lengths, interpolate_cubic_hermite,
    interpolate_cubic_hermite_derivative, interpolate_hermite_lagrange,
    interpolate_lagrange_hermite, interpolate_lagrange_hermite_derivative,
};

/// The parabola y = t² over t in [0, 1], which a cubic Hermite reproduces.
fn parabola() -> (Vec3, Vec3, Vec3, Vec3) {
    (
        Vec3::ZERO,
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(1.0, 2.0, 0.0),
    )
}

#[test]
fn segment_matches_end_values_and_derivatives() {
    let (v1, d1, v2, d2) = parabola();
    assert_eq!(interpolate_cubic_hermite(v1, d1, v2, d2, 0.0), v1);
    assert_eq!(interpolate_cubic_hermite(v1, d1, v2, d2, 1.0), v2);
    assert_eq!(interpolate_cubic_hermite_derivative(v1, d1, v2, d2, 0.0), d1);
    assert_eq!(interpolate_cubic_hermite_derivative(v1, d1, v2, d2, 1.0), d2);

    let mid = interpolate_cubic_hermite(v1, d1, v2, d2, 0.5);
    assert_relative_eq!(mid.x, 0.5, epsilon = 1e-15);
    assert_relative_eq!(mid.y, 0.25, epsilon = 1e-15);
}

#[test]
fn quadratic_partners_reproduce_parabola() {
    assert_relative_eq!(interpolate_hermite_lagrange(0.0, 0.0, 1.0, 0.5), 0.25);
    assert_relative_eq!(interpolate_lagrange_hermite(0.0, 1.0, 2.0, 0.5), 0.25);
    assert_relative_eq!(interpolate_lagrange_hermite_derivative(0.0, 1.0, 2.0, 0.0), 0.0);

    let v = interpolate_hermite_lagrange(Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), 0.5);
    assert_relative_eq!(v.x, 0.5);
    assert_relative_eq!(v.y, 0.25);
}

#[test]
fn straight_segment_arc_length_is_exact() {
    let length = cubic_hermite_arc_length(
        Vec3::ZERO,
        Vec3::new(3.0, 4.0, 0.0),
        Vec3::new(3.0, 4.0, 0.0),
        Vec3::new(3.0, 4.0, 0.0),
    );
    assert_relative_eq!(length, 5.0, epsilon = 1e-12);

    let half = cubic_hermite_arc_length_to_xi(0.0, 2.0, 2.0, 2.0, 0.5);
    assert_relative_eq!(half, 1.0, epsilon = 1e-12);
}

#[test]
fn rescaled_arc_length_of_quarter_circle() {
    let result = compute_cubic_hermite_arc_length(
        Vec3::X,
        Vec3::new(0.0, 5.0, 0.0),
        Vec3::Y,
        Vec3::new(-0.1, 0.0, 0.0),
        true,
    );
    assert!(result.converged);
    assert_relative_eq!(result.value, FRAC_PI_2, max_relative = 1e-2);
}

#[test]
fn derivative_scaling_restores_uniform_line() {
    let result = compute_cubic_hermite_derivative_scaling(
        Vec3::ZERO,
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 0.0),
    );
    assert!(result.converged);
    assert_abs_diff_eq!(result.value, 0.2, epsilon = 1e-6);
}

#[test]
fn closed_circle_length_close_to_circumference() {
    let radius = 2.0;
    let count: u32 = 8;
    let step = TAU / f64::from(count);
    let mut x = Vec::new();
    let mut d1 = Vec::new();
    for n in 0..count {
        let (sin, cos) = (f64::from(n) * step).sin_cos();
        x.push(Vec3::new(radius * cos, radius * sin, 0.0));
        d1.push(Vec3::new(-sin, cos, 0.0) * (radius * step));
    }
    let closed = cubic_hermite_curves_length(&x, &d1, true).expect("valid curve");
    assert_relative_eq!(closed, TAU * radius, max_relative = 1e-3);

    let open = cubic_hermite_curves_length(&x, &d1, false).expect("valid curve");
    assert_relative_eq!(open, closed * 7.0 / 8.0, max_relative = 1e-9);
}

#[test]
fn curves_length_rejects_malformed_input() {
    let err = cubic_hermite_curves_length(&[Vec3::ZERO], &[Vec3::X], false).unwrap_err();
    assert_eq!(err, InterpolationError::TooFewNodes { required: 2, count: 1 });

    let err = cubic_hermite_curves_length(&[Vec3::ZERO, Vec3::X], &[Vec3::X], false).unwrap_err();
    assert!(matches!(err, InterpolationError::LengthMismatch { expected: 2, actual: 1, .. }));
}

#[test]
fn point_at_arc_distance_on_straight_curve() {
    let x = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)];
    let d = [Vec3::new(2.0, 0.0, 0.0); 3];

    let inside = cubic_hermite_curves_point_at_arc_distance(&x, &d, 3.0).expect("valid curve");
    assert!(inside.converged);
    assert_eq!(inside.value.element, 1);
    assert_abs_diff_eq!(inside.value.xi, 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(inside.value.x.x, 3.0, epsilon = 1e-6);

    let before = cubic_hermite_curves_point_at_arc_distance(&x, &d, -1.0).expect("valid curve");
    assert_eq!(before.value.x, x[0]);
    assert_eq!(before.value.element, 0);

    let beyond = cubic_hermite_curves_point_at_arc_distance(&x, &d, 10.0).expect("valid curve");
    assert_eq!(beyond.value.x, x[2]);
    assert_eq!((beyond.value.element, beyond.value.xi), (1, 1.0));
}

#[test]
fn trimmed_lengths_split_at_locations() {
    let x = [0.0, 2.0, 4.0];
    let d = [2.0; 3];
    let trimmed = cubic_hermite_trimmed_curves_lengths(
        &x,
        &d,
        Some(CurveLocation::new(0, 0.5)),
        Some(CurveLocation::new(1, 0.5)),
    )
    .expect("valid locations");
    assert_relative_eq!(trimmed.start, 1.0, epsilon = 1e-12);
    assert_relative_eq!(trimmed.length, 2.0, epsilon = 1e-12);
    assert_relative_eq!(trimmed.end, 1.0, epsilon = 1e-12);
    assert_eq!(trimmed.length_to_node.len(), 3);

    let err = cubic_hermite_trimmed_curves_lengths(&x, &d, Some(CurveLocation::new(2, 0.0)), None).unwrap_err();
    assert_eq!(err, InterpolationError::LocationOutOfRange { element: 2, count: 2 });
}

#[test]
fn curvature_of_parabola() {
    let (v1, d1, v2, d2) = parabola();
    let at_vertex = cubic_hermite_curvature_simple(v1, d1, v2, d2, 0.0);
    assert_relative_eq!(at_vertex.curvature, 2.0, epsilon = 1e-12);

    let mid = cubic_hermite_curvature_simple(v1, d1, v2, d2, 0.5);
    assert_relative_eq!(mid.curvature, 1.0 / 2.0_f64.sqrt(), epsilon = 1e-12);

    let signed = cubic_hermite_curvature(v1, d1, v2, d2, Vec3::new(0.0, -1.0, 0.0), 0.0);
    assert_relative_eq!(signed, -2.0, epsilon = 1e-12);
}

#[test]
fn curvature_zero_for_stationary_tangent() {
    let sample = cubic_hermite_curvature_simple(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, 0.5);
    assert_eq!(sample.curvature, 0.0);
    assert_eq!(sample.d_tangent, Vec3::ZERO);
}
