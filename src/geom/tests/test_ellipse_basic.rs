use std::f64::consts::{FRAC_PI_2, FRAC_PI_3, FRAC_PI_4, PI, TAU};

use approx::{assert_abs_diff_eq, assert_relative_eq};

use crate::geom::{
    EllipseError, EllipseFrame, ProjectionAxes, Vec2, Vec3, Vector, approximate_ellipse_perimeter,
    circle_projection_axes, create_ellipsoid_points, ellipse_angle_from_vector, ellipse_arc_length,
    ellipse_point_at_true_angle, ellipse_radians_to_x, ellipse_tangent_at_point,
    ellipsoid_polar_coordinates_from_position, ellipsoid_polar_coordinates_tangents,
    move_coordinates_to_ellipsoid_surface, move_derivative_to_ellipsoid_surface,
    surface_projection_axes, update_ellipse_angle_by_arc_length,
};

fn unit_axes() -> ProjectionAxes {
    ProjectionAxes {
        x: Vec3::ZERO,
        d1: Vec3::X,
        d2: Vec3::Y,
        d3: Vec3::Z,
    }
}

#[test]
fn ramanujan_perimeter() {
    assert_relative_eq!(approximate_ellipse_perimeter(2.0, 1.0), 9.688_448_220_5, max_relative = 1e-3);
    assert_relative_eq!(approximate_ellipse_perimeter(1.5, 1.5), TAU * 1.5, epsilon = 1e-12);
}

#[test]
fn angle_from_vector_is_parametric() {
    assert_abs_diff_eq!(ellipse_angle_from_vector(2.0, 1.0, 0.0, 1.0), FRAC_PI_2, epsilon = 1e-15);
    assert_abs_diff_eq!(ellipse_angle_from_vector(2.0, 1.0, -3.0, 0.0), PI, epsilon = 1e-15);
    // direction (1, 1) meets the point (2 cos t, sin t) with tan t = 2
    assert_abs_diff_eq!(ellipse_angle_from_vector(2.0, 1.0, 1.0, 1.0), 2.0_f64.atan(), epsilon = 1e-15);
}

#[test]
fn arc_length_is_signed() {
    let forward = ellipse_arc_length(1.0, 1.0, 0.0, FRAC_PI_2);
    assert_relative_eq!(forward, FRAC_PI_2, max_relative = 1e-3);
    assert_relative_eq!(ellipse_arc_length(1.0, 1.0, FRAC_PI_2, 0.0), -forward);
    assert_eq!(ellipse_arc_length(3.0, 2.0, 0.7, 0.7), 0.0);
}

#[test]
fn angle_round_trips_through_arc_length() {
    let (a, b) = (2.0, 1.0);
    for (start, end) in [(0.0, 1.0), (0.3, 2.5), (-1.0, 4.0), (2.0, 0.5)] {
        let length = ellipse_arc_length(a, b, start, end);
        let update = update_ellipse_angle_by_arc_length(a, b, start, length, None);
        assert!(update.converged);
        let moved = ellipse_arc_length(a, b, start, update.value);
        assert!((moved - length).abs() <= 1e-4 * (a + b));
        assert_abs_diff_eq!(update.value, end, epsilon = 1e-3);
    }
}

#[test]
fn radians_to_x_solves_projection() {
    let result = ellipse_radians_to_x(2.0, 0.0, 1.0, 1.0);
    assert!(result.converged);
    assert_abs_diff_eq!(result.value, FRAC_PI_3, epsilon = 1e-9);

    let flat = ellipse_radians_to_x(1.0, 0.0, 5.0, 0.0);
    assert!(!flat.converged);
}

#[test]
fn true_angle_point_lies_on_ray() {
    for angle in [0.2, FRAC_PI_4, 2.0, 3.5, 5.0] {
        let p = ellipse_point_at_true_angle(2.0, 1.0, angle);
        assert_abs_diff_eq!(p.x * p.x / 4.0 + p.y * p.y, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y.atan2(p.x).rem_euclid(TAU), angle, epsilon = 1e-12);
    }
}

#[test]
fn tangent_at_point_is_anticlockwise() {
    assert_eq!(ellipse_tangent_at_point(2.0, 1.0, Vec2::new(2.0, 0.0)), Some(Vec2::new(0.0, 1.0)));
    let t = ellipse_tangent_at_point(2.0, 1.0, Vec2::new(0.0, 1.0)).expect("off centre");
    assert_abs_diff_eq!(t.x, -1.0, epsilon = 1e-15);
    assert_eq!(ellipse_tangent_at_point(2.0, 1.0, Vec2::ZERO), None);
}

#[test]
fn frame_rejects_zero_axis() {
    let err = EllipseFrame::new(Vec3::ZERO, Vec3::X, Vec3::ZERO).unwrap_err();
    assert_eq!(err, EllipseError::DegenerateAxis { what: "ellipse" });
}

#[test]
fn circle_points_have_arc_derivatives() {
    let frame = EllipseFrame::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0))
        .expect("valid frame");
    let points = frame.circle_points(4, 0.0).expect("elements");
    assert_eq!(points.x.len(), 4);
    assert_abs_diff_eq!(points.x[1].y, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(points.x[1].z, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(points.d1[0].length(), PI, epsilon = 1e-12);
    assert_abs_diff_eq!(points.d1[0].y, PI, epsilon = 1e-12);

    assert_eq!(frame.circle_points(0, 0.0).unwrap_err(), EllipseError::ZeroElements);
}

#[test]
fn ellipse_points_full_and_partial() {
    let frame = EllipseFrame::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)).expect("valid frame");

    let (full, diagnostics) = frame.ellipse_points(TAU, 8, 0.0).expect("elements");
    assert!(diagnostics.is_clean(), "{}", diagnostics.summary());
    assert_eq!(full.x.len(), 8);
    let element_length = frame.perimeter() / 8.0;
    for d in &full.d1 {
        assert_relative_eq!(d.length(), element_length, epsilon = 1e-12);
    }

    let (half, _) = frame.ellipse_points(PI, 4, 0.0).expect("elements");
    assert_eq!(half.x.len(), 5);
    assert_abs_diff_eq!(half.x[0].x, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(half.x[4].x, -2.0, epsilon = 1e-2);
    assert_abs_diff_eq!(half.x[4].y, 0.0, epsilon = 2e-2);
}

#[test]
fn sample_points_even_arc_length() {
    let frame = EllipseFrame::new(Vec3::ZERO, Vec3::X, Vec3::Y).expect("valid frame");
    let (points, diagnostics) = frame.sample_points(0.0, FRAC_PI_2, 4).expect("elements");
    assert!(diagnostics.is_clean(), "{}", diagnostics.summary());
    assert_eq!(points.x.len(), 5);
    assert_abs_diff_eq!((points.x[4] - Vec3::Y).length(), 0.0, epsilon = 1e-3);
    for d in &points.d1 {
        assert_relative_eq!(d.length(), FRAC_PI_2 / 4.0, max_relative = 1e-3);
    }
    for pair in points.x.windows(2) {
        assert_relative_eq!((pair[1] - pair[0]).length(), 2.0 * (PI / 16.0).sin(), max_relative = 1e-3);
    }
}

#[test]
fn sphere_lattice_from_pole_to_pole() {
    let (points, diagnostics) =
        create_ellipsoid_points(Vec3::ZERO, Vec3::Z, Vec3::X, 4, 4, 2.0).expect("valid ellipsoid");
    assert!(diagnostics.is_clean(), "{}", diagnostics.summary());
    assert_eq!(points.x.len(), 20);
    assert_eq!(points.d1.len(), 20);
    assert_eq!(points.d2.len(), 20);

    for n in 0..4 {
        assert_abs_diff_eq!((points.x[n] - Vec3::Z).length(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(points.d1[n].length(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((points.x[16 + n] + Vec3::Z).length(), 0.0, epsilon = 1e-3);
    }
    for (x, d2) in points.x.iter().zip(&points.d2) {
        assert_abs_diff_eq!(x.length(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(d2.length(), FRAC_PI_4, max_relative = 1e-3);
    }
    // equator row
    assert_abs_diff_eq!(points.x[8].z, 0.0, epsilon = 1e-3);
    assert_relative_eq!(points.d1[8].length(), FRAC_PI_2, max_relative = 1e-3);
}

#[test]
fn ellipsoid_points_reject_bad_input() {
    assert_eq!(
        create_ellipsoid_points(Vec3::ZERO, Vec3::Z, Vec3::X, 0, 4, 2.0).unwrap_err(),
        EllipseError::ZeroElements
    );
    assert_eq!(
        create_ellipsoid_points(Vec3::ZERO, Vec3::Z, Vec3::Z * 2.0, 4, 4, 2.0).unwrap_err(),
        EllipseError::DegenerateAxis { what: "ellipsoid" }
    );
}

#[test]
fn polar_tangents_at_equator() {
    let (x, dx_du, dx_dv) = ellipsoid_polar_coordinates_tangents(3.0, 2.0, 1.0, 0.0, FRAC_PI_2);
    assert_abs_diff_eq!((x - Vec3::new(3.0, 0.0, 0.0)).length(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!((dx_du - Vec3::new(0.0, 2.0, 0.0)).length(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!((dx_dv - Vec3::new(0.0, 0.0, 1.0)).length(), 0.0, epsilon = 1e-12);
    assert!(dx_du.cross(dx_dv).dot(x) > 0.0);
}

#[test]
fn polar_coordinates_round_trip() {
    let (a, b, c) = (3.0, 2.0, 1.0);
    for (u, v) in [(0.7, 1.1), (-2.0, 0.4), (2.5, 2.9)] {
        let (position, _, _) = ellipsoid_polar_coordinates_tangents(a, b, c, u, v);
        let result = ellipsoid_polar_coordinates_from_position(a, b, c, position);
        assert!(result.converged);
        let (found_u, found_v) = result.value;
        let (found, _, _) = ellipsoid_polar_coordinates_tangents(a, b, c, found_u, found_v);
        assert_abs_diff_eq!((found - position).length(), 0.0, epsilon = 1e-6);
    }
}

#[test]
fn points_and_derivatives_move_onto_surface() {
    let moved = move_coordinates_to_ellipsoid_surface(1.0, 1.0, 1.0, Vec3::new(2.0, 0.0, 0.0));
    assert!(moved.converged);
    assert_abs_diff_eq!(moved.value.x, 1.0, epsilon = 1e-8);

    let ellipsoid = move_coordinates_to_ellipsoid_surface(3.0, 2.0, 1.0, Vec3::new(1.0, 1.0, 1.0));
    assert!(ellipsoid.converged);
    let p = ellipsoid.value;
    assert_abs_diff_eq!(p.x * p.x / 9.0 + p.y * p.y / 4.0 + p.z * p.z, 1.0, epsilon = 1e-8);

    let centre = move_coordinates_to_ellipsoid_surface(1.0, 1.0, 1.0, Vec3::ZERO);
    assert!(!centre.converged);

    let d = move_derivative_to_ellipsoid_surface(1.0, 1.0, 1.0, Vec3::X, Vec3::new(1.0, 1.0, 0.0));
    assert_abs_diff_eq!(d.x, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(d.y, 2.0_f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn straight_projection_steps_along_d3() {
    let result = circle_projection_axes(unit_axes(), 2.5, 0.0, 0.0, None);
    assert_eq!(result.x, Vec3::new(0.0, 0.0, 2.5));
    assert_eq!(result.d3, Vec3::Z);
}

#[test]
fn bent_projection_follows_arc() {
    let length = 1.5;
    let bend: f64 = 0.3;
    let result = circle_projection_axes(unit_axes(), length, bend, 0.0, None);
    let radius = length / bend;
    assert_abs_diff_eq!(result.x.length(), 2.0 * radius * (bend / 2.0).sin(), epsilon = 1e-9);
    assert_abs_diff_eq!(result.x.y, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.d3.x, bend.sin(), epsilon = 1e-12);
    assert_abs_diff_eq!(result.d3.z, bend.cos(), epsilon = 1e-12);
    assert_abs_diff_eq!(result.d1.dot(result.d3), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.d2.dot(result.d3), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.d1.length(), 1.0, epsilon = 1e-12);
}

#[test]
fn roll_rotates_lateral_axes() {
    let result = circle_projection_axes(unit_axes(), 1.0, 0.0, 0.0, Some(FRAC_PI_2));
    assert_abs_diff_eq!((result.d1 - Vec3::Y).length(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!((result.d2 + Vec3::X).length(), 0.0, epsilon = 1e-12);
}

#[test]
fn surface_projection_rotates_forward_axis() {
    let result = surface_projection_axes(unit_axes(), FRAC_PI_2, 0.0, 2.0);
    assert_abs_diff_eq!((result.d3 - Vec3::X).length(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!((result.x - Vec3::new(2.0, 0.0, 0.0)).length(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!((result.d1 + Vec3::Z).length(), 0.0, epsilon = 1e-12);
}
