use std::f64::consts::TAU;

use approx::{assert_abs_diff_eq, assert_relative_eq};

use crate::geom::{
    CurveEnd, CurveLocation, InterpolationError, Vec3, advance_curve_location,
    curvatures_along_curve, evaluate_coordinates_on_curve, increment_xi_on_line,
    is_location_on_curve_boundary, nearest_location_on_curve, nearest_parameter_location_on_curve,
    nearest_point_index, project_hermite_curves_through_wall, update_curve_location_to_face,
};

fn circle(radius: f64, count: u32) -> (Vec<Vec3>, Vec<Vec3>) {
    let step = TAU / f64::from(count);
    (0..count)
        .map(|n| {
            let (sin, cos) = (f64::from(n) * step).sin_cos();
            (
                Vec3::new(radius * cos, radius * sin, 0.0),
                Vec3::new(-sin, cos, 0.0) * (radius * step),
            )
        })
        .unzip()
}

#[test]
fn increment_stops_at_element_ends() {
    assert_eq!(increment_xi_on_line(0.2, 0.3), (0.5, None));
    assert_eq!(increment_xi_on_line(0.5, 0.7), (1.0, Some(CurveEnd::End)));
    assert_eq!(increment_xi_on_line(0.5, -0.7), (0.0, Some(CurveEnd::Start)));
}

#[test]
fn advance_wraps_closed_and_clamps_open() {
    let start = CurveLocation::new(3, 0.5);

    let closed = advance_curve_location(start, 1.0, 4, true, 2.0);
    assert_eq!(closed.location.element, 0);
    assert_abs_diff_eq!(closed.location.xi, 0.5, epsilon = 1e-12);
    assert_eq!(closed.boundary, None);

    let open = advance_curve_location(start, 1.0, 4, false, 2.0);
    assert_eq!(open.location, CurveLocation::new(3, 1.0));
    assert_eq!(open.boundary, Some(CurveEnd::End));
    assert_abs_diff_eq!(open.dxi, 0.5, epsilon = 1e-12);

    let capped = advance_curve_location(CurveLocation::new(0, 0.0), 3.0, 4, false, 0.5);
    assert_abs_diff_eq!(capped.dxi, 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(capped.location.xi, 0.5, epsilon = 1e-12);
}

#[test]
fn face_updates_step_between_elements() {
    let at_start = CurveLocation::new(0, 0.0);
    assert_eq!(
        update_curve_location_to_face(at_start, CurveEnd::Start, 3, true),
        (CurveLocation::new(2, 1.0), false)
    );
    assert_eq!(update_curve_location_to_face(at_start, CurveEnd::Start, 3, false), (at_start, true));
    assert_eq!(
        update_curve_location_to_face(CurveLocation::new(1, 1.0), CurveEnd::End, 3, false),
        (CurveLocation::new(2, 0.0), false)
    );

    assert!(is_location_on_curve_boundary(CurveLocation::new(2, 1.0), 3));
    assert!(!is_location_on_curve_boundary(CurveLocation::new(1, 1.0), 3));
}

#[test]
fn evaluate_checks_element_range() {
    let (x, d1) = circle(1.0, 4);
    let (point, _) = evaluate_coordinates_on_curve(&x, &d1, CurveLocation::new(3, 1.0), true).expect("in range");
    assert_abs_diff_eq!((point - x[0]).length(), 0.0, epsilon = 1e-12);

    let err = evaluate_coordinates_on_curve(&x, &d1, CurveLocation::new(3, 0.0), false).unwrap_err();
    assert_eq!(err, InterpolationError::LocationOutOfRange { element: 3, count: 3 });
}

#[test]
fn nearest_node_lookup() {
    let x = [Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)];
    assert_eq!(nearest_point_index(&x, Vec3::new(1.2, 0.3, 0.0)), Some(1));
    assert_eq!(nearest_point_index::<Vec3>(&[], Vec3::ZERO), None);

    let (location, distance) =
        nearest_parameter_location_on_curve(&x, Vec3::new(2.5, 0.0, 0.0), false).expect("valid curve");
    assert_eq!(location, CurveLocation::new(1, 1.0));
    assert_abs_diff_eq!(distance, 0.5, epsilon = 1e-12);
}

#[test]
fn nearest_location_on_straight_curve() {
    let x = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)];
    let d1 = [Vec3::new(2.0, 0.0, 0.0); 3];
    let result = nearest_location_on_curve(&x, &d1, Vec3::new(3.0, 1.0, 0.0), false, None).expect("valid curve");
    assert!(result.converged);
    assert_eq!(result.value.location.element, 1);
    assert_abs_diff_eq!(result.value.location.xi, 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(result.value.x.x, 3.0, epsilon = 1e-6);
}

#[test]
fn nearest_location_on_circle() {
    let (x, d1) = circle(2.0, 8);
    let angle: f64 = 1.0;
    let target = Vec3::new(3.0 * angle.cos(), 3.0 * angle.sin(), 0.0);
    let result = nearest_location_on_curve(&x, &d1, target, true, None).expect("valid curve");
    assert!(result.converged);
    let found = result.value.x;
    assert_relative_eq!(found.y.atan2(found.x), angle, max_relative = 1e-2);
    assert_relative_eq!(found.length(), 2.0, max_relative = 2e-3);
}

#[test]
fn circle_curvature_is_inverse_radius() {
    let (x, d1) = circle(2.0, 16);
    let inward: Vec<Vec3> = x.iter().map(|p| *p * -0.5).collect();
    let curvatures = curvatures_along_curve(&x, &d1, &inward, true).expect("valid curve");
    assert_eq!(curvatures.len(), 16);
    for k in curvatures {
        assert_relative_eq!(k, 0.5, max_relative = 2e-2);
    }
}

#[test]
fn wall_projection_scales_along_curve_derivative() {
    let (x, d1) = circle(2.0, 16);
    let d2 = vec![Vec3::Z; x.len()];
    let projected = project_hermite_curves_through_wall(&x, &d1, &d2, 0, 0.5, true).expect("valid node");
    assert_abs_diff_eq!(projected.x.x, 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(projected.d3.length(), 0.5, epsilon = 1e-12);
    assert_eq!(projected.d2, Vec3::Z);
    assert_relative_eq!(projected.d1.length() / d1[0].length(), 1.25, max_relative = 1e-2);

    let err = project_hermite_curves_through_wall(&x, &d1, &d2, 16, 0.5, true).unwrap_err();
    assert_eq!(err, InterpolationError::IndexOutOfRange { index: 16, count: 16 });
}
