use approx::assert_relative_eq;

use crate::geom::{
    BBox, Tolerance, Vec2, Vec3, Vector, cross, dot, dot_slices, identity_matrix, magnitude,
    matrix_diagonal, normalize, outer_product, set_magnitude,
};

#[test]
fn dot_and_cross_follow_right_hand_rule() {
    let a = Vec3::new(1.0, 2.0, 3.0);
    let b = Vec3::new(-2.0, 0.5, 4.0);
    assert_relative_eq!(dot(a, b), 11.0);
    assert_eq!(cross(Vec3::X, Vec3::Y), Vec3::Z);
    assert_eq!(cross(Vec3::Y, Vec3::X), -Vec3::Z);

    let c = cross(a, b);
    assert_relative_eq!(dot(c, a), 0.0, epsilon = 1e-12);
    assert_relative_eq!(dot(c, b), 0.0, epsilon = 1e-12);
}

#[test]
fn magnitude_is_generic_over_dimension() {
    assert_relative_eq!(magnitude(-3.5_f64), 3.5);
    assert_relative_eq!(magnitude(Vec2::new(3.0, 4.0)), 5.0);
    assert_relative_eq!(magnitude(Vec3::new(2.0, 3.0, 6.0)), 7.0);
}

#[test]
fn normalize_rejects_zero_vector() {
    assert_eq!(normalize(Vec3::ZERO), None);
    assert_eq!(normalize(Vec2::ZERO), None);
    assert_eq!(normalize(0.0_f64), None);

    let unit = normalize(Vec3::new(0.0, -4.0, 3.0)).expect("non-zero");
    assert_relative_eq!(unit.length(), 1.0, epsilon = 1e-15);
    assert_relative_eq!(unit.y, -0.8, epsilon = 1e-15);
}

#[test]
fn set_magnitude_keeps_direction() {
    let v = set_magnitude(Vec2::new(3.0, 4.0), 10.0).expect("non-zero");
    assert_relative_eq!(v.x, 6.0, epsilon = 1e-12);
    assert_relative_eq!(v.y, 8.0, epsilon = 1e-12);

    let flipped = set_magnitude(Vec3::X, -2.0).expect("non-zero");
    assert_eq!(flipped, Vec3::new(-2.0, 0.0, 0.0));
    assert_eq!(set_magnitude(Vec3::ZERO, 1.0), None);
}

#[test]
fn scalar_vector_sign_behaves_like_direction() {
    assert_eq!((-2.5_f64).normalized(), Some(-1.0));
    assert_eq!(0.5_f64.with_magnitude(3.0), Some(3.0));
}

#[test]
fn slice_and_matrix_helpers() {
    assert_relative_eq!(dot_slices(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);

    let identity = identity_matrix(3);
    assert_eq!(identity[1], vec![0.0, 1.0, 0.0]);
    assert_eq!(matrix_diagonal(&identity), vec![1.0, 1.0, 1.0]);

    let outer = outer_product(&[1.0, 2.0], &[3.0, 4.0, 5.0]);
    assert_eq!(outer.len(), 2);
    assert_eq!(outer[1], vec![6.0, 8.0, 10.0]);
    assert_eq!(matrix_diagonal(&outer), vec![3.0, 8.0]);
}

#[test]
fn bbox_extent_spans_points() {
    assert!(BBox::from_points(&[]).is_none());
    let bbox = BBox::from_points(&[
        Vec3::new(1.0, -2.0, 0.5),
        Vec3::new(-1.0, 3.0, 0.5),
        Vec3::new(0.0, 0.0, 2.5),
    ])
    .expect("points");
    assert_eq!(bbox.extent(), Vec3::new(2.0, 5.0, 2.0));
    assert_relative_eq!(bbox.max_extent(), 5.0);
}

#[test]
fn tolerance_scales_with_span() {
    assert_relative_eq!(Tolerance::ARC_LENGTH.relative_to(-250.0), 2.5e-4, epsilon = 1e-18);
    assert!(Tolerance::ELLIPSE_ARC.approx_eq_f64(1.0, 1.00005));
    assert!(!Tolerance::ELLIPSE_ARC.approx_eq_f64(1.0, 1.001));
    assert!(Tolerance::ZERO_LENGTH.is_zero_vec3(Vec3::new(1e-14, 0.0, 0.0)));
}
