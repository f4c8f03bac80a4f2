mod core;
mod curve_location;
mod curve_sample;
mod curve_smooth;
mod diagnostics;
mod ellipse;
mod hermite;
mod surface_frame;
mod track_surface;

pub use core::{
    BBox, MAX_ITERATIONS, Tolerance, Vec2, Vec3, Vector,
    // Free vector and matrix helpers
    cross, dot, dot_slices, identity_matrix, magnitude, matrix_diagonal, normalize,
    outer_product, set_magnitude,
};
pub use curve_location::{
    CurveAdvance, CurveEnd, CurveLocation, MAX_CURVE_DXI, NearestCurvePoint, WallProjection,
    advance_curve_location, curvatures_along_curve, evaluate_coordinates_on_curve,
    increment_xi_on_line, is_location_on_curve_boundary, nearest_location_on_curve,
    nearest_parameter_location_on_curve, nearest_point_index,
    project_hermite_curves_through_wall, update_curve_location_to_face,
};
pub use curve_sample::{
    SampleCurveOptions, SampledCurve, SmoothSampleOptions,
    interpolate_sample_cubic_hermite, interpolate_sample_linear,
    sample_cubic_element_lengths, sample_cubic_hermite_curves,
    sample_cubic_hermite_curves_smooth, sample_parameter_along_line,
};
pub use curve_smooth::{
    DerivativeScalingMode, SideCrossError, SideCrossFixed, SmoothLineOptions, SmoothLoopOptions,
    compute_cubic_hermite_side_cross_derivatives, double_cubic_hermite_curves_mid_derivative,
    smooth_cubic_hermite_derivatives_line, smooth_cubic_hermite_derivatives_loop,
    smooth_curve_side_cross_derivatives,
};
pub use diagnostics::{IterationResult, SolverDiagnostics};
pub use ellipse::{
    EllipseError, EllipseFrame, EllipsePoints, EllipsoidPoints, ProjectionAxes,
    approximate_ellipse_perimeter, circle_projection_axes, create_ellipsoid_points,
    ellipse_angle_from_vector, ellipse_arc_length, ellipse_point_at_true_angle,
    ellipse_radians_to_x, ellipse_tangent_at_point, ellipsoid_polar_coordinates_from_position,
    ellipsoid_polar_coordinates_tangents, move_coordinates_to_ellipsoid_surface,
    move_derivative_to_ellipsoid_surface, surface_projection_axes,
    update_ellipse_angle_by_arc_length,
};
pub use hermite::{
    ArcDistancePoint, CurvatureSample, GAUSS_WEIGHT_4, GAUSS_XI_4, InterpolationError,
    TrimmedLengths,
    // Basis and interpolation
    cubic_hermite_basis, cubic_hermite_basis_derivatives, cubic_hermite_basis_second_derivatives,
    interpolate_cubic_hermite, interpolate_cubic_hermite_derivative,
    interpolate_cubic_hermite_second_derivative, interpolate_hermite_lagrange,
    interpolate_hermite_lagrange_derivative, interpolate_lagrange_hermite,
    interpolate_lagrange_hermite_derivative,
    // Arc length and curvature
    compute_cubic_hermite_arc_length, compute_cubic_hermite_derivative_scaling,
    cubic_hermite_arc_length, cubic_hermite_arc_length_to_xi, cubic_hermite_curvature,
    cubic_hermite_curvature_simple, cubic_hermite_curves_length,
    cubic_hermite_curves_point_at_arc_distance, cubic_hermite_trimmed_curves_lengths,
};
pub use surface_frame::{
    SquareFace, SquareIncrement, SurfaceAxes, calculate_surface_axes, calculate_surface_delta_xi,
    increment_xi_on_square,
};
pub use track_surface::{
    HermiteCurveMode, HermiteCurvePoints, PositionAdvance, SurfaceBoundary, SurfacePoint,
    TrackSurface, TrackSurfaceError, TrackSurfacePosition, TrackTermination, TrackVectorOptions,
    TrackVectorResult,
};

#[cfg(test)]
mod tests;
