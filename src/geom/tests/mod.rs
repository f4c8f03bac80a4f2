mod test_curve_location_basic;
mod test_ellipse_basic;
mod test_hermite_basic;
mod test_vector_basic;
