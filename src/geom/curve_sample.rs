//! Resampling Hermite curves into new element spacings.
//!
//! # Operations
//! - **Sample**: `sample_cubic_hermite_curves` spaces output nodes evenly or
//!   with a start/end size ratio, with optional extra length and fractional
//!   sizing on the end elements.
//! - **Smooth sample**: `sample_cubic_hermite_curves_smooth` varies element
//!   size smoothly between given end derivative magnitudes, optionally over
//!   a trimmed part of the curve.
//! - **Partner interpolation**: every sampled node records the source
//!   element, ξ and derivative scale factor so any other per-node field can
//!   be carried onto the new nodes with `interpolate_sample_linear` or
//!   `interpolate_sample_cubic_hermite`.
//!
//! # Example
//!
//! ```ignore
//! use scaffold_geom::geom::{sample_cubic_hermite_curves, SampleCurveOptions, Vec3};
//!
//! let x = vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)];
//! let d1 = vec![Vec3::new(4.0, 0.0, 0.0); 2];
//! let options = SampleCurveOptions::new().with_element_length_ratio(2.0);
//! let (samples, diag) = sample_cubic_hermite_curves(&x, &d1, 4, options)?;
//! ```

use serde::{Deserialize, Serialize};

use super::core::Vector;
use super::curve_location::CurveLocation;
use super::diagnostics::SolverDiagnostics;
use super::hermite::{
    InterpolationError, check_curve, compute_cubic_hermite_arc_length, cubic_hermite_arc_length,
    cubic_hermite_basis, cubic_hermite_curves_point_at_arc_distance,
    cubic_hermite_trimmed_curves_lengths, interpolate_cubic_hermite,
    interpolate_cubic_hermite_derivative, interpolate_hermite_lagrange_derivative,
    interpolate_lagrange_hermite_derivative,
};

// ============================================================================
// Sampled output
// ============================================================================

/// Nodes produced by resampling, with per-node bookkeeping into the source
/// curve.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampledCurve<V> {
    pub x: Vec<V>,
    pub d1: Vec<V>,
    /// Source element containing each output node.
    pub element_indices: Vec<usize>,
    /// ξ of each output node within its source element.
    pub xi: Vec<f64>,
    /// `dξ(old) / dξ(new)` at each output node.
    pub scale_factors: Vec<f64>,
}

impl<V: Vector> SampledCurve<V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            d1: Vec::with_capacity(capacity),
            element_indices: Vec::with_capacity(capacity),
            xi: Vec::with_capacity(capacity),
            scale_factors: Vec::with_capacity(capacity),
        }
    }

    /// Append a node, scaling `d` to `magnitude`.
    fn push_scaled(
        &mut self,
        x: V,
        d: V,
        element: usize,
        xi: f64,
        magnitude: f64,
        diagnostics: &mut SolverDiagnostics,
    ) {
        let mag_d = d.magnitude();
        let sf = if mag_d > 0.0 {
            magnitude / mag_d
        } else {
            diagnostics.add_warning(format!(
                "zero source derivative at element {element} xi {xi}; scale factor set to 0"
            ));
            0.0
        };
        self.x.push(x);
        self.d1.push(d * sf);
        self.element_indices.push(element);
        self.xi.push(xi);
        self.scale_factors.push(sf);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Carry a per-node field of the source curve onto these nodes linearly.
    ///
    /// # Errors
    /// See [`interpolate_sample_linear`].
    pub fn resample_linear<W: Vector>(&self, v: &[W]) -> Result<Vec<W>, InterpolationError> {
        interpolate_sample_linear(v, &self.element_indices, &self.xi)
    }

    /// Carry a per-node field with derivatives onto these nodes.
    ///
    /// # Errors
    /// See [`interpolate_sample_cubic_hermite`].
    pub fn resample_cubic_hermite<W: Vector>(
        &self,
        v: &[W],
        d: &[W],
    ) -> Result<(Vec<W>, Vec<W>), InterpolationError> {
        interpolate_sample_cubic_hermite(v, d, &self.element_indices, &self.xi, &self.scale_factors)
    }
}

// ============================================================================
// Even / ratio sampling
// ============================================================================

/// Options for [`sample_cubic_hermite_curves`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleCurveOptions {
    /// Extra absolute length added to the first element.
    pub add_length_start: f64,
    /// Extra absolute length added to the last element.
    pub add_length_end: f64,
    /// Fraction of the mid element length given to the first element.
    ///
    /// With a fraction of 0.5 and an added length of half a known
    /// derivative, the curve blends into that derivative.
    pub length_fraction_start: f64,
    pub length_fraction_end: f64,
    /// First to last element length ratio, varied linearly in between.
    pub element_length_start_end_ratio: f64,
    /// Rescale each source segment's derivatives to its arc length before
    /// sampling.
    pub arc_length_derivatives: bool,
}

impl SampleCurveOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            add_length_start: 0.0,
            add_length_end: 0.0,
            length_fraction_start: 1.0,
            length_fraction_end: 1.0,
            element_length_start_end_ratio: 1.0,
            arc_length_derivatives: false,
        }
    }

    #[must_use]
    pub const fn with_add_length(mut self, start: f64, end: f64) -> Self {
        self.add_length_start = start;
        self.add_length_end = end;
        self
    }

    #[must_use]
    pub const fn with_length_fraction(mut self, start: f64, end: f64) -> Self {
        self.length_fraction_start = start;
        self.length_fraction_end = end;
        self
    }

    #[must_use]
    pub const fn with_element_length_ratio(mut self, ratio: f64) -> Self {
        self.element_length_start_end_ratio = ratio;
        self
    }

    #[must_use]
    pub const fn arc_length_derivatives(mut self, enabled: bool) -> Self {
        self.arc_length_derivatives = enabled;
        self
    }
}

impl Default for SampleCurveOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Resample a multi-segment curve into `elements_count_out` elements.
///
/// Interior output derivative magnitudes are the mean of the adjacent
/// output element lengths; each end magnitude is `2 × end length −
/// neighbour magnitude`. Without `arc_length_derivatives` each output node
/// is placed by [`cubic_hermite_curves_point_at_arc_distance`] on its source
/// segment.
///
/// # Arguments
/// * `x`, `d1` - Source nodes and derivatives.
/// * `elements_count_out` - Number of output elements.
/// * `options` - End sizing and ratio options.
///
/// # Returns
/// A tuple of the sampled nodes and diagnostics for the inner solves.
///
/// # Errors
/// Returns an error if the curve is malformed or no output elements are
/// requested.
pub fn sample_cubic_hermite_curves<V: Vector>(
    x: &[V],
    d1: &[V],
    elements_count_out: usize,
    options: SampleCurveOptions,
) -> Result<(SampledCurve<V>, SolverDiagnostics), InterpolationError> {
    check_curve(x, d1, 2)?;
    if elements_count_out == 0 {
        return Err(InterpolationError::ZeroElements);
    }
    let mut diagnostics = SolverDiagnostics::new();
    let elements_count_in = x.len() - 1;
    let mut lengths = Vec::with_capacity(x.len());
    lengths.push(0.0);
    let mut arc_d1a = Vec::new();
    let mut arc_d1b = Vec::new();
    let mut length = 0.0;
    for e in 0..elements_count_in {
        let arc_length = if options.arc_length_derivatives {
            let result = compute_cubic_hermite_arc_length(x[e], d1[e], x[e + 1], d1[e + 1], true);
            diagnostics.record("segment arc length", &result);
            let arc_length = result.value;
            arc_d1a.push(d1[e].with_magnitude(arc_length).unwrap_or(V::ZERO));
            arc_d1b.push(d1[e + 1].with_magnitude(arc_length).unwrap_or(V::ZERO));
            arc_length
        } else {
            cubic_hermite_arc_length(x[e], d1[e], x[e + 1], d1[e + 1])
        };
        length += arc_length;
        lengths.push(length);
    }

    let count_out = elements_count_out as f64;
    let ratio = options.element_length_start_end_ratio;
    let proportion_end = 2.0 / (ratio + 1.0);
    let proportion_start = ratio * proportion_end;
    let element_length_mid = if elements_count_out == 1 {
        length
    } else {
        (length - options.add_length_start - options.add_length_end)
            / (count_out - 2.0
                + proportion_start * options.length_fraction_start
                + proportion_end * options.length_fraction_end)
    };
    let mut element_lengths: Vec<f64> = if elements_count_out == 1 || ratio == 1.0 {
        vec![element_length_mid; elements_count_out]
    } else {
        (0..elements_count_out)
            .map(|e_out| {
                let xi = e_out as f64 / (count_out - 1.0);
                ((1.0 - xi) * proportion_start + xi * proportion_end) * element_length_mid
            })
            .collect()
    };
    let mut magnitudes = vec![0.0; elements_count_out + 1];
    for n in 1..elements_count_out {
        magnitudes[n] = 0.5 * (element_lengths[n - 1] + element_lengths[n]);
    }
    element_lengths[0] = options.add_length_start
        + proportion_start * options.length_fraction_start * element_length_mid;
    element_lengths[elements_count_out - 1] = options.add_length_end
        + proportion_end * options.length_fraction_end * element_length_mid;
    if elements_count_out == 1 {
        magnitudes[0] = element_lengths[0];
        magnitudes[1] = element_lengths[0];
    } else {
        magnitudes[0] = 2.0 * element_lengths[0] - magnitudes[1];
        magnitudes[elements_count_out] =
            2.0 * element_lengths[elements_count_out - 1] - magnitudes[elements_count_out - 1];
    }

    let mut samples = SampledCurve::with_capacity(elements_count_out + 1);
    let mut distance = 0.0;
    let mut e = 0;
    for (e_out, element_length) in element_lengths.iter().enumerate() {
        while e < elements_count_in {
            if distance < lengths[e + 1] {
                let part_distance = distance - lengths[e];
                let (px, pd, xi) = if options.arc_length_derivatives {
                    let segment = lengths[e + 1] - lengths[e];
                    let xi = if segment > 0.0 { part_distance / segment } else { 0.0 };
                    (
                        interpolate_cubic_hermite(x[e], arc_d1a[e], x[e + 1], arc_d1b[e], xi),
                        interpolate_cubic_hermite_derivative(x[e], arc_d1a[e], x[e + 1], arc_d1b[e], xi),
                        xi,
                    )
                } else {
                    let result =
                        cubic_hermite_curves_point_at_arc_distance(&x[e..e + 2], &d1[e..e + 2], part_distance)?;
                    diagnostics.record("point at arc distance", &result);
                    (result.value.x, result.value.d, result.value.xi)
                };
                samples.push_scaled(px, pd, e, xi, magnitudes[e_out], &mut diagnostics);
                break;
            }
            e += 1;
        }
        distance += element_length;
    }
    samples.push_scaled(
        x[elements_count_in],
        d1[elements_count_in],
        elements_count_in - 1,
        1.0,
        magnitudes[elements_count_out],
        &mut diagnostics,
    );
    log::debug!(
        "sample_cubic_hermite_curves: {} -> {} elements, {}",
        elements_count_in,
        elements_count_out,
        diagnostics.summary()
    );
    Ok((samples, diagnostics))
}

// ============================================================================
// Smooth sampling
// ============================================================================

/// Options for [`sample_cubic_hermite_curves_smooth`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothSampleOptions {
    /// Start derivative magnitude for the output element count. Zero is valid.
    pub derivative_magnitude_start: Option<f64>,
    pub derivative_magnitude_end: Option<f64>,
    /// Source location at which the output curve starts.
    pub start_location: Option<CurveLocation>,
    /// Source location at which the output curve ends.
    pub end_location: Option<CurveLocation>,
}

impl SmoothSampleOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            derivative_magnitude_start: None,
            derivative_magnitude_end: None,
            start_location: None,
            end_location: None,
        }
    }

    #[must_use]
    pub const fn with_derivative_magnitudes(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.derivative_magnitude_start = start;
        self.derivative_magnitude_end = end;
        self
    }

    #[must_use]
    pub const fn with_start_location(mut self, location: CurveLocation) -> Self {
        self.start_location = Some(location);
        self
    }

    #[must_use]
    pub const fn with_end_location(mut self, location: CurveLocation) -> Self {
        self.end_location = Some(location);
        self
    }
}

/// Resample with element size varying smoothly to fit end derivative
/// magnitudes.
///
/// A missing end magnitude is derived from the other so the sizes still sum
/// to the length; with neither given the spacing is even. Node distances
/// follow a cubic Hermite in the output element index.
///
/// # Errors
/// Returns an error if the curve is malformed, a trim location is out of
/// range or no output elements are requested.
pub fn sample_cubic_hermite_curves_smooth<V: Vector>(
    x: &[V],
    d1: &[V],
    elements_count_out: usize,
    options: SmoothSampleOptions,
) -> Result<(SampledCurve<V>, SolverDiagnostics), InterpolationError> {
    check_curve(x, d1, 2)?;
    if elements_count_out == 0 {
        return Err(InterpolationError::ZeroElements);
    }
    let trimmed = cubic_hermite_trimmed_curves_lengths(x, d1, options.start_location, options.end_location)?;
    let count_out = elements_count_out as f64;
    let length = trimmed.length;
    let (mag_start, mag_end) = match (
        options.derivative_magnitude_start,
        options.derivative_magnitude_end,
    ) {
        (Some(start), Some(end)) => (start, end),
        (None, Some(end)) => ((2.0 * length - count_out * end) / count_out, end),
        (Some(start), None) => (start, (2.0 * length - count_out * start) / count_out),
        (None, None) => (length / count_out, length / count_out),
    };
    let x1 = trimmed.start;
    let dx1 = mag_start * count_out;
    let x2 = trimmed.start + length;
    let dx2 = mag_end * count_out;

    let mut diagnostics = SolverDiagnostics::new();
    let mut samples = SampledCurve::with_capacity(elements_count_out + 1);
    let last_element_in = x.len() - 2;
    let mut e = 0;
    for n in 0..=elements_count_out {
        let xi = n as f64 / count_out;
        let distance = interpolate_cubic_hermite(x1, dx1, x2, dx2, xi);
        let magnitude = interpolate_cubic_hermite_derivative(x1, dx1, x2, dx2, xi) / count_out;
        while e < last_element_in && distance >= trimmed.length_to_node[e + 1] {
            e += 1;
        }
        let result = cubic_hermite_curves_point_at_arc_distance(
            &x[e..e + 2],
            &d1[e..e + 2],
            distance - trimmed.length_to_node[e],
        )?;
        diagnostics.record("point at arc distance", &result);
        let point = result.value;
        samples.push_scaled(point.x, point.d, e, point.xi, magnitude, &mut diagnostics);
    }
    Ok((samples, diagnostics))
}

// ============================================================================
// Partner interpolation
// ============================================================================

fn check_samples<V>(v: &[V], pe: &[usize], pxi: &[f64]) -> Result<(), InterpolationError> {
    if v.len() < 2 {
        return Err(InterpolationError::TooFewNodes {
            required: 2,
            count: v.len(),
        });
    }
    if pxi.len() != pe.len() {
        return Err(InterpolationError::LengthMismatch {
            what: "sample xi",
            expected: pe.len(),
            actual: pxi.len(),
        });
    }
    if let Some(&index) = pe.iter().find(|&&e| e + 1 >= v.len()) {
        return Err(InterpolationError::IndexOutOfRange {
            index: index + 1,
            count: v.len(),
        });
    }
    Ok(())
}

/// Linearly interpolate a per-node field at sampled element/ξ locations.
///
/// # Errors
/// Returns an error if `v` has fewer than 2 values, the sample lists
/// differ in length or an element index is out of range.
pub fn interpolate_sample_linear<V: Vector>(
    v: &[V],
    pe: &[usize],
    pxi: &[f64],
) -> Result<Vec<V>, InterpolationError> {
    check_samples(v, pe, pxi)?;
    Ok(pe
        .iter()
        .zip(pxi)
        .map(|(&e, &xi)| v[e] * (1.0 - xi) + v[e + 1] * xi)
        .collect())
}

/// Cubic Hermite interpolate a per-node field and its derivatives at
/// sampled locations.
///
/// Derivatives are multiplied by the sample scale factors to convert them
/// to the new ξ spacing. Only meaningful for samples taken with
/// arc-length derivatives.
///
/// # Errors
/// As [`interpolate_sample_linear`], plus mismatched `d` or `psf` lengths.
pub fn interpolate_sample_cubic_hermite<V: Vector>(
    v: &[V],
    d: &[V],
    pe: &[usize],
    pxi: &[f64],
    psf: &[f64],
) -> Result<(Vec<V>, Vec<V>), InterpolationError> {
    check_samples(v, pe, pxi)?;
    check_curve(v, d, 2)?;
    if psf.len() != pe.len() {
        return Err(InterpolationError::LengthMismatch {
            what: "sample scale factors",
            expected: pe.len(),
            actual: psf.len(),
        });
    }
    Ok(pe
        .iter()
        .zip(pxi)
        .zip(psf)
        .map(|((&e, &xi), &sf)| {
            (
                interpolate_cubic_hermite(v[e], d[e], v[e + 1], d[e + 1], xi),
                interpolate_cubic_hermite_derivative(v[e], d[e], v[e + 1], d[e + 1], xi) * sf,
            )
        })
        .unzip())
}

// ============================================================================
// Element lengths and parameter profiles
// ============================================================================

/// Lengths of `elements_count` elements varying smoothly over `length` to
/// match optional end derivative magnitudes.
///
/// With one end given the other is `2 × length − given` in total-length
/// units, keeping the sum equal to `length`.
///
/// # Errors
/// Returns an error if `elements_count` is zero.
pub fn sample_cubic_element_lengths(
    length: f64,
    elements_count: usize,
    start_derivative: Option<f64>,
    end_derivative: Option<f64>,
) -> Result<Vec<f64>, InterpolationError> {
    if elements_count == 0 {
        return Err(InterpolationError::ZeroElements);
    }
    let count = elements_count as f64;
    let (d1, d2) = match (
        start_derivative.map(|d| d * count),
        end_derivative.map(|d| d * count),
    ) {
        (Some(d1), Some(d2)) => (d1, d2),
        (Some(d1), None) => (d1, 2.0 * length - d1),
        (None, Some(d2)) => (2.0 * length - d2, d2),
        (None, None) => (length, length),
    };
    let mut last = 0.0;
    Ok((1..=elements_count)
        .map(|n| {
            let f = cubic_hermite_basis(n as f64 / count);
            let x = f[1] * d1 + f[2] * length + f[3] * d2;
            let element_length = x - last;
            last = x;
            element_length
        })
        .collect())
}

/// Resample a scalar profile given at arc-length stations onto
/// `elements_count_out` evenly spaced stations.
///
/// Interior node slopes blend the neighbouring differences weighted by the
/// opposite interval; end slopes come from quadratic extrapolation.
///
/// # Returns
/// Parameter values and their change per output element.
///
/// # Errors
/// Returns an error if the lists differ in length, fewer than 2 stations
/// are given or no output elements are requested.
pub fn sample_parameter_along_line(
    lengths: &[f64],
    params: &[f64],
    elements_count_out: usize,
) -> Result<(Vec<f64>, Vec<f64>), InterpolationError> {
    check_curve(lengths, params, 2)?;
    if elements_count_out == 0 {
        return Err(InterpolationError::ZeroElements);
    }
    let nodes_count = lengths.len();
    let slopes: Vec<f64> = if nodes_count == 2 {
        vec![params[1] - params[0]; 2]
    } else {
        let middle: Vec<f64> = (1..nodes_count - 1)
            .map(|n| {
                let dir_m = params[n] - params[n - 1];
                let dir_p = params[n + 1] - params[n];
                let arc_m = lengths[n] - lengths[n - 1];
                let arc_p = lengths[n + 1] - lengths[n];
                let sum = arc_m + arc_p;
                (arc_p / sum) * dir_m + (arc_m / sum) * dir_p
            })
            .collect();
        let start = interpolate_lagrange_hermite_derivative(params[0], params[1], middle[0], 0.0);
        let end = interpolate_hermite_lagrange_derivative(
            params[nodes_count - 2],
            middle[middle.len() - 1],
            params[nodes_count - 1],
            1.0,
        );
        std::iter::once(start).chain(middle).chain(std::iter::once(end)).collect()
    };

    let mut d_length: Vec<f64> = lengths.windows(2).map(|w| w[1] - w[0]).collect();
    d_length.push(d_length[d_length.len() - 1]);

    let length_per_element = (lengths[nodes_count - 1] - lengths[0]) / elements_count_out as f64;
    let mut sampled = Vec::with_capacity(elements_count_out + 1);
    let mut sampled_d = Vec::with_capacity(elements_count_out + 1);
    let mut distance = lengths[0];
    let mut e = 0;
    for _ in 0..elements_count_out {
        while e < nodes_count - 1 {
            if distance < lengths[e + 1] {
                let xi = (distance - lengths[e]) / (lengths[e + 1] - lengths[e]);
                let p = interpolate_cubic_hermite(params[e], slopes[e], params[e + 1], slopes[e + 1], xi);
                let dp_dxi =
                    interpolate_cubic_hermite_derivative(params[e], slopes[e], params[e + 1], slopes[e + 1], xi);
                let dx_dxi = interpolate_cubic_hermite_derivative(
                    lengths[e],
                    d_length[e],
                    lengths[e + 1],
                    d_length[e + 1],
                    xi,
                );
                sampled.push(p);
                sampled_d.push(if dx_dxi == 0.0 {
                    0.0
                } else {
                    dp_dxi / dx_dxi * length_per_element
                });
                break;
            }
            e += 1;
        }
        distance += length_per_element;
    }
    sampled.push(params[nodes_count - 1]);
    let last_d_length = d_length[nodes_count - 1];
    sampled_d.push(if last_d_length == 0.0 {
        0.0
    } else {
        slopes[nodes_count - 1] / last_d_length * length_per_element
    });
    Ok((sampled, sampled_d))
}
