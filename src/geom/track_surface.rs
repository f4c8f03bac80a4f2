//! Track surfaces: bicubic Hermite lattices for locating surface features.
//!
//! A [`TrackSurface`] is a lattice of `elements_count1 × elements_count2`
//! square elements, nodes varying fastest in direction 1. Each node carries
//! a position, derivatives in both parametric directions and an optional
//! cross derivative (zero when absent). Direction 1 may loop back to its
//! start; a looped surface supplies one fewer node per row and accepts
//! proportions up to 2 so paths can cross the seam without a jump.
//!
//! # Operations
//! - **Addressing**: [`TrackSurface::create_position_proportion`] and
//!   [`TrackSurface::proportion`] convert between global proportions and
//!   element/ξ positions.
//! - **Evaluation**: coordinates and ξ derivatives at a position.
//! - **Nearest point**: curvature-corrected Newton search that slides along
//!   edges when the target lies outside the surface.
//! - **Tracking**: follow a 3-D direction over the surface for a distance,
//!   stopping at the boundary.
//! - **Embedded curves**: Hermite curves between two surface points with
//!   in-surface lateral derivatives and unit normals.
//!
//! # Example
//!
//! ```ignore
//! use scaffold_geom::geom::{TrackSurface, TrackVectorOptions, Vec3};
//!
//! let surface = TrackSurface::new(2, 2, nx, nd1, nd2, None, false)?;
//! let start = surface.create_position_proportion(0.5, 0.5)?;
//! let result = surface.track_vector(start, Vec3::X, 0.5, TrackVectorOptions::default());
//! println!("stopped at {} after {}", result.position, result.distance);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::core::{BBox, MAX_ITERATIONS, Tolerance, Vec2, Vec3, Vector};
use super::curve_sample::{
    SampleCurveOptions, SmoothSampleOptions, sample_cubic_hermite_curves,
    sample_cubic_hermite_curves_smooth,
};
use super::diagnostics::{IterationResult, SolverDiagnostics};
use super::hermite::{
    CurvatureSample, InterpolationError, cubic_hermite_arc_length, cubic_hermite_basis,
    cubic_hermite_basis_derivatives, cubic_hermite_curvature_simple,
    interpolate_hermite_lagrange_derivative, interpolate_lagrange_hermite_derivative,
};
use super::surface_frame::{
    SquareFace, calculate_surface_axes, calculate_surface_delta_xi, increment_xi_on_square,
};

/// Largest ξ step taken per nearest-point iteration.
const MAX_NEAREST_DXI: f64 = 0.5;

/// Cap on the curvature correction of a nearest-point step.
const MAX_CURVATURE_FACTOR: f64 = 100.0;

/// Iterations for which large-angle arc corrections are used.
const ARC_CORRECTION_ITERATIONS: usize = 10;

/// Angle above which the arc correction replaces the radial one.
const ARC_CORRECTION_ANGLE: f64 = 0.1;

/// ξ offset for finite-difference directional curvature.
const CURVATURE_DELTA_XI: f64 = 1.0e-5;

/// Fraction of the requested distance accepted as reaching it.
const TRACK_DISTANCE_FRACTION: f64 = 0.9999;

// ============================================================================
// Positions and errors
// ============================================================================

/// Element indices and local ξ coordinates on a [`TrackSurface`].
///
/// `e1 < elements_count1` (or `< 2 × elements_count1` on a surface looped
/// in direction 1), `e2 < elements_count2`, and both ξ lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSurfacePosition {
    pub e1: usize,
    pub e2: usize,
    pub xi1: f64,
    pub xi2: f64,
}

impl TrackSurfacePosition {
    #[must_use]
    pub const fn new(e1: usize, e2: usize, xi1: f64, xi2: f64) -> Self {
        Self { e1, e2, xi1, xi2 }
    }

    /// Shift ξ without changing element. The result may leave [0, 1].
    pub fn offset_xi(&mut self, dxi1: f64, dxi2: f64) {
        self.xi1 += dxi1;
        self.xi2 += dxi2;
    }

    #[must_use]
    pub const fn xi(&self) -> Vec2 {
        Vec2::new(self.xi1, self.xi2)
    }
}

impl fmt::Display for TrackSurfacePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element ({},{}) xi ({},{})", self.e1, self.e2, self.xi1, self.xi2)
    }
}

/// Surface edge a position lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceBoundary {
    /// On a ξ1 edge: proportion 1 at 0 or 1.
    Xi1,
    /// On a ξ2 edge: proportion 2 at 0 or 1.
    Xi2,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackSurfaceError {
    #[error("track surface needs at least one element each way, got {elements_count1} x {elements_count2}")]
    EmptyLattice {
        elements_count1: usize,
        elements_count2: usize,
    },

    #[error("{what} has {actual} entries, expected {expected}")]
    LatticeSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("proportion {direction} is {value}, outside [0, {max}]")]
    ProportionOutOfRange { direction: u8, value: f64, max: f64 },

    #[error("at least one element is required")]
    ZeroElements,

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
}

/// Coordinates and ξ derivatives at a surface position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoint {
    pub x: Vec3,
    pub d1: Vec3,
    pub d2: Vec3,
}

/// Result of [`TrackSurface::advance_position`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAdvance {
    pub position: TrackSurfacePosition,
    pub boundary: Option<SurfaceBoundary>,
    /// ξ increment actually applied after limiting and clamping.
    pub dxi: Vec2,
}

// ============================================================================
// Curve and tracking options
// ============================================================================

/// Element size policy for [`TrackSurface::create_hermite_curve_points`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HermiteCurveMode {
    /// Smooth variation of element size between the end derivatives.
    #[default]
    Smooth,
    /// Transition from the start derivative, then even size.
    TransitionStart,
    /// Even size, then transition to the end derivative.
    TransitionEnd,
    /// Transition at both ends with even size between.
    TransitionStartAndEnd,
    /// Even size regardless of the end derivatives.
    UniformSize,
}

impl HermiteCurveMode {
    const fn transitions_start(self) -> bool {
        matches!(self, Self::TransitionStart | Self::TransitionStartAndEnd)
    }

    const fn transitions_end(self) -> bool {
        matches!(self, Self::TransitionEnd | Self::TransitionStartAndEnd)
    }
}

/// A Hermite curve embedded in a track surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HermiteCurvePoints {
    pub x: Vec<Vec3>,
    /// Along the curve.
    pub d1: Vec<Vec3>,
    /// In the surface, normal to `d1`, with similar magnitude.
    pub d2: Vec<Vec3>,
    /// Unit surface normal, zero where the surface is degenerate.
    pub d3: Vec<Vec3>,
    /// Surface proportions of each point.
    pub proportions: Vec<Vec2>,
}

impl HermiteCurvePoints {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            d1: Vec::with_capacity(capacity),
            d2: Vec::with_capacity(capacity),
            d3: Vec::with_capacity(capacity),
            proportions: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Step control for [`TrackSurface::track_vector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackVectorOptions {
    /// ξ magnitude of each step.
    pub max_dxi: f64,
    /// Steps allowed before giving up.
    pub max_steps: usize,
}

impl TrackVectorOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_dxi: 0.02,
            max_steps: 10_000,
        }
    }

    #[must_use]
    pub const fn with_max_dxi(mut self, max_dxi: f64) -> Self {
        self.max_dxi = max_dxi;
        self
    }

    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

impl Default for TrackVectorOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Why [`TrackSurface::track_vector`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackTermination {
    ReachedDistance,
    /// Hit the edge of the surface first.
    ReachedBoundary,
    /// The direction has no component in the surface.
    Stalled,
    StepLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackVectorResult {
    pub position: TrackSurfacePosition,
    /// Arc length tracked, never negative.
    pub distance: f64,
    pub termination: TrackTermination,
}

// ============================================================================
// TrackSurface
// ============================================================================

/// Bicubic Hermite lattice surface. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSurface {
    elements_count1: usize,
    elements_count2: usize,
    nx: Vec<Vec3>,
    nd1: Vec<Vec3>,
    nd2: Vec<Vec3>,
    nd12: Option<Vec<Vec3>>,
    loop1: bool,
    x_range: Vec3,
}

impl TrackSurface {
    /// Build a surface from `(elements_count2 + 1)` rows of nodes, each row
    /// holding `elements_count1 + 1` nodes, or `elements_count1` when
    /// `loop1`.
    ///
    /// # Errors
    /// Returns an error if either count is zero or a node list has the
    /// wrong length.
    pub fn new(
        elements_count1: usize,
        elements_count2: usize,
        nx: Vec<Vec3>,
        nd1: Vec<Vec3>,
        nd2: Vec<Vec3>,
        nd12: Option<Vec<Vec3>>,
        loop1: bool,
    ) -> Result<Self, TrackSurfaceError> {
        if elements_count1 == 0 || elements_count2 == 0 {
            return Err(TrackSurfaceError::EmptyLattice {
                elements_count1,
                elements_count2,
            });
        }
        let nodes_count1 = if loop1 { elements_count1 } else { elements_count1 + 1 };
        let expected = nodes_count1 * (elements_count2 + 1);
        let check = |what: &'static str, actual: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(TrackSurfaceError::LatticeSize {
                    what,
                    expected,
                    actual,
                })
            }
        };
        check("coordinates", nx.len())?;
        check("derivatives 1", nd1.len())?;
        check("derivatives 2", nd2.len())?;
        if let Some(nd12) = &nd12 {
            check("cross derivatives", nd12.len())?;
        }
        let x_range = BBox::from_points(&nx).map_or(Vec3::ZERO, BBox::extent);
        Ok(Self {
            elements_count1,
            elements_count2,
            nx,
            nd1,
            nd2,
            nd12,
            loop1,
            x_range,
        })
    }

    #[must_use]
    pub const fn elements_count1(&self) -> usize {
        self.elements_count1
    }

    #[must_use]
    pub const fn elements_count2(&self) -> usize {
        self.elements_count2
    }

    #[must_use]
    pub const fn is_loop1(&self) -> bool {
        self.loop1
    }

    const fn nodes_count1(&self) -> usize {
        if self.loop1 {
            self.elements_count1
        } else {
            self.elements_count1 + 1
        }
    }

    const fn max_proportion1(&self) -> f64 {
        if self.loop1 { 2.0 } else { 1.0 }
    }

    /// Mirror in x and rewind direction 1 so the mirrored surface keeps
    /// its outward orientation.
    #[must_use]
    pub fn create_mirror_x(&self) -> Self {
        let nodes_count1 = self.nodes_count1();
        let count = self.nx.len();
        let mut nx = Vec::with_capacity(count);
        let mut nd1 = Vec::with_capacity(count);
        let mut nd2 = Vec::with_capacity(count);
        let mut nd12 = self.nd12.as_ref().map(|_| Vec::with_capacity(count));
        for n2 in 0..=self.elements_count2 {
            for n1 in 0..nodes_count1 {
                let oi = n2 * nodes_count1 + (self.elements_count1 + nodes_count1 - n1) % nodes_count1;
                let (x, d1, d2) = (self.nx[oi], self.nd1[oi], self.nd2[oi]);
                nx.push(Vec3::new(-x.x, x.y, x.z));
                nd1.push(Vec3::new(d1.x, -d1.y, -d1.z));
                nd2.push(Vec3::new(-d2.x, d2.y, d2.z));
                if let (Some(out), Some(source)) = (nd12.as_mut(), self.nd12.as_ref()) {
                    let d12 = source[oi];
                    out.push(Vec3::new(d12.x, -d12.y, -d12.z));
                }
            }
        }
        Self {
            nx,
            nd1,
            nd2,
            nd12,
            x_range: self.x_range,
            ..*self
        }
    }

    // ------------------------------------------------------------------------
    // Addressing
    // ------------------------------------------------------------------------

    /// Position at proportions across directions 1 and 2.
    ///
    /// Proportions run from 0 to 1, or to 2 in direction 1 of a looped
    /// surface. A proportion at the far end lands on ξ = 1 of the last
    /// element.
    ///
    /// # Errors
    /// Returns [`TrackSurfaceError::ProportionOutOfRange`] if either
    /// proportion is outside its range.
    pub fn create_position_proportion(
        &self,
        proportion1: f64,
        proportion2: f64,
    ) -> Result<TrackSurfacePosition, TrackSurfaceError> {
        let max1 = self.max_proportion1();
        if !(0.0..=max1).contains(&proportion1) {
            return Err(TrackSurfaceError::ProportionOutOfRange {
                direction: 1,
                value: proportion1,
                max: max1,
            });
        }
        if !(0.0..=1.0).contains(&proportion2) {
            return Err(TrackSurfaceError::ProportionOutOfRange {
                direction: 2,
                value: proportion2,
                max: 1.0,
            });
        }
        Ok(self.position_at_proportion(proportion1, proportion2))
    }

    /// Position at proportions clamped into range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn position_at_proportion(&self, proportion1: f64, proportion2: f64) -> TrackSurfacePosition {
        fn split(proportion: f64, elements_count: usize, max_element: usize) -> (usize, f64) {
            let pe = proportion * elements_count as f64;
            if pe < max_element as f64 {
                let e = pe.floor() as usize;
                (e, pe - e as f64)
            } else {
                (max_element - 1, 1.0)
            }
        }
        let max_e1 = if self.loop1 {
            2 * self.elements_count1
        } else {
            self.elements_count1
        };
        let (e1, xi1) = split(
            proportion1.clamp(0.0, self.max_proportion1()),
            self.elements_count1,
            max_e1,
        );
        let (e2, xi2) = split(proportion2.clamp(0.0, 1.0), self.elements_count2, self.elements_count2);
        TrackSurfacePosition::new(e1, e2, xi1, xi2)
    }

    /// Proportions `(p1, p2)` of a position.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn proportion(&self, position: &TrackSurfacePosition) -> Vec2 {
        Vec2::new(
            (position.e1 as f64 + position.xi1) / self.elements_count1 as f64,
            (position.e2 as f64 + position.xi2) / self.elements_count2 as f64,
        )
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Lattice nodes of an element, ordered (ξ1, ξ2) = (0,0), (1,0), (0,1),
    /// (1,1). Element indices beyond the lattice are wrapped or clamped.
    fn element_nodes(&self, e1: usize, e2: usize) -> [usize; 4] {
        let nodes_count1 = self.nodes_count1();
        let e1 = if self.loop1 {
            e1 % self.elements_count1
        } else {
            e1.min(self.elements_count1 - 1)
        };
        let row = e2.min(self.elements_count2 - 1) * nodes_count1;
        let n1 = row + e1;
        let n2 = if self.loop1 && e1 + 1 == self.elements_count1 {
            row
        } else {
            n1 + 1
        };
        [n1, n2, n1 + nodes_count1, n2 + nodes_count1]
    }

    /// Tensor-product blend of the node parameters with basis `g1` in ξ1
    /// and `g2` in ξ2.
    fn blend(&self, nodes: [usize; 4], g1: [f64; 4], g2: [f64; 4]) -> Vec3 {
        let mut sum = Vec3::ZERO;
        for (ln, &n) in nodes.iter().enumerate() {
            let (i1, i2) = (2 * (ln % 2), 2 * (ln / 2));
            let (v1, t1) = (g1[i1], g1[i1 + 1]);
            let (v2, t2) = (g2[i2], g2[i2 + 1]);
            sum = sum + self.nx[n] * (v1 * v2) + self.nd1[n] * (t1 * v2) + self.nd2[n] * (v1 * t2);
            if let Some(nd12) = &self.nd12 {
                sum = sum + nd12[n] * (t1 * t2);
            }
        }
        sum
    }

    /// Coordinates at a position. ξ outside [0, 1] extrapolates the
    /// element.
    #[must_use]
    pub fn evaluate_coordinates(&self, position: &TrackSurfacePosition) -> Vec3 {
        let nodes = self.element_nodes(position.e1, position.e2);
        self.blend(
            nodes,
            cubic_hermite_basis(position.xi1),
            cubic_hermite_basis(position.xi2),
        )
    }

    /// Coordinates and derivatives with respect to ξ1 and ξ2.
    #[must_use]
    pub fn evaluate_with_derivatives(&self, position: &TrackSurfacePosition) -> SurfacePoint {
        let nodes = self.element_nodes(position.e1, position.e2);
        let f1 = cubic_hermite_basis(position.xi1);
        let f2 = cubic_hermite_basis(position.xi2);
        let df1 = cubic_hermite_basis_derivatives(position.xi1);
        let df2 = cubic_hermite_basis_derivatives(position.xi2);
        SurfacePoint {
            x: self.blend(nodes, f1, f2),
            d1: self.blend(nodes, df1, f2),
            d2: self.blend(nodes, f1, df2),
        }
    }

    // ------------------------------------------------------------------------
    // Embedded curves
    // ------------------------------------------------------------------------

    /// Derivative of proportion matching a 3-D `derivative` at proportion
    /// `p`.
    #[allow(clippy::cast_precision_loss)]
    fn proportion_derivative(&self, p: Vec2, derivative: Vec3) -> Result<Vec2, TrackSurfaceError> {
        let position = self.create_position_proportion(p.x, p.y)?;
        let point = self.evaluate_with_derivatives(&position);
        let delta = calculate_surface_delta_xi(point.d1, point.d2, derivative);
        Ok(Vec2::new(
            delta.x / self.elements_count1 as f64,
            delta.y / self.elements_count2 as f64,
        ))
    }

    /// Surface coordinates, curve derivative, lateral derivative and unit
    /// normal at one curve sample.
    #[allow(clippy::cast_precision_loss)]
    fn curve_sample(&self, proportion: Vec2, dproportion: Vec2) -> (Vec3, Vec3, Vec3, Vec3, Vec2) {
        let position = self.position_at_proportion(proportion.x, proportion.y);
        let point = self.evaluate_with_derivatives(&position);
        let f1 = dproportion.x * self.elements_count1 as f64;
        let f2 = dproportion.y * self.elements_count2 as f64;
        let d1 = point.d1 * f1 + point.d2 * f2;
        let normal = point.d1.cross(point.d2);
        let d3 = normal.normalized().unwrap_or(normal);
        (point.x, d1, d3.cross(d1), d3, self.proportion(&position))
    }

    #[cfg(feature = "parallel")]
    fn curve_samples(&self, proportions: &[Vec2], dproportions: &[Vec2]) -> Vec<(Vec3, Vec3, Vec3, Vec3, Vec2)> {
        proportions
            .par_iter()
            .zip(dproportions.par_iter())
            .map(|(&p, &dp)| self.curve_sample(p, dp))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn curve_samples(&self, proportions: &[Vec2], dproportions: &[Vec2]) -> Vec<(Vec3, Vec3, Vec3, Vec3, Vec2)> {
        proportions
            .iter()
            .zip(dproportions)
            .map(|(&p, &dp)| self.curve_sample(p, dp))
            .collect()
    }

    /// Hermite curve over the surface from proportions `a` to `b`.
    ///
    /// Optional 3-D derivatives are matched at either end; a missing end
    /// derivative follows the other or, with neither, the straight line in
    /// proportion space. Sample proportions that stray outside the surface
    /// are clamped onto it.
    ///
    /// # Arguments
    /// * `a`, `b` - Start and end proportions.
    /// * `elements_count` - Number of curve elements.
    /// * `derivative_start`, `derivative_end` - Optional end derivatives.
    /// * `mode` - Element size policy.
    ///
    /// # Returns
    /// The curve points and diagnostics for the sampling solves.
    ///
    /// # Errors
    /// Returns an error if an end proportion is out of range or
    /// `elements_count` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn create_hermite_curve_points(
        &self,
        a: Vec2,
        b: Vec2,
        elements_count: usize,
        derivative_start: Option<Vec3>,
        derivative_end: Option<Vec3>,
        mode: HermiteCurveMode,
    ) -> Result<(HermiteCurvePoints, SolverDiagnostics), TrackSurfaceError> {
        if elements_count == 0 {
            return Err(TrackSurfaceError::ZeroElements);
        }
        self.create_position_proportion(a.x, a.y)?;
        self.create_position_proportion(b.x, b.y)?;
        let count = elements_count as f64;
        let given_start = derivative_start
            .map(|d| self.proportion_derivative(a, d))
            .transpose()?;
        let given_end = derivative_end
            .map(|d| self.proportion_derivative(b, d))
            .transpose()?;
        let (dp_start, magnitude_start) = match (given_start, given_end) {
            (Some(dp), _) => (dp * count, dp.magnitude()),
            (None, Some(dp_end)) => {
                let dp = interpolate_lagrange_hermite_derivative(a, b, dp_end * count, 0.0);
                (dp, dp.magnitude() / count)
            }
            (None, None) => (b - a, (b - a).magnitude() / count),
        };
        let (dp_end, magnitude_end) = match given_end {
            Some(dp) => (dp * count, dp.magnitude()),
            None if given_start.is_some() => {
                let dp = interpolate_hermite_lagrange_derivative(a, dp_start, b, 1.0);
                (dp, dp.magnitude() / count)
            }
            None => (b - a, (b - a).magnitude() / count),
        };

        let (mut sampled, mut diagnostics) = sample_cubic_hermite_curves_smooth(
            &[a, b],
            &[dp_start, dp_end],
            elements_count,
            SmoothSampleOptions::new().with_derivative_magnitudes(Some(magnitude_start), Some(magnitude_end)),
        )?;
        if mode != HermiteCurveMode::Smooth {
            let (add_start, fraction_start) = if given_start.is_some() && mode.transitions_start() {
                (0.5 * magnitude_start, 0.5)
            } else {
                (0.0, 1.0)
            };
            let (add_end, fraction_end) = if given_end.is_some() && mode.transitions_end() {
                (0.5 * magnitude_end, 0.5)
            } else {
                (0.0, 1.0)
            };
            let (resampled, resample_diagnostics) = sample_cubic_hermite_curves(
                &sampled.x,
                &sampled.d1,
                elements_count,
                SampleCurveOptions::new()
                    .with_add_length(add_start, add_end)
                    .with_length_fraction(fraction_start, fraction_end),
            )?;
            diagnostics.merge(&resample_diagnostics);
            sampled = resampled;
        }

        let mut points = HermiteCurvePoints::with_capacity(elements_count + 1);
        for (x, d1, d2, d3, proportion) in self.curve_samples(&sampled.x, &sampled.d1) {
            points.x.push(x);
            points.d1.push(d1);
            points.d2.push(d2);
            points.d3.push(d3);
            points.proportions.push(proportion);
        }
        log::debug!(
            "create_hermite_curve_points: {} elements {:?}, {}",
            elements_count,
            mode,
            diagnostics.summary()
        );
        Ok((points, diagnostics))
    }

    /// Resample a curve from [`Self::create_hermite_curve_points`] with
    /// smoothly varying element size.
    ///
    /// Interior points are relocated to their nearest surface positions to
    /// update proportions, lateral derivatives and normals. End lateral
    /// derivatives are rescaled to the new end derivatives.
    ///
    /// # Errors
    /// Returns an error if the curve has fewer than 2 points or its lists
    /// differ in length.
    pub fn resample_hermite_curve_points_smooth(
        &self,
        curve: &HermiteCurvePoints,
        derivative_magnitude_start: Option<f64>,
        derivative_magnitude_end: Option<f64>,
    ) -> Result<(HermiteCurvePoints, SolverDiagnostics), TrackSurfaceError> {
        let count = curve.x.len();
        for (what, actual) in [
            ("curve d2", curve.d2.len()),
            ("curve d3", curve.d3.len()),
            ("curve proportions", curve.proportions.len()),
        ] {
            if actual != count {
                return Err(InterpolationError::LengthMismatch {
                    what,
                    expected: count,
                    actual,
                }
                .into());
            }
        }
        let elements_count = count.saturating_sub(1);
        let (sampled, mut diagnostics) = sample_cubic_hermite_curves_smooth(
            &curve.x,
            &curve.d1,
            elements_count,
            SmoothSampleOptions::new()
                .with_derivative_magnitudes(derivative_magnitude_start, derivative_magnitude_end),
        )?;
        let mut points = HermiteCurvePoints {
            x: sampled.x,
            d1: sampled.d1,
            d2: curve.d2.clone(),
            d3: curve.d3.clone(),
            proportions: curve.proportions.clone(),
        };
        for n in [0, elements_count] {
            if let Some(d2) = points.d2[n].with_magnitude(points.d1[n].magnitude()) {
                points.d2[n] = d2;
            }
        }
        for n in 1..elements_count {
            let start = self.position_at_proportion(points.proportions[n].x, points.proportions[n].y);
            let nearest = self.find_nearest_position(points.x[n], Some(start));
            diagnostics.record("nearest surface position", &nearest);
            let position = nearest.value;
            points.proportions[n] = self.proportion(&position);
            let surface = self.evaluate_with_derivatives(&position);
            let d1 = points.d1[n];
            let axes = calculate_surface_axes(surface.d1, surface.d2, d1.normalized().unwrap_or(d1));
            points.d2[n] = axes.ax2 * d1.magnitude();
            points.d3[n] = axes.ax3;
        }
        Ok((points, diagnostics))
    }

    // ------------------------------------------------------------------------
    // Boundaries
    // ------------------------------------------------------------------------

    /// Edge the position lies on within [`Tolerance::BOUNDARY_PROPORTION`],
    /// snapping its ξ exactly onto that edge. Direction 1 of a looped
    /// surface has no edge.
    pub fn position_on_boundary(&self, position: &mut TrackSurfacePosition) -> Option<SurfaceBoundary> {
        let lower = Tolerance::BOUNDARY_PROPORTION.eps;
        let upper = 1.0 - lower;
        let proportion = self.proportion(position);
        if !self.loop1 {
            if proportion.x < lower {
                position.xi1 = 0.0;
                return Some(SurfaceBoundary::Xi1);
            }
            if proportion.x > upper {
                position.xi1 = 1.0;
                return Some(SurfaceBoundary::Xi1);
            }
        }
        if proportion.y < lower {
            position.xi2 = 0.0;
            return Some(SurfaceBoundary::Xi2);
        }
        if proportion.y > upper {
            position.xi2 = 1.0;
            return Some(SurfaceBoundary::Xi2);
        }
        None
    }

    /// Outward ξ direction at an edge within
    /// [`Tolerance::BOUNDARY_DIRECTION`], e.g. `(-1, 0)` on ξ1 = 0.
    #[must_use]
    pub fn boundary_direction(&self, position: &TrackSurfacePosition) -> Option<Vec2> {
        let lower = Tolerance::BOUNDARY_DIRECTION.eps;
        let upper = 1.0 - lower;
        let proportion = self.proportion(position);
        if !self.loop1 {
            if proportion.x < lower {
                return Some(Vec2::new(-1.0, 0.0));
            }
            if proportion.x > upper {
                return Some(Vec2::new(1.0, 0.0));
            }
        }
        if proportion.y < lower {
            Some(Vec2::new(0.0, -1.0))
        } else if proportion.y > upper {
            Some(Vec2::new(0.0, 1.0))
        } else {
            None
        }
    }

    /// Move by `dxi` element ξ, limited to `max_magnitude` and clamped at
    /// the surface edge. Direction 1 of a looped surface wraps.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn advance_position(&self, start: &TrackSurfacePosition, dxi: Vec2, max_magnitude: f64) -> PositionAdvance {
        let count1 = self.elements_count1 as f64;
        let count2 = self.elements_count2 as f64;
        let start_proportion = self.proportion(start);
        let magnitude = dxi.magnitude();
        let mut adxi = if magnitude > max_magnitude {
            dxi * (max_magnitude / magnitude)
        } else {
            dxi
        };
        let mut p1 = start_proportion.x + adxi.x / count1;
        let mut p2 = start_proportion.y + adxi.y / count2;
        let mut boundary = None;
        if self.loop1 {
            if p1 < 0.0 {
                p1 += 2.0;
            } else if p1 > 2.0 {
                p1 -= 2.0;
            }
        } else if !(0.0..=1.0).contains(&p1) {
            p1 = p1.clamp(0.0, 1.0);
            boundary = Some(SurfaceBoundary::Xi1);
        }
        if !(0.0..=1.0).contains(&p2) {
            p2 = p2.clamp(0.0, 1.0);
            boundary = Some(SurfaceBoundary::Xi2);
        }
        if boundary.is_some() {
            if !self.loop1 {
                adxi.x = (p1 - start_proportion.x) * count1;
            }
            adxi.y = (p2 - start_proportion.y) * count2;
        }
        PositionAdvance {
            position: self.position_at_proportion(p1, p2),
            boundary,
            dxi: adxi,
        }
    }

    /// Curvature of the surface along ξ direction `direction`, with the
    /// tangent and its derivative per unit ξ.
    #[must_use]
    pub fn directional_curvature(&self, position: &TrackSurfacePosition, direction: Vec2) -> CurvatureSample {
        let Some(unit) = direction.normalized() else {
            return CurvatureSample {
                curvature: 0.0,
                tangent: Vec3::ZERO,
                d_tangent: Vec3::ZERO,
            };
        };
        let dxi = unit * CURVATURE_DELTA_XI;
        let mut probe = *position;
        probe.offset_xi(-0.5 * dxi.x, -0.5 * dxi.y);
        let a = self.evaluate_with_derivatives(&probe);
        probe.offset_xi(dxi.x, dxi.y);
        let b = self.evaluate_with_derivatives(&probe);
        let sample = cubic_hermite_curvature_simple(
            a.x,
            a.d1 * dxi.x + a.d2 * dxi.y,
            b.x,
            b.d1 * dxi.x + b.d2 * dxi.y,
            0.5,
        );
        CurvatureSample {
            curvature: sample.curvature,
            tangent: sample.tangent * (1.0 / CURVATURE_DELTA_XI),
            d_tangent: sample.d_tangent * (1.0 / (CURVATURE_DELTA_XI * CURVATURE_DELTA_XI)),
        }
    }

    /// Cross `face` of the position's element: step into the neighbour, wrap
    /// around a loop, or clamp onto the surface edge and report it.
    pub fn update_position_to_face(
        &self,
        position: &mut TrackSurfacePosition,
        face: SquareFace,
    ) -> Option<SurfaceBoundary> {
        if self.loop1 {
            position.e1 %= self.elements_count1;
        }
        match face {
            SquareFace::Xi1Min => {
                if position.e1 > 0 {
                    position.e1 -= 1;
                    position.xi1 = 1.0;
                } else if self.loop1 {
                    position.e1 = self.elements_count1 - 1;
                    position.xi1 = 1.0;
                } else {
                    position.xi1 = 0.0;
                    return Some(SurfaceBoundary::Xi1);
                }
            }
            SquareFace::Xi1Max => {
                if position.e1 + 1 < self.elements_count1 {
                    position.e1 += 1;
                    position.xi1 = 0.0;
                } else if self.loop1 {
                    position.e1 = 0;
                    position.xi1 = 0.0;
                } else {
                    position.xi1 = 1.0;
                    return Some(SurfaceBoundary::Xi1);
                }
            }
            SquareFace::Xi2Min => {
                if position.e2 > 0 {
                    position.e2 -= 1;
                    position.xi2 = 1.0;
                } else {
                    position.xi2 = 0.0;
                    return Some(SurfaceBoundary::Xi2);
                }
            }
            SquareFace::Xi2Max => {
                if position.e2 + 1 < self.elements_count2 {
                    position.e2 += 1;
                    position.xi2 = 0.0;
                } else {
                    position.xi2 = 1.0;
                    return Some(SurfaceBoundary::Xi2);
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Nearest position
    // ------------------------------------------------------------------------

    /// Lattice node nearest `target`, with its distance.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn find_nearest_position_parameter(&self, target: Vec3) -> (TrackSurfacePosition, f64) {
        let nodes_count1 = self.nodes_count1();
        let (index, distance) = self
            .nx
            .iter()
            .map(|&x| (x - target).length())
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best });
        let n1 = index % nodes_count1;
        let n2 = index / nodes_count1;
        let position = self.position_at_proportion(
            n1 as f64 / self.elements_count1 as f64,
            n2 as f64 / self.elements_count2 as f64,
        );
        (position, distance)
    }

    /// Element centre nearest `target`, with its distance.
    #[must_use]
    pub fn find_nearest_position_sample(&self, target: Vec3) -> (TrackSurfacePosition, f64) {
        let mut nearest = (TrackSurfacePosition::new(0, 0, 0.5, 0.5), f64::INFINITY);
        for e2 in 0..self.elements_count2 {
            for e1 in 0..self.elements_count1 {
                let position = TrackSurfacePosition::new(e1, e2, 0.5, 0.5);
                let distance = (self.evaluate_coordinates(&position) - target).length();
                if distance < nearest.1 {
                    nearest = (position, distance);
                }
            }
        }
        nearest
    }

    /// Position on the surface nearest `target`.
    ///
    /// Newton iteration from `start` (default the middle of the surface)
    /// with the ξ step corrected for the surface curvature along it. On an
    /// edge with the target outside, the step slides along the edge. Works
    /// for simply shaped surfaces; pass a close `start` otherwise.
    #[must_use]
    pub fn find_nearest_position(
        &self,
        target: Vec3,
        start: Option<TrackSurfacePosition>,
    ) -> IterationResult<TrackSurfacePosition> {
        let mut position = start.unwrap_or_else(|| self.position_at_proportion(0.5, 0.5));
        let min_curvature = 0.1 / self.x_range.max_abs_component();
        let mut step = 0.0;
        for iteration in 1..=MAX_ITERATIONS {
            let surface = self.evaluate_with_derivatives(&position);
            let boundary = self.position_on_boundary(&mut position);
            let r = target - surface.x;
            let mut dxi = calculate_surface_delta_xi(surface.d1, surface.d2, r);
            if let (Some(boundary), Some(outward_xi)) = (boundary, self.boundary_direction(&position)) {
                let outward = surface.d1 * outward_xi.x + surface.d2 * outward_xi.y;
                if outward.normalized().is_some_and(|outward| r.dot(outward) > 0.0) {
                    dxi = match boundary {
                        SurfaceBoundary::Xi1 => Vec2::new(0.0, projection_scale(surface.d2, r)),
                        SurfaceBoundary::Xi2 => Vec2::new(projection_scale(surface.d1, r), 0.0),
                    };
                }
            }
            if dxi.magnitude() == 0.0 {
                return IterationResult::converged(position, iteration, 0.0);
            }
            if let Some(factor) = self.curvature_factor(&position, &surface, target, dxi, iteration, min_curvature) {
                dxi = dxi * factor;
            }
            let advance = self.advance_position(&position, dxi, MAX_NEAREST_DXI);
            position = advance.position;
            step = advance.dxi.magnitude();
            if step < Tolerance::NEAREST_XI.eps {
                return IterationResult::converged(position, iteration, step);
            }
        }
        IterationResult::unconverged(position, MAX_ITERATIONS, step, "find_nearest_position")
    }

    /// Scale for a linear ξ step so it follows the surface curvature towards
    /// `target`, or `None` where the surface is locally flat.
    fn curvature_factor(
        &self,
        position: &TrackSurfacePosition,
        surface: &SurfacePoint,
        target: Vec3,
        dxi: Vec2,
        iteration: usize,
        min_curvature: f64,
    ) -> Option<f64> {
        let sample = self.directional_curvature(position, dxi);
        if sample.curvature <= min_curvature {
            return None;
        }
        let radius = 1.0 / sample.curvature;
        let j = sample.tangent.normalized()?;
        let i = sample
            .tangent
            .cross(sample.tangent.cross(sample.d_tangent))
            .normalized()?;
        let delta = target - (surface.x - i * radius);
        let dj = delta.dot(j);
        let di = delta.dot(i);
        let angle = dj.atan2(di);
        let factor = if iteration <= ARC_CORRECTION_ITERATIONS && angle.abs() > ARC_CORRECTION_ANGLE {
            radius * angle / (surface.d1 * dxi.x + surface.d2 * dxi.y).magnitude()
        } else {
            (radius / di).min(MAX_CURVATURE_FACTOR)
        };
        factor.is_finite().then_some(factor)
    }

    // ------------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------------

    /// Follow `direction` projected onto the surface from `start` for
    /// `distance`, which may be negative to go backwards.
    ///
    /// Improved Euler integration in ξ steps of `options.max_dxi`, crossing
    /// into neighbouring elements as needed. Stops on reaching the distance,
    /// on reaching the surface edge, when the direction has no component in
    /// the surface, or after `options.max_steps` steps.
    #[must_use]
    pub fn track_vector(
        &self,
        start: TrackSurfacePosition,
        direction: Vec3,
        distance: f64,
        options: TrackVectorOptions,
    ) -> TrackVectorResult {
        let (direction, target) = if distance < 0.0 {
            (-direction, -distance)
        } else {
            (direction, distance)
        };
        let limit = TRACK_DISTANCE_FRACTION * target;
        let step_xi = |d1: Vec3, d2: Vec3| {
            let delta = calculate_surface_delta_xi(d1, d2, direction);
            delta.with_magnitude(options.max_dxi).map(|step| (delta, step))
        };
        let mut position = start;
        let mut tracked = 0.0;
        let mut steps = 0;
        let termination = loop {
            if tracked >= target {
                break TrackTermination::ReachedDistance;
            }
            if steps == options.max_steps {
                log::warn!("track_vector: step limit at {position}, tracked {tracked} of {target}");
                break TrackTermination::StepLimit;
            }
            steps += 1;
            let xi = position.xi();
            let a = self.evaluate_with_derivatives(&position);
            let Some((a_delta, a_dxi)) = step_xi(a.d1, a.d2) else {
                break TrackTermination::Stalled;
            };
            // predictor may sit slightly outside the element
            let mut trial = position;
            trial.xi1 = xi.x + a_dxi.x;
            trial.xi2 = xi.y + a_dxi.y;
            let trial_point = self.evaluate_with_derivatives(&trial);
            let b_delta = calculate_surface_delta_xi(trial_point.d1, trial_point.d2, direction);
            let Some(dxi) = ((a_delta + b_delta) * 0.5).with_magnitude(options.max_dxi) else {
                break TrackTermination::Stalled;
            };
            let increment = increment_xi_on_square(xi, dxi);
            position.xi1 = increment.xi.x;
            position.xi2 = increment.xi.y;
            let b = self.evaluate_with_derivatives(&position);
            let Some((_, b_dxi)) = step_xi(b.d1, b.d2) else {
                break TrackTermination::Stalled;
            };
            let ad = (a.d1 * a_dxi.x + a.d2 * a_dxi.y) * increment.proportion;
            let bd = (b.d1 * b_dxi.x + b.d2 * b_dxi.y) * increment.proportion;
            let arc_length = cubic_hermite_arc_length(a.x, ad, b.x, bd);
            if tracked + arc_length >= limit {
                let r = if arc_length > 0.0 {
                    increment.proportion * (target - tracked) / arc_length
                } else {
                    0.0
                };
                position.xi1 = (xi.x + r * dxi.x).clamp(0.0, 1.0);
                position.xi2 = (xi.y + r * dxi.y).clamp(0.0, 1.0);
                tracked = target;
                break TrackTermination::ReachedDistance;
            }
            if arc_length == 0.0 && increment.face.is_none() {
                log::warn!("track_vector: no increment at {position}, tracked {tracked} of {target}");
                break TrackTermination::Stalled;
            }
            tracked += arc_length;
            if let Some(face) = increment.face {
                if self.update_position_to_face(&mut position, face).is_some() {
                    log::warn!("track_vector: reached boundary at {position}, tracked {tracked} of {target}");
                    break TrackTermination::ReachedBoundary;
                }
            }
        };
        TrackVectorResult {
            position,
            distance: tracked,
            termination,
        }
    }
}

/// `d·r / |d|²`, zero for a zero `d`.
fn projection_scale(d: Vec3, r: Vec3) -> f64 {
    let mag_sq = d.length_squared();
    if mag_sq > 0.0 { d.dot(r) / mag_sq } else { 0.0 }
}
