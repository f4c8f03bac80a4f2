//! Convergence reporting for the iterative solvers.
//!
//! Every Newton or fixed-point loop in the kernel has a hard iteration cap.
//! Running out of iterations is not an error: the solver returns its last
//! estimate wrapped in an [`IterationResult`] that says whether it converged,
//! how many iterations it took, and the residual it finished on. Callers that
//! need guaranteed convergence inspect those fields.
//!
//! Operations that run several solves (sampling, curve generation over a
//! surface) also return a [`SolverDiagnostics`] aggregate.
//!
//! # Example
//!
//! ```ignore
//! use scaffold_geom::geom::{update_ellipse_angle_by_arc_length, SolverDiagnostics};
//!
//! let result = update_ellipse_angle_by_arc_length(2.0, 1.0, 0.0, 1.5, None);
//! let mut diagnostics = SolverDiagnostics::new();
//! diagnostics.record("ellipse angle", &result);
//! if !diagnostics.is_clean() {
//!     for warning in &diagnostics.warnings {
//!         eprintln!("Warning: {warning}");
//!     }
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of an iteration-capped solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationResult<T> {
    /// Converged value, or the best estimate when the cap was hit.
    pub value: T,
    pub converged: bool,
    /// Iterations actually performed.
    pub iterations: usize,
    /// Final residual in the units of the solver's convergence test.
    ///
    /// For smoothing this is the closeness ratio `max change / tolerance`,
    /// which is below 1 on convergence.
    pub residual: f64,
}

impl<T> IterationResult<T> {
    #[must_use]
    pub const fn converged(value: T, iterations: usize, residual: f64) -> Self {
        Self {
            value,
            converged: true,
            iterations,
            residual,
        }
    }

    /// Build a result that hit the iteration cap and log it.
    #[must_use]
    pub fn unconverged(value: T, iterations: usize, residual: f64, context: &str) -> Self {
        log::warn!("{context}: no convergence after {iterations} iterations, residual {residual:e}");
        Self {
            value,
            converged: false,
            iterations,
            residual,
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> IterationResult<U> {
        IterationResult {
            value: f(self.value),
            converged: self.converged,
            iterations: self.iterations,
            residual: self.residual,
        }
    }

    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Aggregate of several solves performed by one operation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    /// Number of iterative solves recorded.
    pub solve_count: usize,

    /// Solves that stopped at the iteration cap.
    pub unconverged_count: usize,

    pub total_iterations: usize,

    /// Largest iteration count of any single solve.
    pub max_iterations: usize,

    /// Largest residual among the unconverged solves, zero if none.
    pub worst_residual: f64,

    /// Human-readable notes, one per unconverged solve or degenerate input.
    pub warnings: Vec<String>,
}

impl SolverDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if every solve converged and nothing was flagged.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unconverged_count == 0 && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Fold one solve into the totals.
    pub fn record<T>(&mut self, label: &str, result: &IterationResult<T>) {
        self.solve_count += 1;
        self.total_iterations += result.iterations;
        self.max_iterations = self.max_iterations.max(result.iterations);
        if !result.converged {
            self.unconverged_count += 1;
            self.worst_residual = self.worst_residual.max(result.residual);
            self.add_warning(format!(
                "{label} did not converge in {} iterations (residual {:e})",
                result.iterations, result.residual
            ));
        }
    }

    pub fn merge(&mut self, other: &SolverDiagnostics) {
        self.solve_count += other.solve_count;
        self.unconverged_count += other.unconverged_count;
        self.total_iterations += other.total_iterations;
        self.max_iterations = self.max_iterations.max(other.max_iterations);
        self.worst_residual = self.worst_residual.max(other.worst_residual);
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Short one-line summary for logging.
    ///
    /// Format: `"solves:{n} iters:{total} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "solves:{} iters:{}",
            self.solve_count, self.total_iterations
        )];
        if self.unconverged_count > 0 {
            parts.push(format!("unconverged:{}", self.unconverged_count));
        }
        if !self.warnings.is_empty() {
            parts.push(format!("warnings:{}", self.warnings.len()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for SolverDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solver Diagnostics:")?;
        writeln!(f, "  Solves: {}", self.solve_count)?;
        writeln!(
            f,
            "  Iterations: {} total, {} max",
            self.total_iterations, self.max_iterations
        )?;
        if self.unconverged_count > 0 {
            writeln!(
                f,
                "  Unconverged: {} (worst residual {:e})",
                self.unconverged_count, self.worst_residual
            )?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        let status = if self.is_clean() { "CONVERGED" } else { "ISSUES DETECTED" };
        writeln!(f, "  Status: {status}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_clean() {
        let diag = SolverDiagnostics::default();
        assert!(diag.is_clean());
        assert!(!diag.has_warnings());
    }

    #[test]
    fn test_record_counts_iterations() {
        let mut diag = SolverDiagnostics::new();
        diag.record("a", &IterationResult::converged(1.0, 4, 0.0));
        diag.record("b", &IterationResult::converged(2.0, 7, 0.0));
        assert_eq!(diag.solve_count, 2);
        assert_eq!(diag.total_iterations, 11);
        assert_eq!(diag.max_iterations, 7);
        assert!(diag.is_clean());
    }

    #[test]
    fn test_record_unconverged() {
        let mut diag = SolverDiagnostics::new();
        diag.record("angle", &IterationResult::unconverged(0.5, 100, 3.5, "test"));
        assert_eq!(diag.unconverged_count, 1);
        assert_eq!(diag.worst_residual, 3.5);
        assert!(!diag.is_clean());
        assert!(diag.warnings[0].contains("angle"));
    }

    #[test]
    fn test_merge_and_summary() {
        let mut first = SolverDiagnostics::new();
        first.record("x", &IterationResult::converged((), 3, 0.0));
        let mut second = SolverDiagnostics::new();
        second.record("y", &IterationResult::unconverged((), 100, 2.0, "test"));
        first.merge(&second);

        assert_eq!(first.solve_count, 2);
        assert_eq!(first.max_iterations, 100);
        let summary = first.summary();
        assert!(summary.contains("solves:2"));
        assert!(summary.contains("unconverged:1"));
        assert!(format!("{first}").contains("ISSUES DETECTED"));
    }

    #[test]
    fn test_map_keeps_status() {
        let result = IterationResult::unconverged(2.0_f64, 100, 1.0, "test").map(|v| v * 2.0);
        assert_eq!(result.value, 4.0);
        assert!(!result.converged);
        assert_eq!(result.iterations, 100);
    }
}
