//! Weighted least squares solver.
//!
//! The logistic fit repeatedly solves small linear regression problems of the form:
//!
//! ```text
//! minimize Σ w_i (z_i - x_i^T β)^2
//! ```
//!
//! IRLS is linear in β given the current working weights, so we solve β once
//! per reweighting iteration.
//!
//! Implementation choices:
//! - Callers scale rows by `sqrt(w_i)` and we solve an ordinary least squares problem.
//! - We use SVD to solve the least-squares problem robustly even when the
//!   design matrix is tall (many more rows than columns).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Because our parameter dimension is tiny (≈20 columns), SVD performance is
//!   acceptable for datasets in the tens of thousands of rows.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    // SVD solve with a relaxed tolerance to handle near-singular matrices.
    // Dummy-encoded bands can produce nearly collinear columns when a band is
    // rare or absent in the training split, so we use a tolerance that
    // balances numerical stability with solution acceptance.
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
