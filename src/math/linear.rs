//! Linear solvers for the Levenberg–Marquardt normal equations.
//!
//! Every LM step solves a small symmetric positive (semi-)definite system
//!
//! ```text
//! (JᵀJ + λ D) δ = -Jᵀr
//! ```
//!
//! Implementation choices:
//! - Few parameters (Simple triode): a direct Cholesky factorization, with an SVD
//!   fallback when the damped matrix is numerically indefinite.
//! - Koren family (5–7 parameters, poorly scaled): conjugate gradients with a
//!   Jacobi (diagonal) preconditioner. If CG stalls we fall back to the dense
//!   solve rather than take a half-solved step.

use nalgebra::{DMatrix, DVector};

/// Solve a symmetric system directly.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }

    let svd = a.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-12, 1e-10] {
        if let Ok(x) = svd.solve(b, tol) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}

/// Outcome of a preconditioned conjugate-gradient solve.
#[derive(Debug, Clone)]
pub struct CgSolution {
    pub x: DVector<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Jacobi-preconditioned conjugate gradients for a symmetric positive-definite `a`.
///
/// Stops once `‖r‖ <= rel_tol · ‖b‖` or after `max_iter` iterations.
pub fn solve_cg_jacobi(a: &DMatrix<f64>, b: &DVector<f64>, rel_tol: f64, max_iter: usize) -> CgSolution {
    let n = b.len();
    let mut x = DVector::<f64>::zeros(n);

    let b_norm = b.norm();
    if b_norm == 0.0 {
        return CgSolution {
            x,
            iterations: 0,
            converged: true,
        };
    }

    // Inverse diagonal; non-positive entries fall back to identity scaling.
    let inv_diag = DVector::from_iterator(
        n,
        a.diagonal()
            .iter()
            .map(|&d| if d > 0.0 && d.is_finite() { 1.0 / d } else { 1.0 }),
    );

    let mut r = b.clone();
    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for iter in 0..max_iter {
        let ap = a * &p;
        let pap = p.dot(&ap);
        if pap.is_nan() || pap <= 0.0 {
            return CgSolution {
                x,
                iterations: iter,
                converged: false,
            };
        }

        let step = rz / pap;
        x.axpy(step, &p, 1.0);
        r.axpy(-step, &ap, 1.0);

        if r.norm() <= rel_tol * b_norm {
            return CgSolution {
                x,
                iterations: iter + 1,
                converged: true,
            };
        }

        z = r.component_mul(&inv_diag);
        let rz_next = r.dot(&z);
        let beta = rz_next / rz;
        rz = rz_next;
        p = &z + &p * beta;
    }

    CgSolution {
        x,
        iterations: max_iter,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd_system() -> (DMatrix<f64>, DVector<f64>, DVector<f64>) {
        // Badly scaled SPD matrix, the shape Koren normal equations take.
        let a = DMatrix::from_row_slice(
            3,
            3,
            &[1.0e6, 2.0e3, 1.0, 2.0e3, 9.0, 0.5, 1.0, 0.5, 2.0],
        );
        let x_true = DVector::from_row_slice(&[1.0e-3, -2.0, 0.5]);
        let b = &a * &x_true;
        (a, b, x_true)
    }

    #[test]
    fn dense_solve_recovers_solution() {
        let (a, b, x_true) = spd_system();
        let x = solve_dense(&a, &b).unwrap();
        assert!((x - x_true).norm() < 1e-9);
    }

    #[test]
    fn cg_jacobi_recovers_solution() {
        let (a, b, x_true) = spd_system();
        let sol = solve_cg_jacobi(&a, &b, 1e-12, 50);
        assert!(sol.converged);
        assert!((sol.x - x_true).norm() < 1e-7);
    }

    #[test]
    fn cg_with_zero_rhs_is_trivially_converged() {
        let (a, _, _) = spd_system();
        let sol = solve_cg_jacobi(&a, &DVector::zeros(3), 1e-12, 10);
        assert!(sol.converged);
        assert_eq!(sol.iterations, 0);
        assert_eq!(sol.x.norm(), 0.0);
    }
}
