//! Small dense linear algebra on `ndarray` matrices.
//!
//! Feature counts here are at most a few hundred, so the classic
//! algorithms are adequate:
//!
//! - [`jacobi_eigen`]: cyclic Jacobi rotations for symmetric matrices,
//!   eigenpairs sorted by descending eigenvalue.
//! - [`cholesky_solve`]: `A x = b` for symmetric positive definite `A`.
use anyhow::{bail, Result};
use ndarray::{Array1, Array2};

/// Eigenvalues (descending) and eigenvectors (columns) of a symmetric matrix.
#[derive(Debug, Clone)]
pub struct Eigen {
    pub values: Array1<f64>,
    /// Column `k` is the eigenvector of `values[k]`.
    pub vectors: Array2<f64>,
}

const MAX_SWEEPS: usize = 100;

pub fn jacobi_eigen(sym: &Array2<f64>) -> Result<Eigen> {
    let n = sym.nrows();
    if sym.ncols() != n {
        bail!("eigen decomposition needs a square matrix, got {:?}", sym.dim());
    }
    let mut a = sym.clone();
    let mut v = Array2::<f64>::eye(n);
    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);

    let mut converged = n < 2;
    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum::<f64>()
            .sqrt();
        if off <= 1e-12 * scale {
            converged = true;
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                if a[[p, q]].abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                rotate(&mut a, &mut v, p, q, c, s);
            }
        }
    }
    if !converged {
        bail!("Jacobi eigen decomposition did not converge in {MAX_SWEEPS} sweeps");
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));
    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let mut vectors = Array2::<f64>::zeros((n, n));
    for (k, &i) in order.iter().enumerate() {
        vectors.column_mut(k).assign(&v.column(i));
    }
    Ok(Eigen { values, vectors })
}

/// Apply the rotation annihilating `a[p, q]` to `a` (both sides) and `v`.
fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize, c: f64, s: f64) {
    let n = a.nrows();
    for k in 0..n {
        let akp = a[[k, p]];
        let akq = a[[k, q]];
        a[[k, p]] = c * akp - s * akq;
        a[[k, q]] = s * akp + c * akq;
    }
    for k in 0..n {
        let apk = a[[p, k]];
        let aqk = a[[q, k]];
        a[[p, k]] = c * apk - s * aqk;
        a[[q, k]] = s * apk + c * aqk;
    }
    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}

/// Solve `a x = b` with a Cholesky factorisation.
///
/// Errors if `a` is not (numerically) positive definite.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        bail!("cholesky_solve: incompatible shapes {:?} and {}", a.dim(), b.len());
    }
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let d = a[[i, i]] - dot;
                if d <= 0.0 {
                    bail!("matrix is not positive definite (pivot {i} = {d:e})");
                }
                l[[i, i]] = d.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - dot) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let dot: f64 = (0..i).map(|k| l[[i, k]] * y[k]).sum();
        y[i] = (b[i] - dot) / l[[i, i]];
    }
    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let dot: f64 = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (y[i] - dot) / l[[i, i]];
    }
    Ok(x)
}
