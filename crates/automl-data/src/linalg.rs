//! Small dense-matrix helpers for PCA's QR-iteration eigendecomposition.
//!
//! Deliberately minimal: no crate dependency pulled in for this, since
//! the only consumer is [`crate::actions::pca`] and the matrices involved
//! are feature-count-sized (small relative to sample count).

pub type Matrix = Vec<Vec<f64>>;

pub fn identity(n: usize) -> Matrix {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

pub fn matmul(a: &Matrix, b: &Matrix) -> Matrix {
    let n = a.len();
    let k = b.len();
    let m = if k == 0 { 0 } else { b[0].len() };
    let mut out = vec![vec![0.0; m]; n];
    for i in 0..n {
        for (l, row) in b.iter().enumerate().take(k) {
            let a_il = a[i][l];
            if a_il == 0.0 {
                continue;
            }
            for j in 0..m {
                out[i][j] += a_il * row[j];
            }
        }
    }
    out
}

/// Classical Gram-Schmidt QR decomposition of a square matrix.
pub fn qr_decompose(a: &Matrix) -> (Matrix, Matrix) {
    let n = a.len();
    let mut q = vec![vec![0.0; n]; n];
    let mut r = vec![vec![0.0; n]; n];

    for j in 0..n {
        let mut v: Vec<f64> = (0..n).map(|i| a[i][j]).collect();
        for k in 0..j {
            let qk: Vec<f64> = (0..n).map(|i| q[i][k]).collect();
            let dot: f64 = (0..n).map(|i| qk[i] * a[i][j]).sum();
            r[k][j] = dot;
            for i in 0..n {
                v[i] -= dot * qk[i];
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        r[j][j] = norm;
        if norm > 1e-12 {
            for i in 0..n {
                q[i][j] = v[i] / norm;
            }
        }
    }
    (q, r)
}

/// Pearson correlation matrix of a sample-by-feature matrix (each inner
/// `Vec` is one sample's feature row).
pub fn correlation_matrix(samples: &[Vec<f64>], num_features: usize) -> Matrix {
    let n = samples.len() as f64;
    if n == 0.0 {
        return identity(num_features);
    }
    let means: Vec<f64> = (0..num_features)
        .map(|j| samples.iter().map(|row| row[j]).sum::<f64>() / n)
        .collect();
    let stds: Vec<f64> = (0..num_features)
        .map(|j| {
            let var = samples
                .iter()
                .map(|row| (row[j] - means[j]).powi(2))
                .sum::<f64>()
                / n;
            var.sqrt()
        })
        .collect();

    let mut corr = vec![vec![0.0; num_features]; num_features];
    for i in 0..num_features {
        for j in 0..num_features {
            if stds[i] < 1e-12 || stds[j] < 1e-12 {
                corr[i][j] = if i == j { 1.0 } else { 0.0 };
                continue;
            }
            let cov = samples
                .iter()
                .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
                .sum::<f64>()
                / n;
            corr[i][j] = cov / (stds[i] * stds[j]);
        }
    }
    corr
}

/// Eigendecomposition of a symmetric matrix via 10 sweeps of the
/// unshifted QR algorithm with classical Gram-Schmidt.
///
/// Returns `(eigenvalues, eigenvectors)` where `eigenvectors[k]` is the
/// column vector (length `n`) associated with `eigenvalues[k]`, both in
/// whatever order the accumulated product settles into (callers sort by
/// magnitude themselves).
pub fn qr_algorithm_eigen(a0: &Matrix, sweeps: usize) -> (Vec<f64>, Matrix) {
    let n = a0.len();
    let mut a = a0.clone();
    let mut q_total = identity(n);
    for _ in 0..sweeps {
        let (q, r) = qr_decompose(&a);
        a = matmul(&r, &q);
        q_total = matmul(&q_total, &q);
    }
    let eigenvalues: Vec<f64> = (0..n).map(|i| a[i][i]).collect();
    let eigenvectors: Vec<Vec<f64>> = (0..n).map(|k| (0..n).map(|i| q_total[i][k]).collect()).collect();
    (eigenvalues, eigenvectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_decompose_reconstructs_input() {
        let a = vec![vec![4.0, 2.0], vec![2.0, 3.0]];
        let (q, r) = qr_decompose(&a);
        let reconstructed = matmul(&q, &r);
        for i in 0..2 {
            for j in 0..2 {
                assert!((reconstructed[i][j] - a[i][j]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn qr_algorithm_finds_eigenvalues_of_diagonal_matrix() {
        let a = vec![vec![5.0, 0.0], vec![0.0, 2.0]];
        let (eigenvalues, _) = qr_algorithm_eigen(&a, 10);
        let mut sorted = eigenvalues.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert!((sorted[0] - 5.0).abs() < 1e-6);
        assert!((sorted[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn correlation_matrix_diagonal_is_one() {
        let samples = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0], vec![4.0, 8.0]];
        let corr = correlation_matrix(&samples, 2);
        assert!((corr[0][0] - 1.0).abs() < 1e-9);
        assert!((corr[1][1] - 1.0).abs() < 1e-9);
    }
}
