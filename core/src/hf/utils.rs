use nalgebra::{DMatrix, DVector, SymmetricEigen};

use super::LinearAlgebraError;

/// Upper bound on the total number of sweeps the symmetric eigensolver may take
const EIGEN_MAX_ITERATIONS: usize = 100_000;

/// Overlap eigenvalues at or below this are treated as a singular basis
const OVERLAP_EIGENVALUE_THRESHOLD: f64 = 1e-10;

#[inline(always)]
/// Create a symmetric, square matrix. Function is only run for upper triangle of the matrix
pub(crate) fn symmetric_matrix(
    n: usize,
    mut func: impl FnMut(usize, usize) -> f64,
) -> DMatrix<f64> {
    let m = DMatrix::from_fn(n, n, |i, j| if i <= j { func(i, j) } else { 0.0 });
    DMatrix::from_fn(n, n, |i, j| if i <= j { m[(i, j)] } else { m[(j, i)] })
}

pub(crate) fn eigs(
    matrix: DMatrix<f64>,
    name: &'static str,
) -> Result<(DMatrix<f64>, DVector<f64>), LinearAlgebraError> {
    if matrix.iter().any(|entry| !entry.is_finite()) {
        return Err(LinearAlgebraError::NonFiniteMatrix(name));
    }

    let eigs = SymmetricEigen::try_new(matrix, f64::EPSILON, EIGEN_MAX_ITERATIONS)
        .ok_or(LinearAlgebraError::EigensolverDidNotConverge)?;
    Ok((eigs.eigenvectors, eigs.eigenvalues))
}

/// Eigendecomposition of a symmetric matrix with the eigenpairs sorted by ascending
/// eigenvalue. The sort is stable, so degenerate pairs keep the solver's order.
pub(crate) fn sorted_eigs(
    matrix: DMatrix<f64>,
    name: &'static str,
) -> Result<(DMatrix<f64>, DVector<f64>), LinearAlgebraError> {
    let (eigenvectors, eigenvalues) = eigs(matrix, name)?;

    let mut val_vec_pairs = eigenvalues
        .iter()
        .copied()
        .zip(eigenvectors.column_iter())
        .collect::<Vec<_>>();

    val_vec_pairs.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    let (values, vectors): (Vec<_>, Vec<_>) = val_vec_pairs.into_iter().unzip();

    Ok((
        DMatrix::from_columns(&vectors),
        DVector::from_column_slice(&values),
    ))
}

/// Löwdin's symmetric orthogonalizer X = S^(-1/2), so that X^T S X = 1.
///
/// Fails if the overlap matrix isn't (numerically) positive definite.
pub(crate) fn orthogonalizer(overlap: &DMatrix<f64>) -> Result<DMatrix<f64>, LinearAlgebraError> {
    let (u, lambda) = eigs(overlap.clone(), "overlap")?;

    let smallest_eigenvalue = lambda.min();
    log::trace!("overlap eigenvalues: {lambda:0.6}");
    if smallest_eigenvalue.is_nan() || smallest_eigenvalue <= OVERLAP_EIGENVALUE_THRESHOLD {
        return Err(LinearAlgebraError::OverlapNotPositiveDefinite {
            smallest_eigenvalue,
        });
    }
    log::debug!(
        "overlap condition number: {:1.4e}",
        lambda.max() / smallest_eigenvalue
    );

    let diagonal_inv_sqrt = DMatrix::from_diagonal(&lambda.map(|f| f.sqrt().recip()));
    Ok(&u * (diagonal_inv_sqrt * u.transpose()))
}
