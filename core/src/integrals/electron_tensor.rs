use std::ops::Index;

use nalgebra::DMatrix;

use crate::hf::ScfError;

/// An electron tensor holding the electron-electron repulsion integrals of a basis
/// in chemists' notation:
///   g[i, j, k, l] = (ij|kl)
///
/// The tensor is stored densely in row-major order (the same order numpy uses),
/// so that the last two indices of a fixed (i, j) pair form one contiguous block.
/// No permutational symmetry is assumed or exploited.
#[derive(Clone, Debug, PartialEq)]
pub struct ElectronTensor {
    data: Vec<f64>,
    /// side length
    size: usize,
}

impl ElectronTensor {
    /// Creates a tensor of side length `size` from a row-major buffer.
    ///
    /// Fails with [`ScfError::DimensionMismatch`] if the buffer doesn't hold exactly
    /// `size^4` elements.
    pub fn from_row_major(size: usize, data: Vec<f64>) -> Result<Self, ScfError> {
        let expected = size.pow(4);
        if data.len() != expected {
            return Err(ScfError::DimensionMismatch {
                what: "two-electron tensor",
                expected,
                found: data.len(),
            });
        }

        Ok(Self { data, size })
    }

    /// Creates a tensor by evaluating `func` for every index (i, j, k, l).
    pub fn from_fn(size: usize, mut func: impl FnMut(usize, usize, usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(size.pow(4));
        for (i, j, k, l) in itertools::iproduct!(0..size, 0..size, 0..size, 0..size) {
            data.push(func(i, j, k, l));
        }

        Self { data, size }
    }

    pub fn zeros(size: usize) -> Self {
        Self {
            data: vec![0.0; size.pow(4)],
            size,
        }
    }

    /// Returns the side length n of the n×n×n×n tensor
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline(always)]
    fn linear(&self, (i, j, k, l): (usize, usize, usize, usize)) -> usize {
        ((i * self.size + j) * self.size + k) * self.size + l
    }

    /// Builds the restricted hartree fock two-electron kernel
    ///   G[i, j, k, l] = (ij|kl) - 1/2 (il|kj)
    /// i.e. the coulomb term minus half of the exchange term. Contracting this
    /// kernel with a density gives the mean-field part of the fock matrix.
    pub fn coulomb_exchange(&self) -> Self {
        Self::from_fn(self.size, |i, j, k, l| {
            self[(i, j, k, l)] - 0.5 * self[(i, l, k, j)]
        })
    }

    /// Contracts the last two indices of the tensor with `density`:
    ///   V[i, j] = sum_{k,l} P[k, l] * T[i, j, k, l]
    ///
    /// Every entry is accumulated in full double precision and no element is
    /// skipped, however small.
    pub fn contract_density(&self, density: &DMatrix<f64>) -> DMatrix<f64> {
        let n = self.size;
        debug_assert_eq!(density.shape(), (n, n));

        let block = n * n;
        let entry = |i: usize, j: usize| -> f64 {
            let offset = (i * n + j) * block;
            let terms = &self.data[offset..offset + block];

            let mut sum = 0.0;
            for (k, l) in itertools::iproduct!(0..n, 0..n) {
                sum += density[(k, l)] * terms[k * n + l];
            }
            sum
        };

        // column major, to match the storage of DMatrix
        #[cfg(feature = "rayon")]
        let values = {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};

            (0..block)
                .into_par_iter()
                .map(|index| entry(index % n, index / n))
                .collect::<Vec<_>>()
        };

        #[cfg(not(feature = "rayon"))]
        let values = (0..block)
            .map(|index| entry(index % n, index / n))
            .collect::<Vec<_>>();

        DMatrix::from_vec(n, n, values)
    }
}

impl Index<(usize, usize, usize, usize)> for ElectronTensor {
    type Output = f64;

    fn index(&self, index: (usize, usize, usize, usize)) -> &Self::Output {
        &self.data[self.linear(index)]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use super::ElectronTensor;
    use crate::hf::ScfError;

    #[test]
    fn row_major_layout() {
        let data = (0..16).map(f64::from).collect::<Vec<_>>();
        let tensor = ElectronTensor::from_row_major(2, data).unwrap();

        assert_eq!(tensor[(0, 0, 0, 0)], 0.0);
        assert_eq!(tensor[(0, 0, 0, 1)], 1.0);
        assert_eq!(tensor[(0, 1, 0, 0)], 4.0);
        assert_eq!(tensor[(1, 0, 1, 1)], 11.0);
        assert_eq!(tensor[(1, 1, 1, 1)], 15.0);
    }

    #[test]
    fn wrong_buffer_length() {
        let err = ElectronTensor::from_row_major(3, vec![0.0; 80]).unwrap_err();
        assert!(matches!(
            err,
            ScfError::DimensionMismatch {
                expected: 81,
                found: 80,
                ..
            }
        ));
    }

    #[test]
    fn from_fn_matches_index() {
        let tensor =
            ElectronTensor::from_fn(3, |i, j, k, l| (1000 * i + 100 * j + 10 * k + l) as f64);
        assert_eq!(tensor[(2, 1, 0, 2)], 2102.0);
        assert_eq!(tensor.as_slice().len(), 81);
    }

    #[test]
    fn coulomb_exchange_kernel() {
        let tensor =
            ElectronTensor::from_fn(2, |i, j, k, l| (1 + i + 2 * j + 4 * k + 8 * l) as f64);
        let kernel = tensor.coulomb_exchange();

        // (01|10) - 1/2 (00|11)
        assert_relative_eq!(kernel[(0, 1, 1, 0)], 7.0 - 0.5 * 13.0);
        // (00|00) - 1/2 (00|00)
        assert_relative_eq!(kernel[(0, 0, 0, 0)], 0.5);
    }

    #[test]
    fn contraction_with_density() {
        let tensor =
            ElectronTensor::from_fn(2, |i, j, k, l| (1 + i + 2 * j + 4 * k + 8 * l) as f64);
        let density = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]);

        let contracted = tensor.contract_density(&density);

        for (i, j) in itertools::iproduct!(0..2, 0..2) {
            let mut expected = 0.0;
            for (k, l) in itertools::iproduct!(0..2, 0..2) {
                expected += density[(k, l)] * tensor[(i, j, k, l)];
            }
            assert_relative_eq!(contracted[(i, j)], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_density_contracts_to_zero() {
        let tensor = ElectronTensor::from_fn(3, |i, j, k, l| (i + j + k + l) as f64);
        let contracted = tensor.contract_density(&DMatrix::zeros(3, 3));
        assert_eq!(contracted, DMatrix::zeros(3, 3));
    }
}
