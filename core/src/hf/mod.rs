pub mod rhf;
pub(crate) mod utils;

use serde::{Deserialize, Serialize};

pub use rhf::{
    compute_density, compute_electronic_energy, compute_fock_matrix, diagonalize_fock,
    initial_density, is_converged, run_scf, run_scf_with_observer, OccupiedOrbitals,
    RestrictedHartreeFockOutput,
};

/// The configuration of an SCF calculation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScfConfig {
    /// the maximum number of iterations to try
    pub max_iterations: usize,
    /// if no entry of the density matrix changes by more than this between two
    /// iterations, the system is considered converged.
    pub epsilon: f64,
}

impl Default for ScfConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            epsilon: 1e-5,
        }
    }
}

/// One progress record, emitted once per SCF iteration.
///
/// The energy belongs to the density that *entered* the iteration, not the one
/// produced by it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScfIteration {
    pub iteration: usize,
    pub electronic_energy: f64,
}

/// Everything that can go wrong during an SCF run. Nothing is retried - every
/// error aborts the run and is handed to the caller as is.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScfError {
    #[error("dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    LinearAlgebra(#[from] LinearAlgebraError),
    #[error("scf did not converge after {iterations} iterations (last electronic energy: {last_energy:?})")]
    Convergence {
        iterations: usize,
        /// the energy of the last completed iteration, if there was one
        last_energy: Option<f64>,
    },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LinearAlgebraError {
    #[error("overlap matrix is not positive definite (smallest eigenvalue {smallest_eigenvalue:e})")]
    OverlapNotPositiveDefinite { smallest_eigenvalue: f64 },
    #[error("{0} matrix contains non-finite entries")]
    NonFiniteMatrix(&'static str),
    #[error("symmetric eigensolver did not converge")]
    EigensolverDidNotConverge,
}
