use nalgebra::{DMatrix, DVector};

use crate::integrals::ElectronTensor;

use super::{utils, LinearAlgebraError, ScfConfig, ScfError, ScfIteration};

/// The output of a restricted hartree fock calculation
#[derive(Debug)]
#[non_exhaustive]
pub struct RestrictedHartreeFockOutput {
    /// The electronic energy of the system. This is the energy of the density that
    /// entered the converged iteration, paired with the coefficients obtained from
    /// that same iteration's fock matrix.
    pub electronic_energy: f64,
    /// The occupied orbital coefficients (n_basis × n_occupied), one orbital per
    /// column, in ascending order of orbital energy
    pub coefficients: DMatrix<f64>,
    /// All orbital energies of the final fock matrix, sorted in ascending order
    pub orbital_energies: Vec<f64>,
    /// The density built from `coefficients`
    pub density: DMatrix<f64>,
    /// How many iterations were run, including the converged one
    pub iterations: usize,
}

impl RestrictedHartreeFockOutput {
    /// Electronic energy plus an externally supplied nuclear repulsion energy
    pub fn total_energy(&self, nuclear_repulsion: f64) -> f64 {
        self.electronic_energy + nuclear_repulsion
    }
}

/// The occupied orbitals of one diagonalization
#[derive(Debug)]
pub struct OccupiedOrbitals {
    /// n_basis × n_occupied
    pub coefficients: DMatrix<f64>,
    /// all generalized eigenvalues, ascending
    pub orbital_energies: DVector<f64>,
}

/// Runs a restricted hartree fock calculation on precomputed integrals.
///
/// Progress is only reported through the logger. See [`run_scf_with_observer`].
pub fn run_scf(
    core_hamiltonian: &DMatrix<f64>,
    electron: &ElectronTensor,
    overlap: &DMatrix<f64>,
    n_occupied: usize,
    config: &ScfConfig,
) -> Result<RestrictedHartreeFockOutput, ScfError> {
    run_scf_with_observer(core_hamiltonian, electron, overlap, n_occupied, config, |_| {})
}

/// Runs a restricted hartree fock calculation on precomputed integrals, handing one
/// [`ScfIteration`] per iteration to `observer` before the convergence check.
///
/// `n_occupied` is the number of doubly occupied orbitals. The density is seeded
/// with zeros, so the first fock matrix is the core hamiltonian.
pub fn run_scf_with_observer(
    core_hamiltonian: &DMatrix<f64>,
    electron: &ElectronTensor,
    overlap: &DMatrix<f64>,
    n_occupied: usize,
    config: &ScfConfig,
    mut observer: impl FnMut(&ScfIteration),
) -> Result<RestrictedHartreeFockOutput, ScfError> {
    let n_basis = check_dimensions(core_hamiltonian, electron, overlap, n_occupied)?;
    log::debug!(
        "rhf: {n_basis} basis functions, {n_occupied} occupied orbitals, max {} iterations, epsilon {:e}",
        config.max_iterations,
        config.epsilon
    );

    if config.max_iterations == 0 {
        return Err(ScfError::Convergence {
            iterations: 0,
            last_energy: None,
        });
    }

    let transform = utils::orthogonalizer(overlap)?;
    let electron_terms = electron.coulomb_exchange();

    let mut density = initial_density(n_basis);
    let mut last_energy = None;

    // start of scf iteration
    for iteration in 0..config.max_iterations {
        let fock = fock_from_terms(core_hamiltonian, &electron_terms, &density);
        let electronic_energy = compute_electronic_energy(&density, core_hamiltonian, &fock);
        last_energy = Some(electronic_energy);

        let record = ScfIteration {
            iteration,
            electronic_energy,
        };
        log::info!("iteration {iteration:<4} - electronic energy {electronic_energy:1.8}");
        observer(&record);

        let OccupiedOrbitals {
            coefficients,
            orbital_energies,
        } = diagonalize_with(&fock, &transform, n_occupied)?;
        log::trace!("orbital energies: {orbital_energies:0.6}");

        let new_density = compute_density(&coefficients);
        let converged = is_converged(&new_density, &density, config.epsilon);
        density = new_density;

        if converged {
            log::debug!("rhf converged after {} iterations", iteration + 1);
            return Ok(RestrictedHartreeFockOutput {
                electronic_energy,
                coefficients,
                orbital_energies: orbital_energies.as_slice().to_vec(),
                density,
                iterations: iteration + 1,
            });
        }
    }

    Err(ScfError::Convergence {
        iterations: config.max_iterations,
        last_energy,
    })
}

fn check_dimensions(
    core_hamiltonian: &DMatrix<f64>,
    electron: &ElectronTensor,
    overlap: &DMatrix<f64>,
    n_occupied: usize,
) -> Result<usize, ScfError> {
    let (n_basis, ncols) = core_hamiltonian.shape();
    let mismatch = |what, found| ScfError::DimensionMismatch {
        what,
        expected: n_basis,
        found,
    };

    if ncols != n_basis {
        return Err(mismatch("core hamiltonian columns", ncols));
    }
    if electron.size() != n_basis {
        return Err(mismatch("two-electron tensor", electron.size()));
    }
    if overlap.nrows() != n_basis {
        return Err(mismatch("overlap rows", overlap.nrows()));
    }
    if overlap.ncols() != n_basis {
        return Err(mismatch("overlap columns", overlap.ncols()));
    }
    if n_occupied == 0 || n_occupied > n_basis {
        return Err(mismatch("occupied orbitals", n_occupied));
    }

    Ok(n_basis)
}

/// The zero density used to start the iteration
pub fn initial_density(n_basis: usize) -> DMatrix<f64> {
    DMatrix::zeros(n_basis, n_basis)
}

/// Builds the fock matrix
///   F[i, j] = h[i, j] + sum_{k,l} P[k, l] ((ij|kl) - 1/2 (il|kj))
pub fn compute_fock_matrix(
    core_hamiltonian: &DMatrix<f64>,
    electron: &ElectronTensor,
    density: &DMatrix<f64>,
) -> DMatrix<f64> {
    fock_from_terms(core_hamiltonian, &electron.coulomb_exchange(), density)
}

/// Same as [`compute_fock_matrix`], for a kernel that already went through
/// [`ElectronTensor::coulomb_exchange`]
fn fock_from_terms(
    core_hamiltonian: &DMatrix<f64>,
    electron_terms: &ElectronTensor,
    density: &DMatrix<f64>,
) -> DMatrix<f64> {
    core_hamiltonian + electron_terms.contract_density(density)
}

/// E = 1/2 sum_{i,j} P[i, j] (h[i, j] + F[i, j])
pub fn compute_electronic_energy(
    density: &DMatrix<f64>,
    core_hamiltonian: &DMatrix<f64>,
    fock: &DMatrix<f64>,
) -> f64 {
    0.5 * density.dot(&(core_hamiltonian + fock))
}

/// Solves the generalized eigenproblem F c = e S c and keeps the `n_occupied`
/// eigenvectors with the lowest eigenvalues.
///
/// Eigenvectors of degenerate eigenvalues come out in whatever order the
/// eigensolver produces them.
pub fn diagonalize_fock(
    fock: &DMatrix<f64>,
    overlap: &DMatrix<f64>,
    n_occupied: usize,
) -> Result<OccupiedOrbitals, ScfError> {
    let n_basis = fock.nrows();
    if !fock.is_square() || overlap.shape() != fock.shape() {
        return Err(ScfError::DimensionMismatch {
            what: "overlap",
            expected: n_basis,
            found: overlap.nrows(),
        });
    }
    if n_occupied > n_basis {
        return Err(ScfError::DimensionMismatch {
            what: "occupied orbitals",
            expected: n_basis,
            found: n_occupied,
        });
    }

    let transform = utils::orthogonalizer(overlap)?;
    Ok(diagonalize_with(fock, &transform, n_occupied)?)
}

fn diagonalize_with(
    fock: &DMatrix<f64>,
    transform: &DMatrix<f64>,
    n_occupied: usize,
) -> Result<OccupiedOrbitals, LinearAlgebraError> {
    let transformed_fock = &transform.transpose() * (fock * transform);
    let (transformed_coefficients, orbital_energies) =
        utils::sorted_eigs(transformed_fock, "fock")?;
    let coefficients = transform * transformed_coefficients.columns(0, n_occupied);

    Ok(OccupiedOrbitals {
        coefficients,
        orbital_energies,
    })
}

/// P = 2 C C^T, for doubly occupied orbitals
pub fn compute_density(coefficients: &DMatrix<f64>) -> DMatrix<f64> {
    utils::symmetric_matrix(coefficients.nrows(), |i, j| {
        2.0 * coefficients.row(i).dot(&coefficients.row(j))
    })
}

/// Whether no entry of the two densities differs by more than `epsilon`
pub fn is_converged(density: &DMatrix<f64>, previous: &DMatrix<f64>, epsilon: f64) -> bool {
    density.shape() == previous.shape()
        && density
            .iter()
            .zip(previous.iter())
            .all(|(new, old)| (new - old).abs() <= epsilon)
}
