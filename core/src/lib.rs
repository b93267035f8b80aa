pub mod hf;
pub mod integrals;

pub use hf::{
    run_scf, run_scf_with_observer, LinearAlgebraError, RestrictedHartreeFockOutput, ScfConfig,
    ScfError, ScfIteration,
};
pub use integrals::ElectronTensor;
