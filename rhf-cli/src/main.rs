mod integrals;

use std::{fs::File, path::PathBuf, time::Instant};

use anyhow::Context;
use clap::Parser;
use rhf_core::{run_scf_with_observer, ScfConfig, ScfIteration};

use crate::integrals::IntegralArchive;

/// Restricted hartree fock on precomputed integrals
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// A .npz or .json archive with the integrals h, g, S and the nuclear
    /// repulsion energy Vnuc
    integrals: PathBuf,
    /// The number of doubly occupied orbitals
    #[arg(long, short = 'n')]
    occupied: usize,
    /// A json file with the scf settings. Flags given on the command line win.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// The maximum number of iterations the SCF loop should attempt before the
    /// system is considered to not converge [default: 30]
    #[arg(long)]
    max_iterations: Option<usize>,
    /// if no entry of the density matrix changes by more than this, the system is
    /// considered converged [default: 1e-5]
    #[arg(long)]
    epsilon: Option<f64>,
}

impl Args {
    fn scf_config(&self) -> anyhow::Result<ScfConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_reader::<_, ScfConfig>(File::open(path)?)
                .with_context(|| format!("invalid scf config {}", path.display()))?,
            None => ScfConfig::default(),
        };

        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(epsilon) = self.epsilon {
            config.epsilon = epsilon;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args: Args = Args::parse();
    let config = args.scf_config()?;
    log::debug!("{config:?}");

    let archive = IntegralArchive::load(&args.integrals)
        .with_context(|| format!("failed to load integrals from {}", args.integrals.display()))?;

    let start = Instant::now();
    let output = run_scf_with_observer(
        &archive.core_hamiltonian,
        &archive.electron,
        &archive.overlap,
        args.occupied,
        &config,
        |&ScfIteration {
             iteration,
             electronic_energy,
         }| println!("{iteration}\t {electronic_energy:.8}"),
    )?;

    log::info!(
        "hartree fock converged after {} iterations and {:0.2?}",
        output.iterations,
        start.elapsed()
    );
    log::debug!("orbital energies: {:3.6?}", output.orbital_energies);
    println!(
        "total energy: {:.8}",
        output.total_energy(archive.nuclear_repulsion)
    );

    Ok(())
}
