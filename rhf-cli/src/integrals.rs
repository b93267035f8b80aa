use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use anyhow::{bail, ensure, Context, Result};
use nalgebra::DMatrix;
use ndarray::{Array0, Array2, Array4};
use ndarray_npy::NpzReader;
use rhf_core::ElectronTensor;
use serde::Deserialize;

/// Precomputed integrals of a molecule, everything needed to run a restricted
/// hartree fock calculation
#[derive(Debug)]
pub struct IntegralArchive {
    pub core_hamiltonian: DMatrix<f64>,
    pub electron: ElectronTensor,
    pub overlap: DMatrix<f64>,
    pub nuclear_repulsion: f64,
}

impl IntegralArchive {
    /// Loads an archive, picking the format from the file extension (`npz` or `json`)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("npz") => Self::from_npz(file),
            Some("json") => Self::from_json(BufReader::new(file)),
            _ => bail!("unknown integral archive format (expected .npz or .json)"),
        }
    }

    /// Reads the arrays `h`, `g`, `S` and `Vnuc` of a numpy archive
    pub fn from_npz(reader: impl Read + Seek) -> Result<Self> {
        let mut npz = NpzReader::new(reader)?;
        let names = npz.names()?;
        log::debug!("npz entries: {names:?}");

        // numpy appends .npy to every name passed to np.savez
        let entry = |name: &str| -> Result<String> {
            let suffixed = format!("{name}.npy");
            names
                .iter()
                .find(|entry| **entry == name || **entry == suffixed)
                .cloned()
                .with_context(|| format!("archive has no array named {name}"))
        };

        let h: Array2<f64> = npz.by_name(&entry("h")?).context("reading h")?;
        let g: Array4<f64> = npz.by_name(&entry("g")?).context("reading g")?;
        let s: Array2<f64> = npz.by_name(&entry("S")?).context("reading S")?;
        let vnuc: Array0<f64> = npz.by_name(&entry("Vnuc")?).context("reading Vnuc")?;

        Ok(Self {
            core_hamiltonian: square_matrix("h", &h)?,
            electron: electron_tensor(&g)?,
            overlap: square_matrix("S", &s)?,
            nuclear_repulsion: vnuc.into_scalar(),
        })
    }

    /// Reads a json document of the form
    /// `{"h": [[..]], "g": [[[[..]]]], "S": [[..]], "Vnuc": 0.0}`
    pub fn from_json(reader: impl Read) -> Result<Self> {
        let config: ConfigIntegrals = serde_json::from_reader(reader)?;
        config.try_into()
    }
}

#[derive(Deserialize)]
struct ConfigIntegrals {
    h: Vec<Vec<f64>>,
    g: Vec<Vec<Vec<Vec<f64>>>>,
    #[serde(rename = "S")]
    s: Vec<Vec<f64>>,
    #[serde(rename = "Vnuc")]
    vnuc: f64,
}

impl TryFrom<ConfigIntegrals> for IntegralArchive {
    type Error = anyhow::Error;

    fn try_from(value: ConfigIntegrals) -> Result<Self> {
        let h = nested_matrix("h", value.h)?;
        let s = nested_matrix("S", value.s)?;

        let n = value.g.len();
        ensure!(
            value.g.iter().all(|i| i.len() == n)
                && value.g.iter().flatten().all(|j| j.len() == n)
                && value.g.iter().flatten().flatten().all(|k| k.len() == n),
            "g is not a {n}×{n}×{n}×{n} tensor"
        );
        let data = value.g.into_iter().flatten().flatten().flatten().collect();

        Ok(Self {
            core_hamiltonian: square_matrix("h", &h)?,
            electron: ElectronTensor::from_row_major(n, data)?,
            overlap: square_matrix("S", &s)?,
            nuclear_repulsion: value.vnuc,
        })
    }
}

fn nested_matrix(name: &str, rows: Vec<Vec<f64>>) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    ensure!(
        rows.iter().all(|row| row.len() == n_cols),
        "{name} has rows of different lengths"
    );

    Ok(Array2::from_shape_vec(
        (n_rows, n_cols),
        rows.into_iter().flatten().collect(),
    )?)
}

fn square_matrix(name: &str, array: &Array2<f64>) -> Result<DMatrix<f64>> {
    let (rows, cols) = array.dim();
    ensure!(rows == cols, "{name} is not square ({rows}×{cols})");
    Ok(DMatrix::from_fn(rows, cols, |i, j| array[[i, j]]))
}

fn electron_tensor(array: &Array4<f64>) -> Result<ElectronTensor> {
    let (i, j, k, l) = array.dim();
    ensure!(
        i == j && j == k && k == l,
        "g is not a hypercube ({i}×{j}×{k}×{l})"
    );
    Ok(ElectronTensor::from_fn(i, |i, j, k, l| array[[i, j, k, l]]))
}
