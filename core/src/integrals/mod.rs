pub mod electron_tensor;

pub use electron_tensor::ElectronTensor;
