/// Spectral basis transformations: whitening of a covariance over its leading
/// principal axes, and discriminant axes from the eigenpairs of the Fisher ratio
/// Sw^-1 Sb. Both reduce to T = V D^-1, where V holds the k leading eigenvectors
/// and D the square roots of their eigenvalues; rank and sign problems are reported
/// as errors rather than producing a degenerate basis.
pub mod spectral;

pub use spectral::{Spectrum, build, build_fisher};
