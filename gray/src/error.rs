//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while constructing or running a simulation.
#[derive(Debug, Error)]
pub enum GrayError {
    /// A primitive referenced a material index outside the scene's material list.
    #[error("material index {0} is out of range")]
    InvalidMaterialIndex(usize),

    /// A source's precomputed material stack was empty at construction time.
    #[error("source {0} has an empty material stack")]
    EmptyMaterialStack(usize),

    /// The k-d tree builder was given zero primitives.
    #[error("cannot build a k-d tree over an empty primitive list")]
    EmptyScene,

    /// A DAQ stage was configured with a non-positive window width.
    #[error("DAQ stage {0} requires a positive window width")]
    InvalidWindow(&'static str),

    /// A positron range model was configured with a non-positive maximum range.
    #[error("positron range model requires a positive maximum range")]
    InvalidRangeModel,

    /// Catch-all for errors from external collaborators.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias for fallible results in this crate.
pub type Result<T> = std::result::Result<T, GrayError>;
