//! Monte Carlo photon transport for Positron Emission Tomography (PET)
//! imaging studies.
//!
//! `gray` generates nuclear decays from configured radioactive source
//! geometries, propagates the resulting gamma photons through a scene of
//! materials with energy-dependent interaction cross-sections via a
//! k-d-tree accelerated transport loop, and feeds the resulting
//! `Interaction` stream through a composable DAQ pipeline that emulates
//! the electronics of a PET scanner.
#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

pub mod daq;
pub mod error;
pub mod geometry;
pub mod isotope;
pub mod kdtree;
pub mod material;
pub mod photon;
pub mod rng;
pub mod scene;
pub mod scheduler;
pub mod source;
pub mod transport;

pub use error::{GrayError, Result};
