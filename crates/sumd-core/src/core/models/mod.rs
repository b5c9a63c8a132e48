//! # Core Models Module
//!
//! Plain data types shared by every layer of the sampling pipeline.
//!
//! - [`atom`] - Coordinate records read from structure files
//! - [`selection`] - Named residue groups (peptide / protein) used by the distance metric
//! - [`snapshot`] - Immutable references to structure files produced by pipeline stages

pub mod atom;
pub mod selection;
pub mod snapshot;
