//! # Core Module
//!
//! Stateless building blocks shared by the sampling engine: the structure data
//! model, coordinate-file readers and the distance metric that drives every
//! selection decision.
//!
//! - **Molecular Representation** ([`models`]) - Atom records, structure snapshots and
//!   atom-group selectors
//! - **File I/O** ([`io`]) - Lenient PDB and GRO coordinate readers
//! - **Convergence Metric** ([`metrics`]) - Center-of-mass separation between two atom groups
//! - **Utilities** ([`utils`]) - Small geometric helpers
//!
//! Nothing in this module spawns processes or writes files.

pub mod io;
pub mod metrics;
pub mod models;
pub mod utils;
