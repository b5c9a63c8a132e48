//! # SuMD Core Library
//!
//! An iterative, distance-supervised molecular dynamics (SuMD) controller. Each
//! iteration runs several short, independent simulations of a peptide/protein
//! complex in parallel, scores them by the center-of-mass distance between the
//! two partners, and continues from the best one until the complex is docked or
//! the iteration budget runs out.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless data models (`StructureSnapshot`,
//!   `AtomGroupSelector`), coordinate readers and the distance metric.
//!
//! - **[`engine`]: The Logic Core.** The external MD stage adapter, the sample
//!   worker, the parallel batch runner and the run state machine.
//!
//! - **[`workflows`]: The Public API.** The convergence loop and the complete
//!   run entry point used by the command-line tool.

pub mod core;
pub mod engine;
pub mod workflows;
