//! # Workflows Module
//!
//! Top-level entry points of the library. A workflow validates its
//! configuration, wires the engine components together, reports progress and
//! persists the run's results.
//!
//! - **SuMD Workflow** ([`sumd`]) - The iterative sampling and convergence loop,
//!   from a raw or prepared input structure to a terminal run report.

pub mod sumd;
