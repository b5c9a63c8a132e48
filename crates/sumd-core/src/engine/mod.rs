//! # Engine Module
//!
//! The stateful machinery of a SuMD run: configuration, the MD stage adapter,
//! the per-sample worker, the parallel batch runner and the run state the
//! controller threads through its loop.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run parameters, defaults and validation
//! - **Stage Adapter** ([`stage`]) - The [`stage::StageEngine`] seam and its GROMACS implementation
//! - **Sample Worker** ([`worker`]) - Minimize, gate and MD for one sample, errors folded into
//!   the result
//! - **Batch Runner** ([`batch`]) - Bounded work queue, fixed worker pool, per-sample timeout
//! - **State Tracking** ([`state`]) - Sample results, iteration outcomes, selection and the run
//!   state machine
//! - **Reports** ([`report`]) - Iteration summaries, `report.toml` and `distances.csv`
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-level error types
//!
//! Samples of one iteration run concurrently as external processes; iterations
//! are strictly sequential.

pub mod batch;
pub mod config;
pub mod error;
pub mod progress;
pub mod report;
pub mod stage;
pub mod state;
pub mod worker;
