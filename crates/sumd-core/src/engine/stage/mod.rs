//! The boundary between the sampling controller and the external MD engine.
//!
//! A [`StageEngine`] runs one pipeline stage in a working directory it is
//! given and reports either the produced structure or a [`StageFailure`]. It
//! never returns any other kind of error.

pub mod command;
pub mod gromacs;
pub mod mdp;

use crate::core::models::snapshot::StructureSnapshot;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Topology generation, box, solvation and neutralization of a raw structure.
    Prepare,
    /// Steepest-descent energy minimization.
    Minimize,
    /// A short unrestrained MD segment with freshly generated velocities.
    MdSegment { length_ns: f64, seed: u64 },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Minimize => "minimize",
            Stage::MdSegment { .. } => "md_segment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The artifacts a successful stage leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub structure: StructureSnapshot,
    /// Topology files (`topol.top`, `*.itp`) produced by the stage. Empty for
    /// stages that reuse the topology they were given.
    pub topology: Vec<PathBuf>,
}

impl StageOutput {
    pub fn structure(structure: StructureSnapshot) -> Self {
        Self {
            structure,
            topology: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{step}' exited with {status}: {diagnostic}")]
    ExitStatus {
        step: String,
        status: String,
        diagnostic: String,
    },

    #[error("'{step}' did not produce {path}", path = path.display())]
    MissingArtifact { step: String, path: PathBuf },

    #[error("no_forcefield_succeeded: tried {}", tried.join(", "))]
    NoForcefieldSucceeded { tried: Vec<String> },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StageFailure {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// A short machine-friendly reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            StageFailure::Launch { .. } => "launch_failed",
            StageFailure::ExitStatus { .. } => "engine_error",
            StageFailure::MissingArtifact { .. } => "missing_artifact",
            StageFailure::NoForcefieldSucceeded { .. } => "no_forcefield_succeeded",
            StageFailure::Io { .. } => "io_error",
        }
    }
}

/// Runs individual pipeline stages.
///
/// Implementations must confine all writes to `workdir`. The topology the
/// minimization and MD stages compile against is expected in `workdir` as
/// `topol.top` (plus any included `*.itp`).
#[async_trait]
pub trait StageEngine: Send + Sync {
    async fn run_stage(
        &self,
        stage: &Stage,
        input: &StructureSnapshot,
        workdir: &Path,
    ) -> Result<StageOutput, StageFailure>;
}

/// Whether a file name is a topology artifact (`topol.top` or an include file).
pub fn is_topology_artifact(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name == "topol.top" || name.ends_with(".itp")
}
