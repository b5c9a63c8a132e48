#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumd::core::models::selection::AtomGroupSelector;
use sumd::core::models::snapshot::{StructureFormat, StructureSnapshot};
use sumd::engine::config::{SumdConfig, SumdConfigBuilder};
use sumd::engine::stage::gromacs::list_topology;
use sumd::engine::stage::{Stage, StageEngine, StageFailure, StageOutput};

/// What the scripted engine does for one stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Succeed and leave the groups this many nanometres apart.
    Distance(f64),
    /// Exit with an engine error.
    Fail(&'static str),
    /// Never finish.
    Hang,
    /// Panic inside the stage.
    Panic,
    /// Sleep, then succeed at the given distance.
    Delayed(Duration, f64),
    /// Succeed, but leave only a GRO file with no chain-aware companion.
    BareGro(f64),
}

/// A recorded stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCall {
    pub stage: Stage,
    pub iteration: usize,
    pub sample: Option<usize>,
    pub workdir: PathBuf,
}

impl StageCall {
    pub fn is_md(&self) -> bool {
        matches!(self.stage, Stage::MdSegment { .. })
    }
}

type Script = Box<dyn Fn(&StageCall) -> Step + Send + Sync>;

/// An in-process stage engine that writes synthetic two-residue structures.
///
/// Residue 1 of chain A sits at the origin and residue 1 of chain B on the x
/// axis. Outputs mirror the GROMACS engine: a GRO file plus a PDB companion.
pub struct ScriptedEngine {
    script: Script,
    calls: Mutex<Vec<StageCall>>,
}

impl ScriptedEngine {
    pub fn new(script: impl Fn(&StageCall) -> Step + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<StageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn md_calls(&self) -> Vec<StageCall> {
        self.calls().into_iter().filter(StageCall::is_md).collect()
    }
}

#[async_trait]
impl StageEngine for ScriptedEngine {
    async fn run_stage(
        &self,
        stage: &Stage,
        _input: &StructureSnapshot,
        workdir: &Path,
    ) -> Result<StageOutput, StageFailure> {
        let call = StageCall {
            stage: stage.clone(),
            iteration: index_of(workdir, "iteration_").unwrap_or(0),
            sample: index_of(workdir, "sample_"),
            workdir: workdir.to_path_buf(),
        };
        self.calls.lock().unwrap().push(call.clone());

        let deffnm = match stage {
            Stage::Prepare => "solv_ions",
            Stage::Minimize => "em",
            Stage::MdSegment { .. } => "md",
        };
        let distance = match (self.script)(&call) {
            Step::Distance(d) => d,
            Step::BareGro(d) => {
                let gro = workdir.join(format!("{deffnm}.gro"));
                std::fs::write(&gro, gro_text(d)).unwrap();
                return Ok(StageOutput::structure(StructureSnapshot::new(
                    gro,
                    StructureFormat::Gro,
                )));
            }
            Step::Fail(diagnostic) => {
                return Err(StageFailure::ExitStatus {
                    step: format!("scripted {}", stage),
                    status: "exit status: 1".to_string(),
                    diagnostic: diagnostic.to_string(),
                });
            }
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("hanging stage was not cancelled");
            }
            Step::Panic => panic!("scripted panic in {}", stage),
            Step::Delayed(delay, d) => {
                tokio::time::sleep(delay).await;
                d
            }
        };

        let structure = write_complex(workdir, deffnm, distance);
        let topology = if *stage == Stage::Prepare {
            std::fs::write(workdir.join("topol.top"), "#include \"posre.itp\"\n").unwrap();
            std::fs::write(workdir.join("posre.itp"), "; restraints\n").unwrap();
            list_topology(workdir).await?
        } else {
            Vec::new()
        };
        Ok(StageOutput {
            structure,
            topology,
        })
    }
}

/// Parses `N` from the nearest `<prefix>N` component of `path`.
fn index_of(path: &Path, prefix: &str) -> Option<usize> {
    path.components()
        .rev()
        .filter_map(|c| c.as_os_str().to_str())
        .find_map(|name| name.strip_prefix(prefix)?.parse().ok())
}

pub fn peptide() -> AtomGroupSelector {
    AtomGroupSelector::residues("peptide", 'B', [1])
}

pub fn protein() -> AtomGroupSelector {
    AtomGroupSelector::residues("protein", 'A', [1])
}

/// Both chains start at residue 1, so the GRO alone cannot tell the groups
/// apart.
pub fn gro_text(distance_nm: f64) -> String {
    format!(
        "synthetic complex\n    2\n\
         \x20   1ALA     CA    1   0.000   0.000   0.000\n\
         \x20   1GLY     CA    2{:>8.3}   0.000   0.000\n\
         \x20  9.00000   9.00000   9.00000\n",
        distance_nm
    )
}

pub fn pdb_text(distance_nm: f64) -> String {
    format!(
        "ATOM      1  CA  ALA A   1       0.000   0.000   0.000  1.00  0.00           C\n\
         ATOM      2  CA  GLY B   1    {:>8.3}   0.000   0.000  1.00  0.00           C\n\
         END\n",
        distance_nm * 10.0
    )
}

/// Writes `<stem>.gro` with a `<stem>.pdb` companion at the given separation.
pub fn write_complex(dir: &Path, stem: &str, distance_nm: f64) -> StructureSnapshot {
    std::fs::create_dir_all(dir).unwrap();
    let gro = dir.join(format!("{stem}.gro"));
    let pdb = dir.join(format!("{stem}.pdb"));
    std::fs::write(&gro, gro_text(distance_nm)).unwrap();
    std::fs::write(&pdb, pdb_text(distance_nm)).unwrap();
    StructureSnapshot::new(gro, StructureFormat::Gro)
        .with_companion(StructureSnapshot::new(pdb, StructureFormat::Pdb))
}

/// Writes a prepared GRO input with its topology and chain-aware PDB, and
/// returns the GRO path.
pub fn write_prepared_input(dir: &Path, distance_nm: f64) -> PathBuf {
    let path = write_complex(&dir.join("input"), "start", distance_nm).path().to_path_buf();
    std::fs::write(dir.join("input").join("topol.top"), "; prepared\n").unwrap();
    path
}

/// Writes a raw PDB input and returns its path.
pub fn write_raw_input(dir: &Path, distance_nm: f64) -> PathBuf {
    let input_dir = dir.join("input");
    std::fs::create_dir_all(&input_dir).unwrap();
    let path = input_dir.join("complex.pdb");
    std::fs::write(&path, pdb_text(distance_nm)).unwrap();
    path
}

pub fn config_builder(input: PathBuf, output_dir: PathBuf) -> SumdConfigBuilder {
    SumdConfigBuilder::new()
        .input_structure(input)
        .output_dir(output_dir)
        .peptide(peptide())
        .protein(protein())
        .num_samples(4)
        .max_workers(4)
        .segment_length_ns(0.1)
        .seed(42)
        .per_sample_timeout(Duration::from_secs(30))
}

pub fn config(input: PathBuf, output_dir: PathBuf) -> SumdConfig {
    config_builder(input, output_dir).build().unwrap()
}
