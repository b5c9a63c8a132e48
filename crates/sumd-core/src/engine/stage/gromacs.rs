use super::command::GmxCommand;
use super::mdp::RunParameters;
use super::{Stage, StageEngine, StageFailure, StageOutput, is_topology_artifact};
use crate::core::models::snapshot::{StructureFormat, StructureSnapshot};
use crate::engine::config::EngineConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const PREPARED_GRO: &str = "complex.gro";
const TOPOLOGY: &str = "topol.top";
const SOLVENT_BOX: &str = "spc216.gro";

/// Runs pipeline stages with the GROMACS command-line tools.
#[derive(Debug, Clone)]
pub struct GromacsEngine {
    config: EngineConfig,
}

impl GromacsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn gmx(&self, tool: &'static str, workdir: &Path) -> GmxCommand {
        GmxCommand::new(&self.config.gmx_executable, tool, workdir)
    }

    #[instrument(skip_all, name = "prepare_stage", fields(workdir = %workdir.display()))]
    async fn prepare(
        &self,
        input: &StructureSnapshot,
        workdir: &Path,
    ) -> Result<StageOutput, StageFailure> {
        let local_input = stage_input(input, workdir).await?;
        let input_name = file_name_of(&local_input);

        self.generate_topology(&input_name, workdir).await?;

        self.gmx("editconf", workdir)
            .opt("-f", PREPARED_GRO)
            .opt("-o", "box.gro")
            .arg("-c")
            .opt("-d", self.config.box_margin_nm.to_string())
            .opt("-bt", "cubic")
            .expect_output("box.gro")
            .run()
            .await?;

        self.gmx("solvate", workdir)
            .opt("-cp", "box.gro")
            .opt("-cs", SOLVENT_BOX)
            .opt("-o", "solv.gro")
            .opt("-p", TOPOLOGY)
            .expect_output("solv.gro")
            .run()
            .await?;

        RunParameters::ions()
            .write_to(&workdir.join("ions.mdp"))
            .await
            .map_err(|e| StageFailure::io("writing ions.mdp", e))?;
        self.grompp(workdir, "ions.mdp", Path::new("solv.gro"), "ions.tpr")
            .await?;

        self.gmx("genion", workdir)
            .opt("-s", "ions.tpr")
            .opt("-o", "solv_ions.gro")
            .opt("-p", TOPOLOGY)
            .opt("-pname", "NA")
            .opt("-nname", "CL")
            .arg("-neutral")
            .stdin("SOL")
            .expect_output("solv_ions.gro")
            .run()
            .await?;

        let topology = list_topology(workdir).await?;
        // Center-of-mass separation is translation invariant, so the raw
        // input scores the same as the centered, solvated system.
        let companion = StructureSnapshot::new(&local_input, StructureFormat::Pdb);
        let structure = StructureSnapshot::new(workdir.join("solv_ions.gro"), StructureFormat::Gro)
            .with_companion(companion);

        Ok(StageOutput {
            structure,
            topology,
        })
    }

    /// Runs `pdb2gmx` with each force field in turn until one yields both the
    /// coordinate file and the topology.
    async fn generate_topology(
        &self,
        input_name: &str,
        workdir: &Path,
    ) -> Result<(), StageFailure> {
        for forcefield in &self.config.forcefields {
            for stale in [PREPARED_GRO, TOPOLOGY] {
                let _ = tokio::fs::remove_file(workdir.join(stale)).await;
            }

            info!("Generating topology with force field '{}'.", forcefield);
            let result = self
                .gmx("pdb2gmx", workdir)
                .opt("-f", input_name)
                .opt("-o", PREPARED_GRO)
                .opt("-p", TOPOLOGY)
                .opt("-water", &self.config.water_model)
                .opt("-ff", forcefield)
                .arg("-ignh")
                .run()
                .await;

            let produced = exists(&workdir.join(PREPARED_GRO)).await
                && exists(&workdir.join(TOPOLOGY)).await;
            match (result, produced) {
                (_, true) => {
                    info!("Force field '{}' accepted.", forcefield);
                    return Ok(());
                }
                (Err(e), false) => warn!("Force field '{}' failed: {}", forcefield, e),
                (Ok(()), false) => warn!(
                    "Force field '{}' ran but did not produce {} and {}.",
                    forcefield, PREPARED_GRO, TOPOLOGY
                ),
            }
        }
        Err(StageFailure::NoForcefieldSucceeded {
            tried: self.config.forcefields.clone(),
        })
    }

    async fn grompp(
        &self,
        workdir: &Path,
        mdp: &str,
        coordinates: &Path,
        tpr: &str,
    ) -> Result<(), StageFailure> {
        self.gmx("grompp", workdir)
            .opt("-f", mdp)
            .opt("-c", coordinates)
            .opt("-p", TOPOLOGY)
            .opt("-o", tpr)
            .opt("-maxwarn", self.config.max_warnings.to_string())
            .expect_output(tpr)
            .run()
            .await
    }

    async fn mdrun(&self, workdir: &Path, deffnm: &str) -> Result<(), StageFailure> {
        self.gmx("mdrun", workdir)
            .opt("-deffnm", deffnm)
            .opt("-ntmpi", "1")
            .opt("-ntomp", self.config.threads_per_sample.to_string())
            .expect_output(format!("{deffnm}.gro"))
            .run()
            .await
    }

    /// Compiles `params` against the working-directory topology, runs the
    /// engine and returns `<deffnm>.gro` with its chain-aware companion.
    async fn simulate(
        &self,
        params: RunParameters,
        deffnm: &str,
        input: &StructureSnapshot,
        workdir: &Path,
    ) -> Result<StageOutput, StageFailure> {
        let mdp = format!("{deffnm}.mdp");
        let tpr = format!("{deffnm}.tpr");
        params
            .write_to(&workdir.join(&mdp))
            .await
            .map_err(|e| StageFailure::io(format!("writing {mdp}"), e))?;

        self.grompp(workdir, &mdp, input.path(), &tpr).await?;
        self.mdrun(workdir, deffnm).await?;

        let gro = workdir.join(format!("{deffnm}.gro"));
        let structure = StructureSnapshot::new(&gro, StructureFormat::Gro);
        Ok(StageOutput::structure(
            match self.export_companion(workdir, deffnm).await {
                Some(companion) => structure.with_companion(companion),
                None => structure,
            },
        ))
    }

    /// Writes `<deffnm>.pdb` from the run input so chain identifiers survive.
    /// Without it the stage output is a bare GRO, which scores as infinite.
    async fn export_companion(&self, workdir: &Path, deffnm: &str) -> Option<StructureSnapshot> {
        let pdb = format!("{deffnm}.pdb");
        let result = self
            .gmx("trjconv", workdir)
            .opt("-s", format!("{deffnm}.tpr"))
            .opt("-f", format!("{deffnm}.gro"))
            .opt("-o", &pdb)
            .opt("-pbc", "mol")
            .stdin("System")
            .expect_output(&pdb)
            .run()
            .await;

        match result {
            Ok(()) => Some(StructureSnapshot::new(workdir.join(pdb), StructureFormat::Pdb)),
            Err(e) => {
                warn!(
                    "Could not export chain-aware structure for '{}'; it will not be scored: {}",
                    deffnm, e
                );
                None
            }
        }
    }
}

#[async_trait]
impl StageEngine for GromacsEngine {
    async fn run_stage(
        &self,
        stage: &Stage,
        input: &StructureSnapshot,
        workdir: &Path,
    ) -> Result<StageOutput, StageFailure> {
        match stage {
            Stage::Prepare => self.prepare(input, workdir).await,
            Stage::Minimize => {
                self.simulate(RunParameters::minimization(), "em", input, workdir)
                    .await
            }
            Stage::MdSegment { length_ns, seed } => {
                self.simulate(RunParameters::md_segment(*length_ns, *seed), "md", input, workdir)
                    .await
            }
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Copies the input structure into `workdir` unless it already lives there.
async fn stage_input(input: &StructureSnapshot, workdir: &Path) -> Result<PathBuf, StageFailure> {
    let name = input
        .path()
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("input.{}", input.format().extension())));
    let target = workdir.join(name);
    if input.path() != target {
        tokio::fs::copy(input.path(), &target)
            .await
            .map_err(|e| {
                StageFailure::io(format!("copying {} into {}", input, workdir.display()), e)
            })?;
    }
    Ok(target)
}

/// Lists `topol.top` and every `*.itp` in `dir`, sorted by name.
pub async fn list_topology(dir: &Path) -> Result<Vec<PathBuf>, StageFailure> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StageFailure::io(format!("listing {}", dir.display()), e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StageFailure::io(format!("listing {}", dir.display()), e))?
    {
        let path = entry.path();
        if is_topology_artifact(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn list_topology_finds_top_and_itp_files() {
        let dir = tempdir().unwrap();
        for name in ["topol.top", "posre.itp", "complex.gro", "em.mdp"] {
            tokio::fs::write(dir.path().join(name), "").await.unwrap();
        }
        let files = list_topology(dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|p| file_name_of(p)).collect();
        assert_eq!(names, vec!["posre.itp", "topol.top"]);
    }

    #[tokio::test]
    async fn stage_input_copies_into_workdir_once() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let input_path = src.path().join("complex.pdb");
        tokio::fs::write(&input_path, "END\n").await.unwrap();
        let input = StructureSnapshot::new(&input_path, StructureFormat::Pdb);

        let staged = stage_input(&input, work.path()).await.unwrap();
        assert_eq!(staged, work.path().join("complex.pdb"));
        assert!(staged.is_file());

        let again = stage_input(&StructureSnapshot::new(&staged, StructureFormat::Pdb), work.path())
            .await
            .unwrap();
        assert_eq!(again, staged);
    }

    #[tokio::test]
    async fn exhausting_forcefields_reports_every_attempt() {
        let work = tempdir().unwrap();
        tokio::fs::write(work.path().join("complex.pdb"), "END\n").await.unwrap();
        let engine = GromacsEngine::new(EngineConfig {
            gmx_executable: PathBuf::from("/nonexistent/gmx"),
            forcefields: vec!["ff-a".into(), "ff-b".into()],
            ..EngineConfig::default()
        });
        let input = StructureSnapshot::new(work.path().join("complex.pdb"), StructureFormat::Pdb);

        let result = engine.run_stage(&Stage::Prepare, &input, work.path()).await;
        match result {
            Err(StageFailure::NoForcefieldSucceeded { tried }) => {
                assert_eq!(tried, vec!["ff-a", "ff-b"])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn minimize_with_missing_engine_fails_cleanly() {
        let work = tempdir().unwrap();
        tokio::fs::write(work.path().join("input.gro"), "t\n    0\n   1 1 1\n").await.unwrap();
        let engine = GromacsEngine::new(EngineConfig {
            gmx_executable: PathBuf::from("/nonexistent/gmx"),
            ..EngineConfig::default()
        });
        let input = StructureSnapshot::new(work.path().join("input.gro"), StructureFormat::Gro);

        let result = engine.run_stage(&Stage::Minimize, &input, work.path()).await;
        assert!(matches!(result, Err(StageFailure::Launch { .. })));
        assert!(work.path().join("em.mdp").is_file());
    }
}
