use crate::core::models::selection::AtomGroupSelector;
use crate::core::models::snapshot::{StructureFormat, StructureSnapshot};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on samples per iteration; keeps derived velocity seeds distinct.
pub const MAX_SAMPLES_PER_ITERATION: usize = 9_999;
/// Upper bound on iterations; keeps derived velocity seeds in the engine's integer range.
pub const MAX_ITERATIONS_LIMIT: usize = 100_000;

pub const DEFAULT_CONVERGENCE_THRESHOLD_NM: f64 = 0.5;
pub const DEFAULT_MD_GATE_NM: f64 = 0.5;
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_NUM_SAMPLES: usize = 5;
pub const DEFAULT_SEGMENT_LENGTH_NS: f64 = 2.0;
pub const DEFAULT_SAMPLE_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_FORCEFIELD: &str = "charmm36-jul2022";
pub const FALLBACK_FORCEFIELDS: [&str; 3] = ["amber99sb-ildn", "gromos54a7", "oplsaa"];
pub const DEFAULT_WATER_MODEL: &str = "tip3p";
pub const DEFAULT_BOX_MARGIN_NM: f64 = 1.0;
pub const DEFAULT_GMX_EXECUTABLE: &str = "gmx";
pub const DEFAULT_MAX_WARNINGS: u32 = 10;
pub const DEFAULT_THREADS_PER_SAMPLE: usize = 1;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },

    #[error("Input structure not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Unsupported structure format (expected .pdb or .gro): {0}")]
    UnsupportedFormat(PathBuf),

    #[error("No topology (topol.top) found next to {0}; GRO input requires a prepared topology")]
    MissingTopology(PathBuf),

    #[error("No chain-aware PDB found at {0}; GRO input has no chain identifiers")]
    MissingCompanion(PathBuf),
}

/// The two interaction partners whose separation drives the run.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupsConfig {
    pub peptide: AtomGroupSelector,
    pub protein: AtomGroupSelector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub num_samples: usize,
    /// Additional cap on concurrent samples; `None` means "CPU count".
    pub max_workers: Option<usize>,
    pub segment_length_ns: f64,
    pub per_sample_timeout: Duration,
    /// Base seed from which per-sample velocity seeds are derived.
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceConfig {
    pub convergence_threshold_nm: f64,
    /// MD escalation gate, compared against the pre-minimization distance.
    pub md_gate_nm: f64,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub gmx_executable: PathBuf,
    /// Force fields tried in order during system preparation.
    pub forcefields: Vec<String>,
    pub water_model: String,
    pub box_margin_nm: f64,
    pub max_warnings: u32,
    pub threads_per_sample: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gmx_executable: PathBuf::from(DEFAULT_GMX_EXECUTABLE),
            forcefields: forcefield_priority(DEFAULT_FORCEFIELD),
            water_model: DEFAULT_WATER_MODEL.to_string(),
            box_margin_nm: DEFAULT_BOX_MARGIN_NM,
            max_warnings: DEFAULT_MAX_WARNINGS,
            threads_per_sample: DEFAULT_THREADS_PER_SAMPLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SumdConfig {
    pub input_structure: PathBuf,
    pub output_dir: PathBuf,
    pub groups: GroupsConfig,
    pub sampling: SamplingConfig,
    pub convergence: ConvergenceConfig,
    pub engine: EngineConfig,
}

impl SumdConfig {
    /// Checks the filesystem-dependent preconditions of a run.
    ///
    /// Returns the input as a snapshot. A GRO input must have a `topol.top`
    /// in the same directory and a PDB of the same stem, which becomes its
    /// scoring companion.
    pub fn resolve_input(&self) -> Result<StructureSnapshot, ConfigError> {
        if !self.input_structure.is_file() {
            return Err(ConfigError::InputNotFound(self.input_structure.clone()));
        }
        let snapshot = StructureSnapshot::from_path(&self.input_structure)
            .ok_or_else(|| ConfigError::UnsupportedFormat(self.input_structure.clone()))?;

        if snapshot.format() == StructureFormat::Gro {
            let dir = self.input_structure.parent().unwrap_or(Path::new("."));
            if !dir.join("topol.top").is_file() {
                return Err(ConfigError::MissingTopology(self.input_structure.clone()));
            }
            let companion = self.input_structure.with_extension(StructureFormat::Pdb.extension());
            if !companion.is_file() {
                return Err(ConfigError::MissingCompanion(companion));
            }
            return Ok(snapshot.with_companion(StructureSnapshot::new(
                companion,
                StructureFormat::Pdb,
            )));
        }
        Ok(snapshot)
    }
}

/// Builds the force-field priority list: the preferred force field first,
/// then the standard fallbacks it does not duplicate.
pub fn forcefield_priority(preferred: &str) -> Vec<String> {
    std::iter::once(preferred)
        .chain(FALLBACK_FORCEFIELDS.iter().copied().filter(|ff| *ff != preferred))
        .map(str::to_string)
        .collect()
}

#[derive(Default)]
pub struct SumdConfigBuilder {
    input_structure: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    peptide: Option<AtomGroupSelector>,
    protein: Option<AtomGroupSelector>,
    num_samples: Option<usize>,
    max_workers: Option<usize>,
    segment_length_ns: Option<f64>,
    per_sample_timeout: Option<Duration>,
    seed: Option<u64>,
    convergence_threshold_nm: Option<f64>,
    md_gate_nm: Option<f64>,
    max_iterations: Option<usize>,
    engine: Option<EngineConfig>,
}

impl SumdConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_structure(mut self, path: PathBuf) -> Self {
        self.input_structure = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn peptide(mut self, group: AtomGroupSelector) -> Self {
        self.peptide = Some(group);
        self
    }
    pub fn protein(mut self, group: AtomGroupSelector) -> Self {
        self.protein = Some(group);
        self
    }
    pub fn num_samples(mut self, n: usize) -> Self {
        self.num_samples = Some(n);
        self
    }
    pub fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = Some(n);
        self
    }
    pub fn segment_length_ns(mut self, ns: f64) -> Self {
        self.segment_length_ns = Some(ns);
        self
    }
    pub fn per_sample_timeout(mut self, timeout: Duration) -> Self {
        self.per_sample_timeout = Some(timeout);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn convergence_threshold_nm(mut self, nm: f64) -> Self {
        self.convergence_threshold_nm = Some(nm);
        self
    }
    pub fn md_gate_nm(mut self, nm: f64) -> Self {
        self.md_gate_nm = Some(nm);
        self
    }
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Assembles and validates the configuration.
    ///
    /// Input, output directory and both groups are required; every other
    /// parameter falls back to its `DEFAULT_*` value.
    pub fn build(self) -> Result<SumdConfig, ConfigError> {
        let config = SumdConfig {
            input_structure: self
                .input_structure
                .ok_or(ConfigError::MissingParameter("input_structure"))?,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            groups: GroupsConfig {
                peptide: self.peptide.ok_or(ConfigError::MissingParameter("peptide"))?,
                protein: self.protein.ok_or(ConfigError::MissingParameter("protein"))?,
            },
            sampling: SamplingConfig {
                num_samples: self.num_samples.unwrap_or(DEFAULT_NUM_SAMPLES),
                max_workers: self.max_workers,
                segment_length_ns: self.segment_length_ns.unwrap_or(DEFAULT_SEGMENT_LENGTH_NS),
                per_sample_timeout: self.per_sample_timeout.unwrap_or(DEFAULT_SAMPLE_TIMEOUT),
                seed: self.seed.unwrap_or(0),
            },
            convergence: ConvergenceConfig {
                convergence_threshold_nm: self
                    .convergence_threshold_nm
                    .unwrap_or(DEFAULT_CONVERGENCE_THRESHOLD_NM),
                md_gate_nm: self.md_gate_nm.unwrap_or(DEFAULT_MD_GATE_NM),
                max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            },
            engine: self.engine.unwrap_or_default(),
        };
        validate(&config)?;
        Ok(config)
    }
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

fn require_positive_length(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, format!("must be a positive length, got {value}")))
    }
}

fn validate(config: &SumdConfig) -> Result<(), ConfigError> {
    for (parameter, group) in [
        ("peptide", &config.groups.peptide),
        ("protein", &config.groups.protein),
    ] {
        if group.residues.is_empty() {
            return Err(invalid(parameter, "residue list is empty"));
        }
    }

    let sampling = &config.sampling;
    if !(1..=MAX_SAMPLES_PER_ITERATION).contains(&sampling.num_samples) {
        return Err(invalid(
            "num_samples",
            format!("must be between 1 and {MAX_SAMPLES_PER_ITERATION}"),
        ));
    }
    if sampling.max_workers == Some(0) {
        return Err(invalid("max_workers", "must be at least 1"));
    }
    require_positive_length("segment_length_ns", sampling.segment_length_ns)?;
    if sampling.per_sample_timeout.is_zero() {
        return Err(invalid("per_sample_timeout", "must be greater than zero"));
    }

    let convergence = &config.convergence;
    require_positive_length("convergence_threshold_nm", convergence.convergence_threshold_nm)?;
    require_positive_length("md_gate_nm", convergence.md_gate_nm)?;
    if !(1..=MAX_ITERATIONS_LIMIT).contains(&convergence.max_iterations) {
        return Err(invalid(
            "max_iterations",
            format!("must be between 1 and {MAX_ITERATIONS_LIMIT}"),
        ));
    }

    let engine = &config.engine;
    if engine.forcefields.is_empty() {
        return Err(invalid("forcefields", "at least one force field is required"));
    }
    if engine.forcefields.iter().any(|ff| ff.trim().is_empty()) {
        return Err(invalid("forcefields", "force-field names must not be blank"));
    }
    require_positive_length("box_margin_nm", engine.box_margin_nm)?;
    if engine.threads_per_sample == 0 {
        return Err(invalid("threads_per_sample", "must be at least 1"));
    }
    if engine.gmx_executable.as_os_str().is_empty() {
        return Err(invalid("gmx_executable", "must not be empty"));
    }

    Ok(())
}
