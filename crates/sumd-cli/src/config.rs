pub mod defaults;

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sumd::core::models::selection::AtomGroupSelector;
use sumd::engine::config::{self as core_config, EngineConfig};
use tracing::debug;

/// A length written either as a bare number of nanometres or as text with a unit.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum PartialLength {
    Nanometres(f64),
    Text(String),
}

impl PartialLength {
    fn to_nm(&self, key: &str) -> Result<f64> {
        match self {
            PartialLength::Nanometres(nm) if nm.is_finite() && *nm > 0.0 => Ok(*nm),
            PartialLength::Nanometres(nm) => Err(CliError::Config(format!(
                "Invalid value for '{}': length must be positive, got {}",
                key, nm
            ))),
            PartialLength::Text(text) => parser::parse_length_nm(text)
                .map_err(|e| CliError::Config(format!("Invalid value for '{}': {}", key, e))),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialGroupConfig {
    chain: Option<char>,
    residues: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSamplingConfig {
    #[serde(rename = "num-samples")]
    num_samples: Option<usize>,
    #[serde(rename = "max-workers")]
    max_workers: Option<usize>,
    #[serde(rename = "segment-length-ns")]
    segment_length_ns: Option<f64>,
    #[serde(rename = "timeout-secs")]
    timeout_secs: Option<u64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialConvergenceConfig {
    threshold: Option<PartialLength>,
    #[serde(rename = "md-gate")]
    md_gate: Option<PartialLength>,
    #[serde(rename = "max-iterations")]
    max_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialEngineConfig {
    gmx: Option<PathBuf>,
    forcefield: Option<String>,
    #[serde(rename = "water-model")]
    water_model: Option<String>,
    #[serde(rename = "box-margin-nm")]
    box_margin_nm: Option<f64>,
    #[serde(rename = "max-warnings")]
    max_warnings: Option<u32>,
    #[serde(rename = "threads-per-sample")]
    threads_per_sample: Option<usize>,
}

/// The `run` configuration as read from a TOML file, before CLI overrides.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    #[serde(rename = "output-dir")]
    output_dir: Option<PathBuf>,
    peptide: Option<PartialGroupConfig>,
    protein: Option<PartialGroupConfig>,
    sampling: Option<PartialSamplingConfig>,
    convergence: Option<PartialConvergenceConfig>,
    engine: Option<PartialEngineConfig>,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Resolves the final configuration.
    ///
    /// Precedence, highest first: explicit CLI flags, `--set` values, the
    /// config file, built-in defaults. The output directory is returned as
    /// given; timestamping is the caller's concern.
    pub fn merge_with_cli(mut self, args: &RunArgs) -> Result<core_config::SumdConfig> {
        self.apply_set_values(&args.set_values)?;

        let peptide_file = self.peptide.take().unwrap_or_default();
        let protein_file = self.protein.take().unwrap_or_default();
        let sampling = self.sampling.take().unwrap_or_default();
        let convergence = self.convergence.take().unwrap_or_default();
        let engine = self.engine.take().unwrap_or_default();

        let peptide = group_selector(
            defaults::PEPTIDE_GROUP,
            args.groups.peptide_chain.or(peptide_file.chain),
            args.groups
                .peptide_residues
                .as_deref()
                .or(peptide_file.residues.as_deref()),
        )?;
        let protein = group_selector(
            defaults::PROTEIN_GROUP,
            args.groups.protein_chain.or(protein_file.chain),
            args.groups
                .protein_residues
                .as_deref()
                .or(protein_file.residues.as_deref()),
        )?;

        let output_dir = args
            .output_dir
            .clone()
            .or(self.output_dir.take())
            .unwrap_or_else(|| PathBuf::from(defaults::DEFAULT_OUTPUT_DIR));

        let mut builder = core_config::SumdConfigBuilder::new()
            .input_structure(args.input.clone())
            .output_dir(output_dir)
            .peptide(peptide)
            .protein(protein)
            .engine(Self::merge_engine(args, engine));

        if let Some(n) = args.num_samples.or(sampling.num_samples) {
            builder = builder.num_samples(n);
        }
        if let Some(n) = args.max_workers.or(sampling.max_workers) {
            builder = builder.max_workers(n);
        }
        if let Some(ns) = args.segment_length.or(sampling.segment_length_ns) {
            builder = builder.segment_length_ns(ns);
        }
        if let Some(secs) = args.timeout.or(sampling.timeout_secs) {
            builder = builder.per_sample_timeout(Duration::from_secs(secs));
        }
        if let Some(seed) = args.seed.or(sampling.seed) {
            builder = builder.seed(seed);
        }
        if let Some(n) = args.max_iterations.or(convergence.max_iterations) {
            builder = builder.max_iterations(n);
        }

        let threshold = match &args.convergence_threshold {
            Some(text) => Some(PartialLength::Text(text.clone())),
            None => convergence.threshold,
        };
        if let Some(length) = threshold {
            builder = builder.convergence_threshold_nm(length.to_nm("convergence.threshold")?);
        }
        let md_gate = match &args.md_gate {
            Some(text) => Some(PartialLength::Text(text.clone())),
            None => convergence.md_gate,
        };
        if let Some(length) = md_gate {
            builder = builder.md_gate_nm(length.to_nm("convergence.md-gate")?);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_engine(args: &RunArgs, partial: PartialEngineConfig) -> EngineConfig {
        let fallback = EngineConfig::default();
        EngineConfig {
            gmx_executable: args
                .gmx
                .clone()
                .or(partial.gmx)
                .unwrap_or(fallback.gmx_executable),
            forcefields: args
                .forcefield
                .as_deref()
                .or(partial.forcefield.as_deref())
                .map(core_config::forcefield_priority)
                .unwrap_or(fallback.forcefields),
            water_model: partial.water_model.unwrap_or(fallback.water_model),
            box_margin_nm: partial.box_margin_nm.unwrap_or(fallback.box_margin_nm),
            max_warnings: partial.max_warnings.unwrap_or(fallback.max_warnings),
            threads_per_sample: partial
                .threads_per_sample
                .unwrap_or(fallback.threads_per_sample),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        if set_values.is_empty() {
            return Ok(());
        }
        for kv_pair in set_values {
            let parts: Vec<_> = kv_pair.splitn(2, '=').collect();
            if parts.len() != 2 {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            }
            let key = parts[0].trim();
            let value_str = parts[1].trim();

            match key {
                "output-dir" => self.output_dir = Some(PathBuf::from(value_str)),
                "peptide.chain" => {
                    self.peptide.get_or_insert_with(Default::default).chain =
                        Some(parse_value(key, value_str)?);
                }
                "peptide.residues" => {
                    self.peptide.get_or_insert_with(Default::default).residues =
                        Some(value_str.to_string());
                }
                "protein.chain" => {
                    self.protein.get_or_insert_with(Default::default).chain =
                        Some(parse_value(key, value_str)?);
                }
                "protein.residues" => {
                    self.protein.get_or_insert_with(Default::default).residues =
                        Some(value_str.to_string());
                }
                "sampling.num-samples" => {
                    self.sampling.get_or_insert_with(Default::default).num_samples =
                        Some(parse_value(key, value_str)?);
                }
                "sampling.max-workers" => {
                    self.sampling.get_or_insert_with(Default::default).max_workers =
                        Some(parse_value(key, value_str)?);
                }
                "sampling.segment-length-ns" => {
                    self.sampling
                        .get_or_insert_with(Default::default)
                        .segment_length_ns = Some(parse_value(key, value_str)?);
                }
                "sampling.timeout-secs" => {
                    self.sampling.get_or_insert_with(Default::default).timeout_secs =
                        Some(parse_value(key, value_str)?);
                }
                "sampling.seed" => {
                    self.sampling.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str)?);
                }
                "convergence.threshold" => {
                    self.convergence.get_or_insert_with(Default::default).threshold =
                        Some(PartialLength::Text(value_str.to_string()));
                }
                "convergence.md-gate" => {
                    self.convergence.get_or_insert_with(Default::default).md_gate =
                        Some(PartialLength::Text(value_str.to_string()));
                }
                "convergence.max-iterations" => {
                    self.convergence
                        .get_or_insert_with(Default::default)
                        .max_iterations = Some(parse_value(key, value_str)?);
                }
                "engine.gmx" => {
                    self.engine.get_or_insert_with(Default::default).gmx =
                        Some(PathBuf::from(value_str));
                }
                "engine.forcefield" => {
                    self.engine.get_or_insert_with(Default::default).forcefield =
                        Some(value_str.to_string());
                }
                "engine.water-model" => {
                    self.engine.get_or_insert_with(Default::default).water_model =
                        Some(value_str.to_string());
                }
                "engine.box-margin-nm" => {
                    self.engine.get_or_insert_with(Default::default).box_margin_nm =
                        Some(parse_value(key, value_str)?);
                }
                "engine.max-warnings" => {
                    self.engine.get_or_insert_with(Default::default).max_warnings =
                        Some(parse_value(key, value_str)?);
                }
                "engine.threads-per-sample" => {
                    self.engine
                        .get_or_insert_with(Default::default)
                        .threads_per_sample = Some(parse_value(key, value_str)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value_str: &str) -> Result<T> {
    value_str.parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: {}", key, value_str))
    })
}

/// Builds an atom group from a chain and an optional residue list.
pub fn group_selector(
    name: &str,
    chain: Option<char>,
    residues: Option<&str>,
) -> Result<AtomGroupSelector> {
    let chain = chain.ok_or_else(|| {
        CliError::Config(format!(
            "A chain for the {} group is required either in the config file or via --{}-chain.",
            name, name
        ))
    })?;
    match residues {
        None => Ok(AtomGroupSelector::chain(name, chain)),
        Some(list) => {
            let residues = parser::parse_residue_list(list)
                .map_err(|e| CliError::Argument(format!("{} residues: {}", name, e)))?;
            Ok(AtomGroupSelector::residues(name, chain, residues))
        }
    }
}
