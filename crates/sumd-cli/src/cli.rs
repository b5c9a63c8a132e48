use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "SuMD CLI - Supervised MD sampling of peptide/protein binding with GROMACS.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run iterative supervised MD until the peptide reaches the binding site.
    Run(RunArgs),
    /// Compute the center-of-mass distance between the two groups of one structure.
    Distance(DistanceArgs),
}

/// The peptide and protein atom groups.
#[derive(Args, Debug, Clone, Default)]
pub struct GroupArgs {
    /// Chain identifier of the peptide.
    #[arg(long, value_name = "CHAIN")]
    pub peptide_chain: Option<char>,

    /// Restrict the peptide to these residues (e.g., '1-10,15'). Defaults to the whole chain.
    #[arg(long, value_name = "LIST")]
    pub peptide_residues: Option<String>,

    /// Chain identifier of the protein.
    #[arg(long, value_name = "CHAIN")]
    pub protein_chain: Option<char>,

    /// Restrict the protein to these residues, e.g. the binding site. Defaults to the whole chain.
    #[arg(long, value_name = "LIST")]
    pub protein_residues: Option<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Input structure: a raw PDB complex, or a prepared GRO with topol.top next to it.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub groups: GroupArgs,

    /// Base output directory. A '_YYYYmmdd_HHMMSS' suffix is appended unless
    /// --exact-output-dir is set.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Use the output directory exactly as given, without a timestamp suffix.
    #[arg(long)]
    pub exact_output_dir: bool,

    // --- Convergence Overrides ---
    /// Distance at which the complex counts as docked (e.g., '0.5nm', '5A'; bare numbers are nm).
    #[arg(long, value_name = "LEN")]
    pub convergence_threshold: Option<String>,

    /// Samples whose input distance exceeds this gate skip the MD segment (e.g., '5A').
    #[arg(long, value_name = "LEN")]
    pub md_gate: Option<String>,

    /// Maximum number of iterations.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    // --- Sampling Overrides ---
    /// Number of independent samples per iteration.
    #[arg(short, long, value_name = "INT")]
    pub num_samples: Option<usize>,

    /// Length of each MD segment in nanoseconds.
    #[arg(long, value_name = "NS")]
    pub segment_length: Option<f64>,

    /// Per-sample timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of samples running at once.
    #[arg(long, value_name = "INT")]
    pub max_workers: Option<usize>,

    /// Base seed for velocity generation.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Engine Overrides ---
    /// Preferred force field; standard fallbacks are tried after it.
    #[arg(long, value_name = "NAME")]
    pub forcefield: Option<String>,

    /// Path to the GROMACS executable.
    #[arg(long, value_name = "PATH")]
    pub gmx: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S sampling.num-samples=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `distance` subcommand.
#[derive(Args, Debug)]
pub struct DistanceArgs {
    /// Structure file (.pdb or .gro).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    #[command(flatten)]
    pub groups: GroupArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_arguments_are_parsed() {
        let cli = Cli::parse_from([
            "sumd",
            "-vv",
            "run",
            "-i",
            "complex.pdb",
            "--peptide-chain",
            "B",
            "--protein-chain",
            "A",
            "--protein-residues",
            "10-20",
            "--md-gate",
            "5A",
            "-n",
            "8",
            "-S",
            "engine.water-model=tip4p",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("Expected 'run' subcommand");
        };
        assert_eq!(args.input, PathBuf::from("complex.pdb"));
        assert_eq!(args.groups.peptide_chain, Some('B'));
        assert_eq!(args.groups.protein_residues.as_deref(), Some("10-20"));
        assert_eq!(args.md_gate.as_deref(), Some("5A"));
        assert_eq!(args.num_samples, Some(8));
        assert_eq!(args.set_values, vec!["engine.water-model=tip4p"]);
        assert!(!args.exact_output_dir);
    }

    #[test]
    fn distance_requires_input() {
        assert!(Cli::try_parse_from(["sumd", "distance", "--peptide-chain", "B"]).is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["sumd", "-q", "-v", "distance", "-i", "x.pdb"]).is_err());
    }
}
