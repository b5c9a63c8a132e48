pub const DEFAULT_OUTPUT_DIR: &str = "sumd_output";

/// Suffix appended to the output directory unless `--exact-output-dir` is set.
pub const OUTPUT_DIR_TIMESTAMP_FORMAT: &str = "_%Y%m%d_%H%M%S";

pub const PEPTIDE_GROUP: &str = "peptide";
pub const PROTEIN_GROUP: &str = "protein";
