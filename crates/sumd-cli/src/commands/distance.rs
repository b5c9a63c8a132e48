use crate::cli::DistanceArgs;
use crate::config::defaults::{PEPTIDE_GROUP, PROTEIN_GROUP};
use crate::config::group_selector;
use crate::error::{CliError, Result};
use sumd::core::metrics;
use sumd::core::models::snapshot::{StructureFormat, StructureSnapshot};
use tracing::info;

pub async fn run(args: DistanceArgs) -> Result<()> {
    let structure = StructureSnapshot::from_path(&args.input).ok_or_else(|| {
        CliError::Argument(format!(
            "Unsupported structure format (expected .pdb or .gro): {}",
            args.input.display()
        ))
    })?;
    // A GRO has no chain column; score its same-stem PDB when one exists.
    let companion = args.input.with_extension(StructureFormat::Pdb.extension());
    let structure = if structure.format() == StructureFormat::Gro && companion.is_file() {
        structure.with_companion(StructureSnapshot::new(companion, StructureFormat::Pdb))
    } else {
        structure
    };
    let groups = &args.groups;
    let peptide = group_selector(
        PEPTIDE_GROUP,
        groups.peptide_chain,
        groups.peptide_residues.as_deref(),
    )?;
    let protein = group_selector(
        PROTEIN_GROUP,
        groups.protein_chain,
        groups.protein_residues.as_deref(),
    )?;

    info!("Measuring {} against {} in {}", peptide, protein, structure);
    let distance =
        tokio::task::spawn_blocking(move || metrics::distance(&structure, &peptide, &protein))
            .await
            .map_err(|e| CliError::Other(anyhow::anyhow!("Distance task failed: {}", e)))??;

    println!("{:.4} nm", distance);
    Ok(())
}
