//! The convergence metric: center-of-mass separation between two atom groups.

use crate::core::io::read_snapshot_atoms;
use crate::core::models::selection::AtomGroupSelector;
use crate::core::models::snapshot::StructureSnapshot;
use crate::core::utils::geometry::centroid;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Atom group '{group}' matched no atoms in {path}", path = path.display())]
    EmptyGroup { group: String, path: PathBuf },

    #[error("Structure {path} carries no chain identifiers", path = path.display())]
    NoChainInformation { path: PathBuf },

    #[error("Failed to read structure {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Computes the distance in nanometres between the unweighted centers of
/// mass of `group_a` and `group_b` in `structure`.
///
/// The snapshot's scoring companion is read when present. Coordinates are
/// converted with the fixed scale factor of the file's format.
///
/// # Errors
///
/// Returns [`ExtractionError::NoChainInformation`] if the scored file has
/// atoms but no chain column (a bare GRO), [`ExtractionError::EmptyGroup`]
/// if either group resolves to zero atoms, and [`ExtractionError::Io`] if
/// the file cannot be read.
pub fn distance(
    structure: &StructureSnapshot,
    group_a: &AtomGroupSelector,
    group_b: &AtomGroupSelector,
) -> Result<f64, ExtractionError> {
    let target = structure.scoring_target();
    let atoms = read_snapshot_atoms(target).map_err(|source| ExtractionError::Io {
        path: target.path().to_path_buf(),
        source,
    })?;

    if !atoms.is_empty() && atoms.iter().all(|a| a.chain_id.is_none()) {
        return Err(ExtractionError::NoChainInformation {
            path: target.path().to_path_buf(),
        });
    }

    let empty = |group: &AtomGroupSelector| ExtractionError::EmptyGroup {
        group: group.name.clone(),
        path: target.path().to_path_buf(),
    };

    let center_a = centroid(atoms.iter().filter(|a| group_a.matches(a)).map(|a| &a.position))
        .ok_or_else(|| empty(group_a))?;
    let center_b = centroid(atoms.iter().filter(|a| group_b.matches(a)).map(|a| &a.position))
        .ok_or_else(|| empty(group_b))?;

    let nm = (center_a - center_b).norm() * target.format().nm_per_unit();
    debug!(
        structure = %target,
        distance_nm = nm,
        "Computed center-of-mass distance between '{}' and '{}'.",
        group_a.name,
        group_b.name
    );
    Ok(nm)
}

/// Like [`distance`], but maps every extraction failure to `f64::INFINITY`,
/// which rejects the structure during selection.
pub fn distance_or_infinite(
    structure: &StructureSnapshot,
    group_a: &AtomGroupSelector,
    group_b: &AtomGroupSelector,
) -> f64 {
    distance(structure, group_a, group_b).unwrap_or_else(|e| {
        warn!("{}; treating distance as infinite.", e);
        f64::INFINITY
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::snapshot::StructureFormat;
    use std::fs;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-9;

    fn pdb_line(serial: usize, chain: char, res: isize, x: f64, y: f64, z: f64) -> String {
        format!(
            "ATOM  {:>5}  CA  ALA {}{:>4}    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00           C",
            serial, chain, res, x, y, z
        )
    }

    fn write_pdb(dir: &std::path::Path, name: &str, lines: &[String]) -> StructureSnapshot {
        let path = dir.join(name);
        fs::write(&path, lines.join("\n") + "\nEND\n").unwrap();
        StructureSnapshot::new(path, StructureFormat::Pdb)
    }

    #[test]
    fn angstrom_separation_is_reported_in_nanometres() {
        let dir = tempdir().unwrap();
        let snapshot = write_pdb(
            dir.path(),
            "pair.pdb",
            &[
                pdb_line(1, 'A', 1, -1.0, 0.0, 0.0),
                pdb_line(2, 'A', 2, 1.0, 0.0, 0.0),
                pdb_line(3, 'B', 1, 12.0, 0.0, 0.0),
                pdb_line(4, 'B', 2, 12.0, 6.0, 8.0),
                pdb_line(5, 'B', 3, 12.0, -6.0, -8.0),
            ],
        );
        let protein = AtomGroupSelector::chain("protein", 'A');
        let peptide = AtomGroupSelector::chain("peptide", 'B');

        let d = distance(&snapshot, &peptide, &protein).unwrap();
        assert!((d - 1.2).abs() < TOLERANCE, "got {d}");
    }

    #[test]
    fn distance_is_symmetric_and_respects_residue_lists() {
        let dir = tempdir().unwrap();
        let snapshot = write_pdb(
            dir.path(),
            "sites.pdb",
            &[
                pdb_line(1, 'A', 10, 0.0, 0.0, 0.0),
                pdb_line(2, 'A', 99, 500.0, 500.0, 500.0),
                pdb_line(3, 'B', 1, 0.0, 0.0, 30.0),
            ],
        );
        let site = AtomGroupSelector::residues("site", 'A', [10]);
        let peptide = AtomGroupSelector::chain("peptide", 'B');

        let ab = distance(&snapshot, &site, &peptide).unwrap();
        let ba = distance(&snapshot, &peptide, &site).unwrap();
        assert!((ab - 3.0).abs() < TOLERANCE);
        assert!((ab - ba).abs() < TOLERANCE);
    }

    #[test]
    fn bare_gro_cannot_be_scored_and_maps_to_infinity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pair.gro");
        fs::write(
            &path,
            concat!(
                "pair\n    2\n",
                "    1ALA     CA    1   0.000   0.000   0.000\n",
                "    2ALA     CA    2   0.300   0.400   0.000\n",
                "   1.0 1.0 1.0\n",
            ),
        )
        .unwrap();
        let snapshot = StructureSnapshot::new(path, StructureFormat::Gro);

        let a = AtomGroupSelector::chain("protein", 'A');
        let b = AtomGroupSelector::chain("peptide", 'B');
        assert!(matches!(
            distance(&snapshot, &a, &b),
            Err(ExtractionError::NoChainInformation { .. })
        ));
        assert_eq!(distance_or_infinite(&snapshot, &a, &b), f64::INFINITY);
    }

    #[test]
    fn chains_sharing_residue_numbers_are_kept_apart() {
        let dir = tempdir().unwrap();
        let snapshot = write_pdb(
            dir.path(),
            "shared.pdb",
            &[
                pdb_line(1, 'A', 1, 0.0, 0.0, 0.0),
                pdb_line(2, 'B', 1, 40.0, 0.0, 0.0),
            ],
        );
        let a = AtomGroupSelector::residues("protein", 'A', [1]);
        let b = AtomGroupSelector::residues("peptide", 'B', [1]);
        let d = distance(&snapshot, &a, &b).unwrap();
        assert!((d - 4.0).abs() < TOLERANCE, "got {d}");
    }

    #[test]
    fn companion_is_used_for_scoring() {
        let dir = tempdir().unwrap();
        let gro_path = dir.path().join("em.gro");
        fs::write(&gro_path, "empty\n    0\n   1.0 1.0 1.0\n").unwrap();
        let companion = write_pdb(
            dir.path(),
            "em.pdb",
            &[pdb_line(1, 'A', 1, 0.0, 0.0, 0.0), pdb_line(2, 'B', 1, 5.0, 0.0, 0.0)],
        );
        let snapshot =
            StructureSnapshot::new(gro_path, StructureFormat::Gro).with_companion(companion);

        let d = distance(
            &snapshot,
            &AtomGroupSelector::chain("a", 'A'),
            &AtomGroupSelector::chain("b", 'B'),
        )
        .unwrap();
        assert!((d - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn empty_group_is_an_error_and_maps_to_infinity() {
        let dir = tempdir().unwrap();
        let snapshot = write_pdb(dir.path(), "one.pdb", &[pdb_line(1, 'A', 1, 0.0, 0.0, 0.0)]);
        let a = AtomGroupSelector::chain("protein", 'A');
        let missing = AtomGroupSelector::chain("peptide", 'Z');

        let result = distance(&snapshot, &a, &missing);
        assert!(matches!(
            result,
            Err(ExtractionError::EmptyGroup { ref group, .. }) if group == "peptide"
        ));
        assert_eq!(distance_or_infinite(&snapshot, &a, &missing), f64::INFINITY);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let snapshot = StructureSnapshot::new(dir.path().join("nope.pdb"), StructureFormat::Pdb);
        let g = AtomGroupSelector::chain("g", 'A');
        assert!(matches!(
            distance(&snapshot, &g, &g),
            Err(ExtractionError::Io { .. })
        ));
    }
}
