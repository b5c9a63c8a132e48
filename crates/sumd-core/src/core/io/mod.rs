//! Provides coordinate readers for the structure formats the pipeline produces.
//!
//! PDB files come from the user or from the engine's chain-aware export; GRO
//! files are the engine's native coordinate output. Both readers implement the
//! lenient [`traits::CoordinateFile`] interface.

pub mod gro;
pub mod pdb;
pub mod traits;

use crate::core::models::atom::AtomRecord;
use crate::core::models::snapshot::{StructureFormat, StructureSnapshot};
use std::io;
use traits::CoordinateFile;

/// Reads the atom records of a snapshot's primary file using the reader for
/// its format.
pub fn read_snapshot_atoms(snapshot: &StructureSnapshot) -> io::Result<Vec<AtomRecord>> {
    match snapshot.format() {
        StructureFormat::Pdb => pdb::PdbFile::read_atoms_from_path(snapshot.path()),
        StructureFormat::Gro => gro::GroFile::read_atoms_from_path(snapshot.path()),
    }
}
