use crate::core::models::atom::AtomRecord;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading atom coordinates from a structure format.
///
/// Readers are lenient: a record that cannot be parsed is skipped rather than
/// failing the whole file, so a single truncated line never hides the atoms
/// around it. Only genuine I/O failures are reported as errors.
pub trait CoordinateFile {
    /// Reads every well-formed atom record from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Return
    ///
    /// Returns the atom records in file order, with coordinates in the
    /// format's native unit.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the underlying source fails.
    fn read_atoms(reader: &mut impl BufRead) -> io::Result<Vec<AtomRecord>>;

    /// Reads every well-formed atom record from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    fn read_atoms_from_path<P: AsRef<Path>>(path: P) -> io::Result<Vec<AtomRecord>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_atoms(&mut reader)
    }
}

pub(crate) fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}
