use super::traits::{CoordinateFile, slice_and_trim};
use crate::core::models::atom::AtomRecord;
use nalgebra::Point3;
use std::io::{self, BufRead};
use tracing::{trace, warn};

/// Reader for the GROMACS `.gro` coordinate format.
///
/// GRO carries no chain identifiers, so every record has `chain_id = None`.
/// Residue numbers wrap at 100000 in this format.
pub struct GroFile;

impl CoordinateFile for GroFile {
    fn read_atoms(reader: &mut impl BufRead) -> io::Result<Vec<AtomRecord>> {
        let mut lines = reader.lines();

        // Title line.
        if lines.next().transpose()?.is_none() {
            return Ok(Vec::new());
        }
        let Some(count_line) = lines.next().transpose()? else {
            return Ok(Vec::new());
        };
        let Ok(declared) = count_line.trim().parse::<usize>() else {
            warn!("GRO atom count line is not an integer: '{}'", count_line.trim());
            return Ok(Vec::new());
        };

        let mut atoms = Vec::with_capacity(declared);
        for (idx, line_res) in lines.take(declared).enumerate() {
            let line = line_res?;
            match parse_atom_line(&line) {
                Some(atom) => atoms.push(atom),
                None => trace!(line = idx + 3, "Skipping malformed GRO atom record."),
            }
        }

        Ok(atoms)
    }
}

fn parse_atom_line(line: &str) -> Option<AtomRecord> {
    let residue_number: isize = slice_and_trim(line, 0, 5).parse().ok()?;
    let name = slice_and_trim(line, 10, 15);
    let x: f64 = slice_and_trim(line, 20, 28).parse().ok()?;
    let y: f64 = slice_and_trim(line, 28, 36).parse().ok()?;
    let z: f64 = slice_and_trim(line, 36, 44).parse().ok()?;

    Some(AtomRecord::new(name, None, residue_number, Point3::new(x, y, z)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
Peptide in water
    3
    1ALA      N    1   1.110   0.613  -0.650
    1ALA     CA    2   1.164   0.607  -0.515
  101SOL     OW    3   0.100   0.200   0.300
   3.00000   3.00000   3.00000
";

    #[test]
    fn reads_declared_number_of_atoms_in_nanometres() {
        let atoms = GroFile::read_atoms(&mut Cursor::new(SAMPLE)).unwrap();
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].name, "N");
        assert_eq!(atoms[0].residue_number, 1);
        assert_eq!(atoms[0].chain_id, None);
        assert_eq!(atoms[1].position, Point3::new(1.164, 0.607, -0.515));
        assert_eq!(atoms[2].residue_number, 101);
        assert_eq!(atoms[2].name, "OW");
    }

    #[test]
    fn box_line_is_not_parsed_as_an_atom() {
        let atoms = GroFile::read_atoms(&mut Cursor::new(SAMPLE)).unwrap();
        assert!(atoms.iter().all(|a| a.residue_number != 3));
    }

    #[test]
    fn malformed_records_are_skipped() {
        let text = "\
t
    2
    1ALA     CA    1   1.000   xxxxx   1.000
    2ALA     CA    2   2.000   2.000   2.000
   1.0 1.0 1.0
";
        let atoms = GroFile::read_atoms(&mut Cursor::new(text)).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].residue_number, 2);
    }

    #[test]
    fn empty_or_headerless_input_yields_no_atoms() {
        assert!(GroFile::read_atoms(&mut Cursor::new("")).unwrap().is_empty());
        assert!(GroFile::read_atoms(&mut Cursor::new("title\nnot-a-number\n")).unwrap().is_empty());
    }
}
