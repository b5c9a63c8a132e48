use super::traits::{CoordinateFile, slice_and_trim};
use crate::core::models::atom::AtomRecord;
use nalgebra::Point3;
use std::io::{self, BufRead};
use tracing::trace;

/// Reader for the fixed-column PDB format.
///
/// Only the first model is read; `ENDMDL` or `END` stops parsing.
pub struct PdbFile;

impl CoordinateFile for PdbFile {
    fn read_atoms(reader: &mut impl BufRead) -> io::Result<Vec<AtomRecord>> {
        let mut atoms = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "ATOM" | "HETATM" => match parse_atom_line(&line) {
                    Some(atom) => atoms.push(atom),
                    None => trace!(line = line_num + 1, "Skipping malformed PDB atom record."),
                },
                "ENDMDL" | "END" => break,
                _ => {}
            }
        }

        Ok(atoms)
    }
}

fn parse_atom_line(line: &str) -> Option<AtomRecord> {
    let name = slice_and_trim(line, 12, 16);
    let chain_id = line.get(21..22).and_then(|s| s.chars().next()).filter(|c| !c.is_whitespace());
    let residue_number: isize = slice_and_trim(line, 22, 26).parse().ok()?;
    let x: f64 = slice_and_trim(line, 30, 38).parse().ok()?;
    let y: f64 = slice_and_trim(line, 38, 46).parse().ok()?;
    let z: f64 = slice_and_trim(line, 46, 54).parse().ok()?;

    Some(AtomRecord::new(name, chain_id, residue_number, Point3::new(x, y, z)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
REMARK  test structure
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
HETATM    3  O   HOH B 101       1.000   2.000   3.000  1.00  0.00           O
ATOM      4  CA  GLY     2       0.000   0.000   0.000  1.00  0.00           C
TER
END
ATOM      5  CA  GLY A   3       9.000   9.000   9.000  1.00  0.00           C
";

    #[test]
    fn reads_atom_and_hetatm_records_until_end() {
        let atoms = PdbFile::read_atoms(&mut Cursor::new(SAMPLE)).unwrap();
        assert_eq!(atoms.len(), 4);
        assert_eq!(atoms[0].name, "N");
        assert_eq!(atoms[0].chain_id, Some('A'));
        assert_eq!(atoms[0].residue_number, 1);
        assert_eq!(atoms[1].position, Point3::new(11.639, 6.071, -5.147));
        assert_eq!(atoms[2].chain_id, Some('B'));
        assert_eq!(atoms[2].residue_number, 101);
    }

    #[test]
    fn blank_chain_column_is_read_as_none() {
        let atoms = PdbFile::read_atoms(&mut Cursor::new(SAMPLE)).unwrap();
        assert_eq!(atoms[3].chain_id, None);
        assert_eq!(atoms[3].residue_number, 2);
    }

    #[test]
    fn stops_after_first_model() {
        let text = "\
MODEL        1
ATOM      1  CA  ALA A   1       1.000   1.000   1.000  1.00  0.00           C
ENDMDL
MODEL        2
ATOM      1  CA  ALA A   1       2.000   2.000   2.000  1.00  0.00           C
ENDMDL
";
        let atoms = PdbFile::read_atoms(&mut Cursor::new(text)).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].position, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn malformed_and_truncated_records_are_skipped() {
        let text = "\
ATOM      1  CA  ALA A   1       1.000   1.000   1.000  1.00  0.00           C
ATOM      2  CA  ALA A   X       1.000   1.000   1.000  1.00  0.00           C
ATOM      3  CA  ALA A   2       1.000   abc     1.000  1.00  0.00           C
ATOM      4  CA  ALA A   3       1.000
ATOM      5  CA  ALA A   4       4.000   4.000   4.000
";
        let atoms = PdbFile::read_atoms(&mut Cursor::new(text)).unwrap();
        let residues: Vec<_> = atoms.iter().map(|a| a.residue_number).collect();
        assert_eq!(residues, vec![1, 4]);
    }
}
