use super::atom::AtomRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// The residues of a chain that belong to an atom group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ResidueSet {
    /// Every residue of the chain.
    All,
    /// Only the listed residue sequence numbers.
    List { residues: BTreeSet<isize> },
}

impl ResidueSet {
    pub fn contains(&self, residue_number: isize) -> bool {
        match self {
            ResidueSet::All => true,
            ResidueSet::List { residues } => residues.contains(&residue_number),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResidueSet::List { residues } if residues.is_empty())
    }
}

/// A named group of residues on one chain, e.g. the peptide or the protein
/// binding site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AtomGroupSelector {
    pub name: String,
    pub chain_id: char,
    pub residues: ResidueSet,
}

impl AtomGroupSelector {
    /// A selector covering every residue of `chain_id`.
    pub fn chain(name: &str, chain_id: char) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            residues: ResidueSet::All,
        }
    }

    /// A selector covering the listed residues of `chain_id`.
    pub fn residues(
        name: &str,
        chain_id: char,
        residues: impl IntoIterator<Item = isize>,
    ) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            residues: ResidueSet::List {
                residues: residues.into_iter().collect(),
            },
        }
    }

    /// Whether the atom belongs to this group. Atoms without a chain
    /// identifier never match.
    pub fn matches(&self, atom: &AtomRecord) -> bool {
        atom.chain_id == Some(self.chain_id) && self.residues.contains(atom.residue_number)
    }
}

impl fmt::Display for AtomGroupSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.residues {
            ResidueSet::All => write!(f, "{} (chain {})", self.name, self.chain_id),
            ResidueSet::List { residues } => write!(
                f,
                "{} (chain {}, {} residues)",
                self.name,
                self.chain_id,
                residues.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn atom(chain: Option<char>, res: isize) -> AtomRecord {
        AtomRecord::new("CA", chain, res, Point3::origin())
    }

    #[test]
    fn chain_selector_matches_every_residue_of_its_chain() {
        let sel = AtomGroupSelector::chain("peptide", 'B');
        assert!(sel.matches(&atom(Some('B'), 1)));
        assert!(sel.matches(&atom(Some('B'), 999)));
        assert!(!sel.matches(&atom(Some('A'), 1)));
    }

    #[test]
    fn residue_selector_requires_both_chain_and_residue() {
        let sel = AtomGroupSelector::residues("site", 'A', [10, 11, 12]);
        assert!(sel.matches(&atom(Some('A'), 11)));
        assert!(!sel.matches(&atom(Some('A'), 13)));
        assert!(!sel.matches(&atom(Some('B'), 11)));
    }

    #[test]
    fn chainless_atoms_never_match() {
        assert!(!AtomGroupSelector::residues("site", 'A', [5]).matches(&atom(None, 5)));
        assert!(!AtomGroupSelector::chain("protein", 'A').matches(&atom(None, 1)));
    }

    #[test]
    fn empty_residue_list_is_reported_as_empty() {
        assert!(AtomGroupSelector::residues("x", 'A', []).residues.is_empty());
        assert!(!AtomGroupSelector::chain("x", 'A').residues.is_empty());
    }
}
