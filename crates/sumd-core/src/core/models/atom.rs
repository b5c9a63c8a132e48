use nalgebra::Point3;

/// A single coordinate record read from a structure file.
///
/// Only the fields needed to resolve atom groups and compute their centroids
/// are kept. Coordinates are stored in the native length unit of the file they
/// were read from; conversion to nanometres happens in the metrics layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    /// The atom name (e.g., "CA", "OW").
    pub name: String,
    /// The chain identifier, if the format carries one.
    pub chain_id: Option<char>,
    /// The residue sequence number.
    pub residue_number: isize,
    /// The 3D coordinates in the file's native unit.
    pub position: Point3<f64>,
}

impl AtomRecord {
    /// Creates a new `AtomRecord`.
    ///
    /// # Arguments
    ///
    /// * `name` - The atom name.
    /// * `chain_id` - The chain identifier, or `None` for chainless formats.
    /// * `residue_number` - The residue sequence number.
    /// * `position` - The atom coordinates.
    pub fn new(
        name: &str,
        chain_id: Option<char>,
        residue_number: isize,
        position: Point3<f64>,
    ) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            residue_number,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_initializes_all_fields() {
        let atom = AtomRecord::new("CA", Some('B'), 42, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.name, "CA");
        assert_eq!(atom.chain_id, Some('B'));
        assert_eq!(atom.residue_number, 42);
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
    }
}
