use phf::phf_map;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// The on-disk format of a structure snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureFormat {
    /// Full-atom PDB text. Coordinates in Ångström, carries chain identifiers.
    Pdb,
    /// GROMACS coordinate file. Coordinates in nanometres, no chain column.
    Gro,
}

static FORMAT_BY_EXTENSION: phf::Map<&'static str, StructureFormat> = phf_map! {
    "pdb" => StructureFormat::Pdb,
    "ent" => StructureFormat::Pdb,
    "gro" => StructureFormat::Gro,
};

impl StructureFormat {
    /// Infers the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        FORMAT_BY_EXTENSION.get(ext.as_str()).copied()
    }

    /// The canonical file extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            StructureFormat::Pdb => "pdb",
            StructureFormat::Gro => "gro",
        }
    }

    /// Multiplier converting the format's native length unit to nanometres.
    pub fn nm_per_unit(&self) -> f64 {
        match self {
            StructureFormat::Pdb => 0.1,
            StructureFormat::Gro => 1.0,
        }
    }
}

impl fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// An immutable reference to a molecular structure at one point in the pipeline.
///
/// Snapshots are never modified in place: every stage writes a new file and
/// returns a new snapshot. A snapshot may carry a scoring companion, a
/// chain-aware PDB rendition of the same coordinates which the distance metric
/// reads instead of the primary file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureSnapshot {
    path: PathBuf,
    format: StructureFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    companion: Option<Box<StructureSnapshot>>,
}

impl StructureSnapshot {
    pub fn new(path: impl Into<PathBuf>, format: StructureFormat) -> Self {
        Self {
            path: path.into(),
            format,
            companion: None,
        }
    }

    /// Creates a snapshot whose format is inferred from the file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let format = StructureFormat::from_path(&path)?;
        Some(Self::new(path, format))
    }

    /// Returns a copy of this snapshot with the given scoring companion attached.
    pub fn with_companion(mut self, companion: StructureSnapshot) -> Self {
        self.companion = Some(Box::new(companion.without_companion()));
        self
    }

    /// Returns a copy of this snapshot with any scoring companion removed.
    pub fn without_companion(mut self) -> Self {
        self.companion = None;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StructureFormat {
        self.format
    }

    pub fn companion(&self) -> Option<&StructureSnapshot> {
        self.companion.as_deref()
    }

    /// The snapshot the distance metric should read.
    pub fn scoring_target(&self) -> &StructureSnapshot {
        self.companion.as_deref().unwrap_or(self)
    }

    /// Whether this is a raw structure that still needs system preparation.
    pub fn is_raw(&self) -> bool {
        self.format == StructureFormat::Pdb
    }
}

impl fmt::Display for StructureSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
