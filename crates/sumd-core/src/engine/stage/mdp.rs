use std::fmt::Write as _;
use std::path::Path;

/// Integration timestep of MD segments, in picoseconds.
pub const MD_TIMESTEP_PS: f64 = 0.002;

/// A run-parameter (`.mdp`) file as an ordered list of `key = value` lines.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    title: &'static str,
    entries: Vec<(&'static str, String)>,
}

impl RunParameters {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            entries: Vec::new(),
        }
    }

    fn set(mut self, key: &'static str, value: impl ToString) -> Self {
        self.entries.push((key, value.to_string()));
        self
    }

    fn short_range(self, coulombtype: &str, nstlist: u32) -> Self {
        self.set("nstlist", nstlist)
            .set("cutoff-scheme", "Verlet")
            .set("coulombtype", coulombtype)
            .set("rcoulomb", "1.0")
            .set("rvdw", "1.0")
            .set("pbc", "xyz")
    }

    /// Short minimization used to relax the solvated box before `genion`.
    pub fn ions() -> Self {
        Self::new("ion placement")
            .set("integrator", "steep")
            .set("nsteps", 1000)
            .set("emtol", "1000.0")
            .set("emstep", "0.02")
            .short_range("cutoff", 1)
    }

    pub fn minimization() -> Self {
        Self::new("energy minimization")
            .set("integrator", "steep")
            .set("nsteps", 5000)
            .set("emtol", "1000.0")
            .set("emstep", "0.01")
            .short_range("PME", 1)
    }

    /// An NPT segment of `length_ns` with velocities drawn from `seed`.
    pub fn md_segment(length_ns: f64, seed: u64) -> Self {
        Self::new("md segment")
            .set("integrator", "md")
            .set("dt", MD_TIMESTEP_PS)
            .set("nsteps", md_steps(length_ns))
            .set("nstenergy", 1000)
            .set("nstlog", 1000)
            .set("nstxout-compressed", 1000)
            .set("continuation", "no")
            .set("constraint_algorithm", "lincs")
            .set("constraints", "all-bonds")
            .set("lincs_iter", 1)
            .set("lincs_order", 4)
            .set("gen_vel", "yes")
            .set("gen_temp", 300)
            .set("gen_seed", seed)
            .set("tcoupl", "V-rescale")
            .set("tc-grps", "System")
            .set("tau_t", "0.1")
            .set("ref_t", 300)
            .set("pcoupl", "Parrinello-Rahman")
            .set("pcoupltype", "isotropic")
            .set("tau_p", "2.0")
            .set("ref_p", "1.0")
            .set("compressibility", "4.5e-5")
            .short_range("PME", 10)
            .set("DispCorr", "EnerPres")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn render(&self) -> String {
        let width = self.entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        let mut out = format!("; {}\n", self.title);
        for (key, value) in &self.entries {
            let _ = writeln!(out, "{key:<width$} = {value}");
        }
        out
    }

    pub async fn write_to(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, self.render()).await
    }
}

/// Number of integration steps for a segment of `length_ns`.
pub fn md_steps(length_ns: f64) -> u64 {
    (length_ns * 1000.0 / MD_TIMESTEP_PS).round() as u64
}
