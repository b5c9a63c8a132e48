use super::StageFailure;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Number of trailing stderr lines kept as the failure diagnostic.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// A single invocation of an engine tool, built from an argument list.
///
/// The child is spawned with `kill_on_drop`, so dropping the future that runs
/// it (for example on a timeout) terminates the external process.
#[derive(Debug, Clone)]
pub struct GmxCommand {
    program: PathBuf,
    tool: &'static str,
    args: Vec<OsString>,
    stdin: Option<String>,
    workdir: PathBuf,
    expected_output: Option<PathBuf>,
}

impl GmxCommand {
    pub fn new(program: &Path, tool: &'static str, workdir: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            tool,
            args: Vec::new(),
            stdin: None,
            workdir: workdir.to_path_buf(),
            expected_output: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends `name value`.
    pub fn opt(self, name: &str, value: impl AsRef<OsStr>) -> Self {
        self.arg(name).arg(value)
    }

    /// Text written to the tool's stdin, for tools that prompt for a group.
    pub fn stdin(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(text.into());
        self
    }

    /// A file (relative to the working directory) that must exist after a
    /// successful run.
    pub fn expect_output(mut self, file: impl AsRef<Path>) -> Self {
        self.expected_output = Some(self.workdir.join(file));
        self
    }

    pub fn tool(&self) -> &'static str {
        self.tool
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// The command line for logs. Never passed to a shell.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(std::iter::once(OsStr::new(self.tool)))
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn run(self) -> Result<(), StageFailure> {
        let step = format!("gmx {}", self.tool);
        debug!(workdir = %self.workdir.display(), "Running: {}", self.display_line());

        let mut child = Command::new(&self.program)
            .arg(self.tool)
            .args(&self.args)
            .current_dir(&self.workdir)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StageFailure::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        if let (Some(text), Some(mut pipe)) = (self.stdin.as_deref(), child.stdin.take()) {
            let line = format!("{text}\n");
            if let Err(e) = pipe.write_all(line.as_bytes()).await {
                debug!("'{}' closed stdin early: {}", step, e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| StageFailure::io(format!("waiting for '{step}'"), e))?;

        if !output.status.success() {
            return Err(StageFailure::ExitStatus {
                step,
                status: output.status.to_string(),
                diagnostic: diagnostic_tail(&output.stderr, &output.stdout),
            });
        }

        if let Some(path) = self.expected_output {
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(StageFailure::MissingArtifact { step, path });
            }
        }
        Ok(())
    }
}

/// The last lines of stderr, or stdout when stderr is empty.
fn diagnostic_tail(stderr: &[u8], stdout: &[u8]) -> String {
    let source = if stderr.iter().all(u8::is_ascii_whitespace) {
        stdout
    } else {
        stderr
    };
    let text = String::from_utf8_lossy(source);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    lines[start..].join("\n")
}
