use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use super::Sorter;
use crate::error::{Result, SortError};

/// Sorter backed by the host `sort` utility
///
/// The child runs with `LC_ALL=C` so collation is byte-wise regardless of the host
/// locale. The calling thread blocks until the child exits; there is no timeout.
#[derive(Debug, Clone)]
pub struct SystemSort {
    /// Program to run
    program: String,

    /// Extra options passed before the file arguments
    options: Vec<String>,

    /// Directory for the utility's own temporary files (`-T`)
    tmpdir: Option<PathBuf>,

    /// Number of sort threads (`--parallel`), GNU sort only
    parallel: Option<usize>,
}
impl Default for SystemSort {
    fn default() -> Self {
        Self::new("sort")
    }
}
impl SystemSort {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            options: Vec::new(),
            tmpdir: None,
            parallel: None,
        }
    }

    /// Adds whitespace separated options, e.g. `"-S 2G"`
    #[must_use]
    pub fn with_options(mut self, options: &str) -> Self {
        self.options
            .extend(options.split_whitespace().map(String::from));
        self
    }

    #[must_use]
    pub fn with_tmpdir(mut self, tmpdir: impl Into<PathBuf>) -> Self {
        self.tmpdir = Some(tmpdir.into());
        self
    }

    /// Sets the number of sort threads; zero uses every available core
    #[must_use]
    pub fn with_parallel(mut self, threads: usize) -> Self {
        self.parallel = Some(if threads == 0 {
            num_cpus::get()
        } else {
            threads.min(num_cpus::get())
        });
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("LC_ALL", "C");
        cmd.args(&self.options);
        if let Some(dir) = &self.tmpdir {
            cmd.arg("-T").arg(dir);
        }
        if let Some(threads) = self.parallel {
            cmd.arg(format!("--parallel={threads}"));
        }
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<()> {
        let command = format!("{cmd:?}");
        debug!("running {command}");
        let result = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| SortError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !result.status.success() {
            return Err(SortError::Failed {
                command,
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Sorter for SystemSort {
    fn sort(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("-o").arg(output).arg(input);
        self.run(cmd)
    }

    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(SortError::EmptyMerge(output.to_path_buf()).into());
        }
        let mut cmd = self.command();
        cmd.arg("-m").arg("-o").arg(output).args(inputs);
        self.run(cmd)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::sort::MemorySort;
    use anyhow::Result;
    use std::fs;

    pub(crate) fn sort_available() -> bool {
        Command::new("sort")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    #[test]
    fn agrees_with_memory_sort() -> Result<()> {
        if !sort_available() {
            return Ok(());
        }
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("in");
        fs::write(
            &input,
            "X2 0000000010\nX1 0000000900\nX 0000000001\nx 0000000000\nX1 0000000100\n",
        )?;
        let system = dir.path().join("system");
        let memory = dir.path().join("memory");
        SystemSort::default().sort(&input, &system)?;
        MemorySort.sort(&input, &memory)?;
        assert_eq!(fs::read(&system)?, fs::read(&memory)?);

        let merged = dir.path().join("merged");
        SystemSort::default().merge(&[system.clone(), memory.clone()], &merged)?;
        assert_eq!(fs::read_to_string(&merged)?.lines().count(), 10);
        Ok(())
    }

    #[test]
    fn missing_program_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::write(&input, "a\n").unwrap();
        let err = SystemSort::new("flatdbi-no-such-sort")
            .sort(&input, &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, crate::Error::SortError(SortError::Spawn { .. })));
    }

    #[test]
    fn failing_sort_reports_status() {
        if !sort_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let err = SystemSort::default()
            .sort(&dir.path().join("missing"), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, crate::Error::SortError(SortError::Failed { .. })));
    }
}
